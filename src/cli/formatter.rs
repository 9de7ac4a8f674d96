use serde::Serialize;

use threadview::domain::entity::{Post, ThreadData};
use threadview::usecase::tree::build_parent_index;

fn short_id(id: &str) -> String {
    id.chars().take(8).collect()
}

pub fn format_post_line(post: &Post) -> String {
    let author = if post.author_id.is_empty() {
        "-"
    } else {
        post.author_id.as_str()
    };
    format!(
        "[{}] {} @{}: {}",
        post.created_at.format("%Y-%m-%d %H:%M:%S"),
        short_id(&post.id),
        author,
        post.content.replace('\n', " "),
    )
}

/// Ancestors marked `^`, the anchor marked `>`, then replies indented two
/// spaces per level below the anchor.
pub fn format_thread_text(thread: &ThreadData) -> String {
    let mut lines: Vec<String> = thread
        .ancestors
        .iter()
        .map(|p| format!("^ {}", format_post_line(p)))
        .collect();

    lines.push(format!("> {}", format_post_line(&thread.anchor)));

    let index = build_parent_index(&thread.replies);
    for (post, depth) in index.render_from(&thread.anchor.id) {
        lines.push(format!("{}{}", "  ".repeat(depth + 1), format_post_line(post)));
    }

    lines.push(format_footer(thread));
    lines.join("\n")
}

fn format_footer(thread: &ThreadData) -> String {
    let mut footer = match thread.replies.len() {
        0 => "no replies yet".to_string(),
        1 => "1 reply".to_string(),
        n => format!("{} replies", n),
    };
    let orphaned = thread.orphaned_replies().len();
    if orphaned > 0 {
        footer.push_str(&format!(" ({} unreachable)", orphaned));
    }
    if thread.rejected > 0 {
        footer.push_str(&format!(" ({} malformed records skipped)", thread.rejected));
    }
    footer
}

#[derive(Serialize)]
struct RenderedReply<'a> {
    depth: usize,
    post: &'a Post,
}

#[derive(Serialize)]
struct ThreadOutput<'a> {
    anchor: &'a Post,
    ancestors: &'a [Post],
    replies: Vec<RenderedReply<'a>>,
    orphaned: Vec<&'a str>,
    rejected: usize,
}

pub fn format_thread_json(thread: &ThreadData) -> String {
    let index = build_parent_index(&thread.replies);
    let output = ThreadOutput {
        anchor: &thread.anchor,
        ancestors: &thread.ancestors,
        replies: index
            .render_from(&thread.anchor.id)
            .map(|(post, depth)| RenderedReply { depth, post })
            .collect(),
        orphaned: thread
            .orphaned_replies()
            .iter()
            .map(|p| p.id.as_str())
            .collect(),
        rejected: thread.rejected,
    };
    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}

pub fn format_orphans_text(orphans: &[&Post]) -> String {
    orphans
        .iter()
        .map(|p| {
            format!(
                "{} (reply to {})",
                format_post_line(p),
                p.replied_to_id.as_deref().unwrap_or("-")
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_orphans_json(orphans: &[&Post]) -> String {
    serde_json::to_string_pretty(orphans).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use threadview::domain::entity::PostKind;

    fn post(id: &str, parent: Option<&str>, secs: i64) -> Post {
        Post {
            id: id.to_string(),
            author_id: "bob".to_string(),
            content: format!("text {}", id),
            created_at: Utc.timestamp_opt(secs, 0).unwrap(),
            replied_to_id: parent.map(|s| s.to_string()),
            reply_depth: None,
            kind: if parent.is_some() { PostKind::Reply } else { PostKind::Original },
        }
    }

    #[test]
    fn post_line_shortens_id() {
        let line = format_post_line(&post("0123456789abcdef", None, 0));
        assert_eq!(line, "[1970-01-01 00:00:00] 01234567 @bob: text 0123456789abcdef");
    }

    #[test]
    fn text_layout_nests_replies() {
        let thread = ThreadData::new(
            post("a", Some("root"), 2),
            vec![post("root", None, 1)],
            vec![
                post("b", Some("a"), 4),
                post("c", Some("a"), 3),
                post("d", Some("c"), 5),
                post("x", Some("ghost"), 6),
            ],
        );

        let text = format_thread_text(&thread);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("^ ["));
        assert!(lines[1].starts_with("> [") && lines[1].contains(" a @bob"));
        assert!(lines[2].starts_with("  [") && lines[2].contains(" c @bob"));
        assert!(lines[3].starts_with("    [") && lines[3].contains(" d @bob"));
        assert!(lines[4].starts_with("  [") && lines[4].contains(" b @bob"));
        assert_eq!(lines[5], "4 replies (1 unreachable)");
        assert!(!text.contains("text x"));
    }

    #[test]
    fn empty_thread_says_no_replies() {
        let thread = ThreadData::new(post("a", None, 1), Vec::new(), Vec::new());
        assert!(format_thread_text(&thread).ends_with("no replies yet"));
    }

    #[test]
    fn json_lists_depths_and_orphans() {
        let thread = ThreadData::new(
            post("a", None, 1),
            Vec::new(),
            vec![post("b", Some("a"), 2), post("c", Some("b"), 3), post("x", Some("ghost"), 4)],
        );

        let value: serde_json::Value = serde_json::from_str(&format_thread_json(&thread)).unwrap();
        let depths: Vec<u64> = value["replies"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["depth"].as_u64().unwrap())
            .collect();
        assert_eq!(depths, vec![0, 1]);
        assert_eq!(value["orphaned"], serde_json::json!(["x"]));
        assert_eq!(value["anchor"]["id"], "a");
    }

    #[test]
    fn orphan_lines_name_missing_parent() {
        let orphan = post("x", Some("ghost"), 0);
        let text = format_orphans_text(&[&orphan]);
        assert!(text.ends_with("(reply to ghost)"));
    }
}
