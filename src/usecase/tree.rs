use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use crate::domain::entity::Post;

/// Maps a post id to its direct replies, in display order.
///
/// Posts are borrowed from the caller's collection (usually
/// `ThreadData::replies`), which acts as the arena. A parent id with no
/// replies has no entry at all, so absence means "leaf".
#[derive(Debug, Default)]
pub struct ParentIndex<'a> {
    children: HashMap<&'a str, Vec<&'a Post>>,
}

impl<'a> ParentIndex<'a> {
    pub fn children(&self, parent_id: &str) -> &[&'a Post] {
        self.children
            .get(parent_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn contains_parent(&self, parent_id: &str) -> bool {
        self.children.contains_key(parent_id)
    }

    /// Number of parent ids that have at least one reply.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn render_from<'i>(&'i self, root_id: &str) -> RenderOrder<'i, 'a> {
        render_order(self, root_id, 0)
    }
}

/// Groups posts by their immediate parent.
///
/// Duplicate ids resolve last-write-wins in iteration order. Posts without a
/// `replied_to_id` are left out.
///
/// Any post with a `replied_to_id` is indexed, whatever its `kind`, and may
/// itself be a parent regardless of its own `kind`.
pub fn build_parent_index<'a, I>(replies: I) -> ParentIndex<'a>
where
    I: IntoIterator<Item = &'a Post>,
{
    let mut by_id: HashMap<&'a str, &'a Post> = HashMap::new();
    for post in replies {
        by_id.insert(post.id.as_str(), post);
    }

    let mut children: HashMap<&'a str, Vec<&'a Post>> = HashMap::new();
    for post in by_id.into_values() {
        if let Some(parent_id) = post.replied_to_id.as_deref() {
            children.entry(parent_id).or_default().push(post);
        }
    }

    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| sibling_order(a, b));
    }

    ParentIndex { children }
}

/// Smaller advisory depth first, then older first, then by id.
/// A missing depth counts as 0.
fn sibling_order(a: &Post, b: &Post) -> Ordering {
    a.reply_depth
        .unwrap_or(0)
        .cmp(&b.reply_depth.unwrap_or(0))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Pre-order walk of the replies below `root_id`, yielding each post with its
/// depth (`depth` for direct replies of the root).
///
/// Every call starts a fresh walk over the same index.
pub fn render_order<'i, 'a>(
    index: &'i ParentIndex<'a>,
    root_id: &str,
    depth: usize,
) -> RenderOrder<'i, 'a> {
    let stack = index
        .children(root_id)
        .iter()
        .rev()
        .map(|post| (*post, depth))
        .collect();

    RenderOrder {
        index,
        root_id: root_id.to_string(),
        stack,
        visited: HashSet::new(),
    }
}

pub struct RenderOrder<'i, 'a> {
    index: &'i ParentIndex<'a>,
    root_id: String,
    stack: Vec<(&'a Post, usize)>,
    visited: HashSet<&'a str>,
}

impl<'i, 'a> Iterator for RenderOrder<'i, 'a> {
    type Item = (&'a Post, usize);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((post, depth)) = self.stack.pop() {
            // Malformed data can loop back to the root or to a post already
            // emitted; truncate the branch there.
            if post.id == self.root_id || !self.visited.insert(post.id.as_str()) {
                continue;
            }

            self.stack.extend(
                self.index
                    .children(&post.id)
                    .iter()
                    .rev()
                    .map(|child| (*child, depth + 1)),
            );
            return Some((post, depth));
        }
        None
    }
}
