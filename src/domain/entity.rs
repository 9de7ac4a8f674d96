use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub author_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub replied_to_id: Option<String>,
    /// Distance from the conversation root as reported upstream.
    /// Advisory: only used as a sort key, never for structure.
    pub reply_depth: Option<u32>,
    pub kind: PostKind,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostKind {
    #[default]
    #[serde(alias = "original")]
    Original,
    #[serde(alias = "reply")]
    Reply,
    #[serde(alias = "quote")]
    Quote,
    #[serde(alias = "retweet")]
    Retweet,
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PostKind::Original => write!(f, "original"),
            PostKind::Reply => write!(f, "reply"),
            PostKind::Quote => write!(f, "quote"),
            PostKind::Retweet => write!(f, "retweet"),
        }
    }
}

impl std::str::FromStr for PostKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "original" => Ok(PostKind::Original),
            "reply" => Ok(PostKind::Reply),
            "quote" => Ok(PostKind::Quote),
            "retweet" => Ok(PostKind::Retweet),
            other => Err(format!("unknown post kind: {}", other)),
        }
    }
}

/// The materialized view of one requested post: its ancestor chain and the
/// flat set of replies below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadData {
    pub anchor: Post,
    /// Root-first, ending at the anchor's immediate parent.
    pub ancestors: Vec<Post>,
    /// Unordered. May contain orphans, which are kept but never rendered.
    pub replies: Vec<Post>,
    /// Inbound records dropped at the boundary for missing `id` or `created_at`.
    #[serde(default)]
    pub rejected: usize,
}

impl ThreadData {
    pub fn new(anchor: Post, ancestors: Vec<Post>, replies: Vec<Post>) -> Self {
        Self {
            anchor,
            ancestors,
            replies,
            rejected: 0,
        }
    }

    pub fn has_replies(&self) -> bool {
        !self.replies.is_empty()
    }

    /// Ids of every post loaded for this thread.
    pub fn known_ids(&self) -> HashSet<&str> {
        self.ancestors
            .iter()
            .chain(std::iter::once(&self.anchor))
            .chain(self.replies.iter())
            .map(|p| p.id.as_str())
            .collect()
    }

    /// Replies whose parent is not part of the loaded set.
    pub fn orphaned_replies(&self) -> Vec<&Post> {
        let known = self.known_ids();
        self.replies
            .iter()
            .filter(|p| match p.replied_to_id.as_deref() {
                Some(parent) => !known.contains(parent),
                None => false,
            })
            .collect()
    }
}
