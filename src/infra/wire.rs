//! Normalizes upstream JSON into validated `Post`/`ThreadData` values.
//!
//! The upstream API serializes ids either as plain strings or as extended
//! JSON (`{"$oid": ...}`), and timestamps as RFC 3339 strings, epoch millis or
//! `{"$date": ...}`. Every variant is accepted here; records without an id or
//! a creation time are rejected.

use chrono::{DateTime, TimeZone, Utc};
use log::warn;
use serde::Deserialize;
use serde_json::Value;

use crate::domain::entity::{Post, PostKind, ThreadData};
use crate::domain::error::DomainError;

/// Reads an id that may be a plain string, a bare number or `{"$oid": ...}`.
fn id_from(value: Value) -> Option<String> {
    let id = match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Object(mut map) => match map.remove("$oid") {
            Some(Value::String(s)) => s,
            _ => return None,
        },
        _ => return None,
    };
    Some(id).filter(|s| !s.is_empty())
}

/// `reply_depth` only orders siblings, so anything that is not a
/// non-negative whole number is treated as unknown.
fn depth_from(value: Value) -> Option<u32> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= f64::from(u32::MAX))
                    .map(|f| f as u64)
            })
            .and_then(|d| u32::try_from(d).ok()),
        Value::String(s) => s.trim().parse::<u32>().ok(),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireDate {
    Millis(i64),
    Text(String),
    NumberLong {
        #[serde(rename = "$numberLong")]
        value: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireTimestamp {
    Millis(i64),
    Text(String),
    Extended {
        #[serde(rename = "$date")]
        date: WireDate,
    },
}

impl WireTimestamp {
    fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            WireTimestamp::Millis(ms) => from_millis(ms),
            WireTimestamp::Text(s) => from_text(&s),
            WireTimestamp::Extended { date } => match date {
                WireDate::Millis(ms) => from_millis(ms),
                WireDate::Text(s) => from_text(&s),
                WireDate::NumberLong { value } => value.parse::<i64>().ok().and_then(from_millis),
            },
        }
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn from_text(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// One post record as sent upstream. Every field is read as raw JSON and
/// converted on its own, so only a missing or unreadable `id`/`created_at`
/// rejects the record. The upstream names win over the local ones when a
/// record carries both.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct WirePost {
    #[serde(rename = "_id")]
    object_id: Option<Value>,
    id: Option<Value>,
    owner_id: Option<Value>,
    author_id: Option<Value>,
    content: Option<Value>,
    tweet_type: Option<Value>,
    kind: Option<Value>,
    replied_to_tweet_id: Option<Value>,
    replied_to_id: Option<Value>,
    reply_depth: Option<Value>,
    created_at: Option<Value>,
}

impl WirePost {
    fn into_post(self) -> Result<Post, DomainError> {
        let id = self
            .object_id
            .and_then(id_from)
            .or_else(|| self.id.and_then(id_from))
            .ok_or_else(|| DomainError::Parse("post record has no id".to_string()))?;

        let created_at = self
            .created_at
            .ok_or_else(|| DomainError::Parse(format!("post {} has no created_at", id)))?;
        let created_at = serde_json::from_value::<WireTimestamp>(created_at)
            .ok()
            .and_then(WireTimestamp::into_datetime)
            .ok_or_else(|| DomainError::Parse(format!("post {} has an unreadable created_at", id)))?;

        let replied_to_id = self
            .replied_to_tweet_id
            .and_then(id_from)
            .or_else(|| self.replied_to_id.and_then(id_from));

        let kind = self
            .tweet_type
            .into_iter()
            .chain(self.kind)
            .find_map(|v| v.as_str().and_then(|s| s.parse::<PostKind>().ok()));
        let kind = match kind {
            Some(kind) => kind,
            None if replied_to_id.is_some() => PostKind::Reply,
            None => PostKind::Original,
        };

        let content = match self.content {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };

        Ok(Post {
            id,
            author_id: self
                .owner_id
                .and_then(id_from)
                .or_else(|| self.author_id.and_then(id_from))
                .unwrap_or_default(),
            content,
            created_at,
            replied_to_id,
            reply_depth: self.reply_depth.and_then(depth_from),
            kind,
        })
    }
}

#[derive(Debug, Deserialize)]
struct WireThread {
    #[serde(alias = "anchor")]
    tweet: Value,
    #[serde(alias = "ancestors", default)]
    parents: Vec<Value>,
    #[serde(default)]
    replies: Vec<Value>,
}

pub fn parse_post(value: Value) -> Result<Post, DomainError> {
    let wire: WirePost = serde_json::from_value(value)
        .map_err(|e| DomainError::Parse(format!("malformed post record: {}", e)))?;
    wire.into_post()
}

/// Parses each record on its own, dropping (and counting) the bad ones.
fn parse_lenient(values: Vec<Value>, what: &str, rejected: &mut usize) -> Vec<Post> {
    values
        .into_iter()
        .filter_map(|value| match parse_post(value) {
            Ok(post) => Some(post),
            Err(e) => {
                warn!("skipping {} record: {}", what, e);
                *rejected += 1;
                None
            }
        })
        .collect()
}

/// Parses a thread response. A malformed anchor fails the whole thread; bad
/// ancestor or reply records are skipped and counted in `rejected`.
pub fn parse_thread(body: &str) -> Result<ThreadData, DomainError> {
    let wire: WireThread = serde_json::from_str(body)
        .map_err(|e| DomainError::Parse(format!("malformed thread response: {}", e)))?;
    thread_from_wire(wire)
}

fn thread_from_wire(wire: WireThread) -> Result<ThreadData, DomainError> {
    let anchor = parse_post(wire.tweet)?;
    let mut rejected = 0;
    let ancestors = parse_lenient(wire.parents, "ancestor", &mut rejected);
    let replies = parse_lenient(wire.replies, "reply", &mut rejected);

    Ok(ThreadData {
        anchor,
        ancestors,
        replies,
        rejected,
    })
}

/// Parses an import document: either a JSON array of posts or a single
/// thread response. Returns the valid posts and the number rejected.
pub fn parse_post_dump(body: &str) -> Result<(Vec<Post>, usize), DomainError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| DomainError::Parse(format!("invalid JSON: {}", e)))?;

    match value {
        Value::Array(items) => {
            let mut rejected = 0;
            let posts = parse_lenient(items, "post", &mut rejected);
            Ok((posts, rejected))
        }
        Value::Object(_) => {
            let wire: WireThread = serde_json::from_value(value)
                .map_err(|e| DomainError::Parse(format!("malformed thread response: {}", e)))?;
            let thread = thread_from_wire(wire)?;
            let rejected = thread.rejected;
            let mut posts = thread.ancestors;
            posts.push(thread.anchor);
            posts.extend(thread.replies);
            Ok((posts, rejected))
        }
        _ => Err(DomainError::Parse(
            "expected a JSON array of posts or a thread object".to_string(),
        )),
    }
}
