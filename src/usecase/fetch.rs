use std::collections::HashMap;

use log::{debug, warn};
use serde::Serialize;

use crate::domain::entity::ThreadData;
use crate::domain::error::DomainError;
use crate::domain::repository::ThreadSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Absent,
    Loading,
    Loaded,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Transport,
    Other,
}

/// Why the last fetch for a root failed.
///
/// `message` is the reason without the category prefix; `Display` renders it
/// the way the originating `DomainError` would.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchFailure {
    pub fn retryable(&self) -> bool {
        self.kind == FailureKind::Transport
    }
}

impl From<&DomainError> for FetchFailure {
    fn from(e: &DomainError) -> Self {
        let (kind, message) = match e {
            DomainError::NotFound(id) => (FailureKind::NotFound, id.clone()),
            DomainError::Transport(reason) => (FailureKind::Transport, reason.clone()),
            other => (FailureKind::Other, other.to_string()),
        };
        let message = if message.trim().is_empty() {
            "failed to fetch thread".to_string()
        } else {
            message
        };
        Self { kind, message }
    }
}

impl std::fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            FailureKind::NotFound => write!(f, "post not found: {}", self.message),
            FailureKind::Transport => write!(f, "transport error: {}", self.message),
            FailureKind::Other => write!(f, "{}", self.message),
        }
    }
}

/// Read-only view of one cache entry.
///
/// `data` survives a failed refresh, so a `Failed` state may still carry the
/// previously loaded thread next to the error.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ThreadState<'c> {
    pub status: ThreadStatus,
    pub data: Option<&'c ThreadData>,
    pub error: Option<&'c FetchFailure>,
}

impl ThreadState<'_> {
    fn absent() -> Self {
        Self {
            status: ThreadStatus::Absent,
            data: None,
            error: None,
        }
    }
}

/// Proof that the holder owns the single in-flight fetch for a root id.
#[derive(Debug)]
#[must_use = "an unfinished ticket leaves the thread in Loading"]
pub struct FetchTicket {
    root_id: String,
    seq: u64,
}

impl FetchTicket {
    pub fn root_id(&self) -> &str {
        &self.root_id
    }
}

#[derive(Debug)]
struct CacheEntry {
    status: ThreadStatus,
    data: Option<ThreadData>,
    error: Option<FetchFailure>,
    fetch_seq: u64,
}

impl CacheEntry {
    fn absent() -> Self {
        Self {
            status: ThreadStatus::Absent,
            data: None,
            error: None,
            fetch_seq: 0,
        }
    }
}

/// In-memory thread cache keyed by root post id.
///
/// Fetching is split in two so callers that suspend on the network can hold
/// a ticket in between: `begin_fetch` marks the root `Loading` and
/// `complete_fetch` settles it.
#[derive(Debug, Default)]
pub struct ThreadCache {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

impl ThreadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a ticket when the caller should go fetch `root_id`, `None` when
    /// there is nothing to do.
    ///
    /// A root that is already `Loading` never gets a second ticket, even when
    /// forced. `Loaded` and `Failed` roots only get one when `force` is set.
    pub fn begin_fetch(&mut self, root_id: &str, force: bool) -> Option<FetchTicket> {
        let entry = self
            .entries
            .entry(root_id.to_string())
            .or_insert_with(CacheEntry::absent);

        match entry.status {
            ThreadStatus::Loading => {
                debug!("thread {} already loading, sharing in-flight fetch", root_id);
                return None;
            }
            ThreadStatus::Loaded | ThreadStatus::Failed if !force => return None,
            _ => {}
        }

        self.next_seq += 1;
        entry.status = ThreadStatus::Loading;
        entry.error = None;
        entry.fetch_seq = self.next_seq;
        debug!("thread {} loading (fetch #{})", root_id, self.next_seq);

        Some(FetchTicket {
            root_id: root_id.to_string(),
            seq: self.next_seq,
        })
    }

    /// Settles a fetch. Returns `false` when the result was dropped because a
    /// newer fetch for the same root took over.
    ///
    /// Success replaces the cached thread wholesale. Failure only touches the
    /// error channel and leaves earlier data in place.
    pub fn complete_fetch(
        &mut self,
        ticket: FetchTicket,
        result: Result<ThreadData, DomainError>,
    ) -> bool {
        let FetchTicket { root_id, seq } = ticket;

        let entry = self.entries.entry(root_id.clone()).or_insert_with(|| {
            debug!("thread {} was cleared while loading, populating anyway", root_id);
            CacheEntry {
                fetch_seq: seq,
                ..CacheEntry::absent()
            }
        });

        if entry.fetch_seq != seq {
            debug!(
                "dropping result of superseded fetch #{} for thread {}",
                seq, root_id
            );
            return false;
        }

        match result {
            Ok(data) => {
                if data.anchor.id != root_id {
                    warn!(
                        "thread {} resolved to anchor {}",
                        root_id, data.anchor.id
                    );
                }
                debug!(
                    "thread {} loaded ({} ancestors, {} replies)",
                    root_id,
                    data.ancestors.len(),
                    data.replies.len()
                );
                entry.status = ThreadStatus::Loaded;
                entry.data = Some(data);
                entry.error = None;
            }
            Err(e) => {
                debug!("thread {} failed: {}", root_id, e);
                entry.status = ThreadStatus::Failed;
                entry.error = Some(FetchFailure::from(&e));
            }
        }
        true
    }

    pub fn state(&self, root_id: &str) -> ThreadState<'_> {
        match self.entries.get(root_id) {
            Some(entry) => ThreadState {
                status: entry.status,
                data: entry.data.as_ref(),
                error: entry.error.as_ref(),
            },
            None => ThreadState::absent(),
        }
    }

    /// Drops one root, or every root when `root_id` is `None`.
    pub fn clear(&mut self, root_id: Option<&str>) {
        match root_id {
            Some(id) => {
                self.entries.remove(id);
            }
            None => self.entries.clear(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct ThreadUseCase<S: ThreadSource> {
    pub(crate) source: S,
    pub(crate) cache: ThreadCache,
}

impl<S: ThreadSource> ThreadUseCase<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: ThreadCache::new(),
        }
    }

    /// Loads `root_id` unless it is already loading, loaded or failed.
    pub fn ensure_thread(&mut self, root_id: &str) -> ThreadState<'_> {
        self.fetch(root_id, false)
    }

    /// Re-fetches `root_id` regardless of its current terminal state.
    pub fn refresh(&mut self, root_id: &str) -> ThreadState<'_> {
        self.fetch(root_id, true)
    }

    fn fetch(&mut self, root_id: &str, force: bool) -> ThreadState<'_> {
        if let Some(ticket) = self.cache.begin_fetch(root_id, force) {
            let result = self.source.get_thread(root_id);
            self.cache.complete_fetch(ticket, result);
        }
        self.cache.state(root_id)
    }

    pub fn state(&self, root_id: &str) -> ThreadState<'_> {
        self.cache.state(root_id)
    }

    pub fn clear(&mut self, root_id: Option<&str>) {
        self.cache.clear(root_id)
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache_mut(&mut self) -> &mut ThreadCache {
        &mut self.cache
    }
}
