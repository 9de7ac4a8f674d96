use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use log::debug;
use rusqlite::{params, Connection};

use crate::domain::entity::{Post, PostKind, ThreadData};
use crate::domain::error::DomainError;
use crate::domain::repository::{PostRepository, ThreadSource};

const MIGRATION_V1: &str = include_str!("migrations/v001.sql");

const POST_COLUMNS: &str = "id, author_id, content, kind, replied_to_id, reply_depth, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, DomainError> {
        let conn = Connection::open(path)
            .map_err(|e| DomainError::Database(format!("failed to open database: {}", e)))?;

        Self::configure(&conn)?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, DomainError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| DomainError::Database(format!("failed to open in-memory database: {}", e)))?;

        Self::configure(&conn)?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn configure(conn: &Connection) -> Result<(), DomainError> {
        // replied_to_id is deliberately not a foreign key: replies may point at
        // posts that were never imported.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| DomainError::Database(format!("failed to configure database: {}", e)))
    }

    fn current_version(&self) -> Result<i64, DomainError> {
        let has_table: bool = self
            .conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='schema_version'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::Database(format!("failed to check schema_version table: {}", e)))?;

        if !has_table {
            return Ok(0);
        }

        let version: i64 = self
            .conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_version",
                [],
                |row| row.get(0),
            )
            .map_err(|e| DomainError::Database(format!("failed to read schema version: {}", e)))?;

        Ok(version)
    }

    fn migrate(&mut self) -> Result<(), DomainError> {
        let version = self.current_version()?;

        if version < 1 {
            self.conn
                .execute_batch(MIGRATION_V1)
                .map_err(|e| DomainError::Database(format!("migration v1 failed: {}", e)))?;
        }

        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_datetime(s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(
            6,
            rusqlite::types::Type::Text,
            Box::new(e),
        ))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Local post store. Answers thread lookups the same way the upstream API
/// does, so it can stand in for it offline.
pub struct SqlitePostRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqlitePostRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn row_to_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
        let kind_str: String = row.get(3)?;
        let kind = kind_str.parse::<PostKind>().unwrap_or_default();
        let depth: Option<i64> = row.get(5)?;

        Ok(Post {
            id: row.get(0)?,
            author_id: row.get(1)?,
            content: row.get(2)?,
            kind,
            replied_to_id: row.get(4)?,
            reply_depth: depth.and_then(|d| u32::try_from(d).ok()),
            created_at: parse_datetime(&row.get::<_, String>(6)?)?,
        })
    }

    fn insert(&self, post: &Post) -> Result<(), DomainError> {
        self.conn
            .execute(
                &format!(
                    "INSERT OR REPLACE INTO posts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    POST_COLUMNS
                ),
                params![
                    post.id,
                    post.author_id,
                    post.content,
                    post.kind.to_string(),
                    post.replied_to_id,
                    post.reply_depth,
                    format_datetime(&post.created_at),
                ],
            )
            .map_err(|e| DomainError::Database(format!("failed to insert post {}: {}", post.id, e)))?;
        Ok(())
    }

    /// Walks `replied_to_id` upward from the anchor. The chain stops at a
    /// missing parent or at a post already seen.
    fn find_ancestors(&self, anchor: &Post) -> Result<Vec<Post>, DomainError> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        seen.insert(anchor.id.clone());

        let mut next = anchor.replied_to_id.clone();
        while let Some(parent_id) = next {
            if !seen.insert(parent_id.clone()) {
                debug!("ancestor chain of {} loops at {}", anchor.id, parent_id);
                break;
            }
            match self.find_by_id(&parent_id)? {
                Some(parent) => {
                    next = parent.replied_to_id.clone();
                    chain.push(parent);
                }
                None => {
                    debug!("ancestor chain of {} truncated at missing {}", anchor.id, parent_id);
                    break;
                }
            }
        }

        chain.reverse();
        Ok(chain)
    }

    fn find_descendants(&self, anchor_id: &str) -> Result<Vec<Post>, DomainError> {
        // UNION (not UNION ALL) drops repeated ids, so cyclic data terminates.
        let sql = format!(
            "WITH RECURSIVE descendants(id) AS (
                 SELECT id FROM posts WHERE replied_to_id = ?1
                 UNION
                 SELECT p.id FROM posts p JOIN descendants d ON p.replied_to_id = d.id
             )
             SELECT {} FROM posts
             WHERE id IN (SELECT id FROM descendants) AND id != ?1
             ORDER BY created_at ASC, id ASC",
            POST_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;

        let posts = stmt
            .query_map(params![anchor_id], Self::row_to_post)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(posts)
    }
}

impl<'a> PostRepository for SqlitePostRepository<'a> {
    fn insert_batch(&self, posts: &[Post]) -> Result<usize, DomainError> {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| DomainError::Database(format!("failed to begin transaction: {}", e)))?;

        let result = posts.iter().try_for_each(|post| self.insert(post));

        match result {
            Ok(()) => {
                self.conn
                    .execute_batch("COMMIT")
                    .map_err(|e| DomainError::Database(format!("failed to commit transaction: {}", e)))?;
                Ok(posts.len())
            }
            Err(e) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(e)
            }
        }
    }

    fn find_by_id(&self, id: &str) -> Result<Option<Post>, DomainError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM posts WHERE id = ?1", POST_COLUMNS))?;

        let result = stmt.query_row(params![id], Self::row_to_post);

        match result {
            Ok(post) => Ok(Some(post)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn count(&self) -> Result<usize, DomainError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

impl<'a> ThreadSource for SqlitePostRepository<'a> {
    fn get_thread(&self, root_id: &str) -> Result<ThreadData, DomainError> {
        let anchor = self
            .find_by_id(root_id)?
            .ok_or_else(|| DomainError::NotFound(root_id.to_string()))?;
        let ancestors = self.find_ancestors(&anchor)?;
        let replies = self.find_descendants(&anchor.id)?;

        Ok(ThreadData::new(anchor, ancestors, replies))
    }
}
