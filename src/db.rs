//! Conversation history store
//!
//! One row per thread plus its ordered messages. Messages are append-only:
//! saving a state writes only the turns not yet stored.

mod schema;

pub use schema::*;

use crate::state_machine::{ConversationState, TopicClassification};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Thread not found: {0}")]
    ThreadNotFound(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Unreadable message {sequence} in thread {thread_id}: sender {sender:?}")]
    UnreadableMessage {
        thread_id: String,
        sequence: usize,
        sender: String,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // ==================== Router State ====================

    /// Restore a thread as router state, or `None` for an unknown thread
    pub fn load_state(&self, thread_id: &str) -> DbResult<Option<ConversationState>> {
        let conn = self.conn()?;
        let topic_json: Option<Option<String>> = conn
            .query_row(
                "SELECT topic FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(topic_json) = topic_json else {
            return Ok(None);
        };

        let topic = topic_json.and_then(|json| {
            serde_json::from_str::<Option<TopicClassification>>(&json)
                .inspect_err(|e| tracing::warn!(thread_id, error = %e, "Discarding unreadable stored topic"))
                .ok()
                .flatten()
        });

        // Every stored row must load: appends are positioned by row count
        let messages = query_messages(&conn, thread_id)?
            .iter()
            .enumerate()
            .map(|(sequence, stored)| {
                stored.to_chat().ok_or_else(|| DbError::UnreadableMessage {
                    thread_id: thread_id.to_string(),
                    sequence,
                    sender: stored.sender.clone(),
                })
            })
            .collect::<DbResult<Vec<_>>>()?;
        Ok(Some(ConversationState::from_history(messages, topic)))
    }

    /// Persist router state. Creates the thread on first save and appends
    /// only messages beyond those already stored.
    pub fn save_state(&self, thread_id: &str, state: &ConversationState) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = now_rfc3339();
        let topic = serde_json::to_string(&state.topic)?;

        tx.execute(
            "INSERT INTO threads (thread_id, title, topic, created_at, updated_at)
             VALUES (?1, NULL, ?2, ?3, ?3)
             ON CONFLICT(thread_id) DO UPDATE SET topic = ?2, updated_at = ?3",
            params![thread_id, topic, now],
        )?;

        let stored: i64 = tx.query_row(
            "SELECT COUNT(*) FROM messages WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        let already = usize::try_from(stored).unwrap_or(usize::MAX);

        let mut appended = 0usize;
        for (sequence_id, message) in (stored..).zip(state.messages.iter().skip(already)) {
            let message = StoredMessage::from_chat(message);
            tx.execute(
                "INSERT INTO messages (thread_id, sequence_id, sender, content, timestamp, sources)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    thread_id,
                    sequence_id,
                    message.sender,
                    message.content,
                    message.timestamp,
                    message.sources
                ],
            )?;
            appended += 1;
        }
        tx.commit()?;

        tracing::debug!(thread_id, appended, "Saved thread state");
        Ok(())
    }

    // ==================== Thread Operations ====================

    /// All threads, most recently updated first
    pub fn list_threads(&self) -> DbResult<Vec<ThreadSummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT thread_id, title, created_at, updated_at FROM threads
             ORDER BY updated_at DESC",
        )?;
        let threads = stmt
            .query_map([], parse_summary_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(threads)
    }

    pub fn get_thread(&self, thread_id: &str) -> DbResult<Thread> {
        let conn = self.conn()?;
        let summary = conn
            .query_row(
                "SELECT thread_id, title, created_at, updated_at FROM threads WHERE thread_id = ?1",
                params![thread_id],
                parse_summary_row,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::ThreadNotFound(thread_id.to_string())
                }
                other => DbError::Sqlite(other),
            })?;
        let messages = query_messages(&conn, thread_id)?;

        Ok(Thread {
            thread_id: summary.thread_id,
            title: summary.title,
            created_at: summary.created_at,
            updated_at: summary.updated_at,
            messages,
        })
    }

    pub fn rename_thread(&self, thread_id: &str, title: &str) -> DbResult<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE threads SET title = ?1, updated_at = ?2 WHERE thread_id = ?3",
            params![title, now_rfc3339(), thread_id],
        )?;
        if updated == 0 {
            return Err(DbError::ThreadNotFound(thread_id.to_string()));
        }
        Ok(())
    }

    /// Set the title unless one exists. Returns whether it was written.
    pub fn set_title_if_missing(&self, thread_id: &str, title: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE threads SET title = ?1 WHERE thread_id = ?2 AND (title IS NULL OR title = '')",
            params![title, thread_id],
        )?;
        Ok(updated > 0)
    }

    pub fn has_title(&self, thread_id: &str) -> DbResult<bool> {
        let conn = self.conn()?;
        let title: Option<Option<String>> = conn
            .query_row(
                "SELECT title FROM threads WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(title.flatten().is_some_and(|t| !t.is_empty()))
    }

    pub fn delete_thread(&self, thread_id: &str) -> DbResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM messages WHERE thread_id = ?1",
            params![thread_id],
        )?;
        let deleted = tx.execute(
            "DELETE FROM threads WHERE thread_id = ?1",
            params![thread_id],
        )?;
        if deleted == 0 {
            return Err(DbError::ThreadNotFound(thread_id.to_string()));
        }
        tx.commit()?;
        Ok(())
    }
}

fn query_messages(conn: &Connection, thread_id: &str) -> DbResult<Vec<StoredMessage>> {
    let mut stmt = conn.prepare(
        "SELECT sender, content, timestamp, sources FROM messages
         WHERE thread_id = ?1 ORDER BY sequence_id",
    )?;
    let messages = stmt
        .query_map(params![thread_id], |row| {
            Ok(StoredMessage {
                sender: row.get(0)?,
                content: row.get(1)?,
                timestamp: row.get(2)?,
                sources: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(messages)
}

fn parse_summary_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ThreadSummary> {
    Ok(ThreadSummary {
        thread_id: row.get(0)?,
        title: row.get(1)?,
        created_at: parse_datetime(&row.get::<_, String>(2)?),
        updated_at: parse_datetime(&row.get::<_, String>(3)?),
    })
}

/// Fixed-width RFC 3339 so lexical order matches time order
fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
