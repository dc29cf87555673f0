//! Read-only access to the Messages `chat.db` store.
//!
//! Joins the `chat`, `handle`, `message` and `attachment` tables through
//! their link tables and hands back raw rows for assembly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OpenFlags, Row};

use crate::domain::{AppError, ConversationStub, Result};

const FIND_CHATS_SQL: &str = r"
    SELECT c.ROWID, c.guid, c.chat_identifier, c.display_name
    FROM chat c
    WHERE EXISTS (
        SELECT 1
        FROM chat_handle_join chj
        JOIN handle h ON h.ROWID = chj.handle_id
        WHERE chj.chat_id = c.ROWID AND h.id LIKE ?1 ESCAPE '\'
    )
    ORDER BY c.ROWID";

const ALL_CHATS_SQL: &str = r"
    SELECT c.ROWID, c.guid, c.chat_identifier, c.display_name
    FROM chat c
    ORDER BY c.ROWID";

const PARTICIPANTS_SQL: &str = r"
    SELECT h.id
    FROM chat_handle_join chj
    JOIN handle h ON h.ROWID = chj.handle_id
    WHERE chj.chat_id = ?1 AND h.id IS NOT NULL
    GROUP BY h.id
    ORDER BY MIN(h.ROWID)";

const MESSAGES_SQL: &str = r"
    SELECT
        m.ROWID,
        m.date,
        m.is_from_me,
        h.id,
        m.service,
        m.text,
        m.attributedBody,
        m.item_type,
        m.associated_message_guid,
        m.thread_originator_guid
    FROM chat_message_join cmj
    JOIN message m ON m.ROWID = cmj.message_id
    LEFT JOIN handle h ON h.ROWID = m.handle_id
    WHERE cmj.chat_id = ?1
    ORDER BY m.date ASC, m.ROWID ASC";

const ATTACHMENTS_SQL: &str = r"
    SELECT a.transfer_name, a.mime_type, a.filename
    FROM message_attachment_join maj
    JOIN attachment a ON a.ROWID = maj.attachment_id
    WHERE maj.message_id = ?1
    ORDER BY a.ROWID";

/// Raw message row as stored.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub id: i64,
    /// Nanoseconds since 2001-01-01 UTC; `0` when missing.
    pub date: i64,
    pub is_from_me: bool,
    /// Handle identifier the message was exchanged with.
    pub handle: Option<String>,
    pub service: Option<String>,
    pub text: Option<String>,
    /// Serialized rich-text archive.
    pub attributed_body: Option<Vec<u8>>,
    pub item_type: i64,
    pub associated_message_guid: Option<String>,
    pub thread_originator_guid: Option<String>,
}

/// Raw attachment row as stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawAttachment {
    pub transfer_name: Option<String>,
    pub mime_type: Option<String>,
    pub filename: Option<String>,
}

/// Read-only connection to a Messages database.
///
/// The connection is released when the value is dropped.
pub struct ChatDb {
    conn: Connection,
    path: PathBuf,
}

impl ChatDb {
    /// Opens the store read-only, waiting up to `busy_timeout` on locks.
    ///
    /// # Errors
    /// Returns `StoreUnavailable` if the file is missing, unreadable or not a
    /// database, and `StoreLocked` if another process holds it.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Err(e) = std::fs::metadata(path) {
            let reason = if e.kind() == std::io::ErrorKind::NotFound {
                "file not found".to_string()
            } else {
                e.to_string()
            };
            return Err(AppError::StoreUnavailable {
                path: path.to_path_buf(),
                reason,
            });
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| AppError::from_store(path, e))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| AppError::from_store(path, e))?;
        conn.execute_batch("PRAGMA query_only = ON;")
            .map_err(|e| AppError::from_store(path, e))?;

        // Reading the schema touches the file header, so permission, format
        // and lock problems surface here rather than mid-export.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| AppError::from_store(path, e))?;

        tracing::debug!("Opened message store: {}", path.display());

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Path this store was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Finds conversations with a participant whose identifier contains
    /// `participant_substring`, ignoring ASCII case.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn find_conversations(&self, participant_substring: &str) -> Result<Vec<ConversationStub>> {
        let pattern = like_pattern(participant_substring);
        let stubs = self.load_stubs(FIND_CHATS_SQL, params![pattern])?;

        tracing::debug!(
            "Found {} conversations matching '{}'",
            stubs.len(),
            participant_substring
        );

        Ok(stubs)
    }

    /// Lists every conversation, including ones without participants.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn list_conversations(&self) -> Result<Vec<ConversationStub>> {
        self.load_stubs(ALL_CHATS_SQL, params![])
    }

    /// Loads a conversation's messages, oldest first.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn load_messages(&self, conversation_rowid: i64) -> Result<Vec<RawMessage>> {
        let mut stmt = self.conn.prepare(MESSAGES_SQL).map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map([conversation_rowid], map_message)
            .map_err(|e| self.err(e))?;

        let messages = self.collect_rows(rows)?;
        tracing::debug!(
            "Loaded {} messages for chat {}",
            messages.len(),
            conversation_rowid
        );

        Ok(messages)
    }

    /// Loads the attachments of one message.
    ///
    /// # Errors
    /// Returns error if the query fails.
    pub fn load_attachments(&self, message_id: i64) -> Result<Vec<RawAttachment>> {
        let mut stmt = self
            .conn
            .prepare_cached(ATTACHMENTS_SQL)
            .map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map([message_id], |row| {
                Ok(RawAttachment {
                    transfer_name: text_lossy(row.get_ref(0)?),
                    mime_type: text_lossy(row.get_ref(1)?),
                    filename: text_lossy(row.get_ref(2)?),
                })
            })
            .map_err(|e| self.err(e))?;

        self.collect_rows(rows)
    }

    /// Loads attachments for each message id, keyed by message id.
    ///
    /// # Errors
    /// Returns error if any query fails.
    pub fn load_attachments_for(
        &self,
        message_ids: impl IntoIterator<Item = i64>,
    ) -> Result<HashMap<i64, Vec<RawAttachment>>> {
        let mut by_message = HashMap::new();
        for id in message_ids {
            let attachments = self.load_attachments(id)?;
            if !attachments.is_empty() {
                by_message.insert(id, attachments);
            }
        }
        Ok(by_message)
    }

    fn load_stubs(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ConversationStub>> {
        let mut stmt = self.conn.prepare(sql).map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(ConversationStub {
                    rowid: row.get(0)?,
                    guid: text_lossy(row.get_ref(1)?).unwrap_or_default(),
                    chat_identifier: text_lossy(row.get_ref(2)?).unwrap_or_default(),
                    display_name: text_lossy(row.get_ref(3)?),
                    participants: Vec::new(),
                })
            })
            .map_err(|e| self.err(e))?;

        let mut stubs = self.collect_rows(rows)?;
        for stub in &mut stubs {
            stub.participants = self.load_participants(stub.rowid)?;
        }

        Ok(stubs)
    }

    fn load_participants(&self, conversation_rowid: i64) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare_cached(PARTICIPANTS_SQL)
            .map_err(|e| self.err(e))?;
        let rows = stmt
            .query_map([conversation_rowid], |row| row.get::<_, String>(0))
            .map_err(|e| self.err(e))?;

        self.collect_rows(rows)
    }

    /// Collects rows, skipping malformed ones but failing on store-level errors.
    fn collect_rows<T>(
        &self,
        rows: impl Iterator<Item = rusqlite::Result<T>>,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        for row in rows {
            match row {
                Ok(item) => items.push(item),
                Err(e) => match self.err(e) {
                    err @ (AppError::StoreLocked { .. } | AppError::StoreUnavailable { .. }) => {
                        return Err(err);
                    }
                    err => tracing::warn!("Failed to read row: {}", err),
                },
            }
        }
        Ok(items)
    }

    fn err(&self, err: rusqlite::Error) -> AppError {
        AppError::from_store(&self.path, err)
    }
}

fn map_message(row: &Row<'_>) -> rusqlite::Result<RawMessage> {
    Ok(RawMessage {
        id: row.get(0)?,
        date: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
        is_from_me: row.get::<_, Option<i64>>(2)?.unwrap_or(0) != 0,
        handle: text_lossy(row.get_ref(3)?),
        service: text_lossy(row.get_ref(4)?),
        text: text_lossy(row.get_ref(5)?),
        attributed_body: bytes(row.get_ref(6)?),
        item_type: row.get::<_, Option<i64>>(7)?.unwrap_or(0),
        associated_message_guid: text_lossy(row.get_ref(8)?),
        thread_originator_guid: text_lossy(row.get_ref(9)?),
    })
}

/// Reads a TEXT or BLOB column as text, replacing invalid UTF-8.
fn text_lossy(value: ValueRef<'_>) -> Option<String> {
    match value {
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t).into_owned()),
        _ => None,
    }
}

/// Reads a BLOB or TEXT column as raw bytes.
fn bytes(value: ValueRef<'_>) -> Option<Vec<u8>> {
    match value {
        ValueRef::Blob(b) | ValueRef::Text(b) => Some(b.to_vec()),
        _ => None,
    }
}

/// Builds a `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}
