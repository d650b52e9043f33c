//! SQLite-backed message store with a fixed, versioned schema.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};

use super::store::{InsertOutcome, MessageStore};
use crate::error::{RelayError, Result};
use crate::types::{LocalMessage, NewMessage, SenderType, Session, SessionStatus};

const SCHEMA_VERSION: i64 = 1;

const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS chat_sessions (
    session_id     TEXT PRIMARY KEY,
    remote_chat_id TEXT,
    status         TEXT NOT NULL DEFAULT 'active',
    updated_at     TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_sessions_remote ON chat_sessions (remote_chat_id, updated_at);

CREATE TABLE IF NOT EXISTS chat_messages (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL,
    sender_type TEXT NOT NULL,
    sender_id   TEXT,
    message     TEXT NOT NULL,
    remote_id   TEXT UNIQUE,
    created_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_chat_messages_session ON chat_messages (session_id, created_at);
";

const MESSAGE_COLUMNS: &str =
    "id, session_id, sender_type, sender_id, message, remote_id, created_at";

/// Message store on a single SQLite connection.
///
/// The UNIQUE constraint on `remote_id` is the authority on duplicates, so
/// concurrent processes sharing the database file cannot ingest a remote
/// message twice.
pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                RelayError::Storage(format!("Cannot create {}: {err}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RelayError::Storage("database connection lock poisoned".to_string()))
    }
}

fn migrate(conn: &mut Connection) -> Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(RelayError::Storage(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }
    if version < 1 {
        let tx = conn.transaction()?;
        tx.execute_batch(SCHEMA_V1)?;
        tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        tx.commit()?;
        tracing::debug!(version = SCHEMA_VERSION, "Applied message store schema");
    }
    Ok(())
}

/// Fixed-width UTC timestamps so text comparison in SQL orders correctly.
fn format_time(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_time(raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
        })
}

fn parse_enum<T>(raw: String) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = strum::ParseError>,
{
    raw.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(err))
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<LocalMessage> {
    Ok(LocalMessage {
        id: row.get(0)?,
        session_id: row.get(1)?,
        sender_type: parse_enum::<SenderType>(row.get(2)?)?,
        sender_id: row.get(3)?,
        text: row.get(4)?,
        remote_id: row.get(5)?,
        created_at: parse_time(row.get(6)?)?,
    })
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    Ok(Session {
        session_id: row.get(0)?,
        remote_chat_id: row.get(1)?,
        status: parse_enum::<SessionStatus>(row.get(2)?)?,
        updated_at: parse_time(row.get(3)?)?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

impl MessageStore for SqliteMessageStore {
    fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<LocalMessage>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!("SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE remote_id = ?1"),
                params![remote_id],
                message_from_row,
            )
            .optional()?;
        Ok(found)
    }

    fn find_recent_by_text(
        &self,
        session_id: &str,
        text: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LocalMessage>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM chat_messages
                     WHERE session_id = ?1 AND message = ?2 AND created_at >= ?3
                     ORDER BY created_at DESC LIMIT 1"
                ),
                params![session_id, text, format_time(since)],
                message_from_row,
            )
            .optional()?;
        Ok(found)
    }

    fn insert(&self, message: NewMessage) -> Result<InsertOutcome> {
        let conn = self.conn()?;
        let result = conn.execute(
            "INSERT INTO chat_messages (session_id, sender_type, sender_id, message, remote_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.session_id,
                message.sender_type.to_string(),
                message.sender_id,
                message.text,
                message.remote_id,
                format_time(message.created_at),
            ],
        );
        match result {
            Ok(_) => Ok(InsertOutcome::Inserted(
                message.into_local(conn.last_insert_rowid()),
            )),
            Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Duplicate),
            Err(err) => Err(err.into()),
        }
    }

    fn messages_for_session(&self, session_id: &str) -> Result<Vec<LocalMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM chat_messages WHERE session_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![session_id], message_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn get_session(&self, session_id: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let found = conn
            .query_row(
                "SELECT session_id, remote_chat_id, status, updated_at
                 FROM chat_sessions WHERE session_id = ?1",
                params![session_id],
                session_from_row,
            )
            .optional()?;
        Ok(found)
    }

    fn sessions_for_chat(&self, chat_id: &str) -> Result<Vec<Session>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT session_id, remote_chat_id, status, updated_at
             FROM chat_sessions WHERE remote_chat_id = ?1 ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![chat_id], session_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn upsert_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_sessions (session_id, remote_chat_id, status, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id) DO UPDATE SET
                remote_chat_id = excluded.remote_chat_id,
                status = excluded.status,
                updated_at = excluded.updated_at",
            params![
                session.session_id,
                session.remote_chat_id,
                session.status.to_string(),
                format_time(session.updated_at),
            ],
        )?;
        Ok(())
    }

    fn touch_session(&self, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE chat_sessions SET updated_at = ?2 WHERE session_id = ?1",
            params![session_id, format_time(at)],
        )?;
        Ok(())
    }

    fn close_sessions_for_chat(&self, chat_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE chat_sessions SET status = 'closed', updated_at = ?2
             WHERE remote_chat_id = ?1 AND status = 'active'",
            params![chat_id, format_time(Utc::now())],
        )?;
        Ok(changed)
    }
}
