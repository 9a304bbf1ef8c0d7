// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: append-only SQLite log of every submission outcome.
//
// Schema:
//   audit_log(
//     id              INTEGER PRIMARY KEY AUTOINCREMENT,
//     timestamp       TEXT    NOT NULL,   -- RFC 3339
//     action          TEXT    NOT NULL,   -- see `AuditAction`
//     sequence_number INTEGER,            -- NULL when no number was issued
//     file_hash       TEXT,               -- SHA-256 hex of the upload
//     success         INTEGER NOT NULL,   -- 0 = failure, 1 = success
//     details         TEXT                -- optional free-form context
//   )
//
// The trail lives in its own database file so it survives a switch between
// storage backends.

use std::fmt;
use std::path::Path;

use chrono::Utc;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::SequenceNumber;
use rusqlite::Error::FromSqlConversionFailure;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

const CREATE_AUDIT_SQL: &str = "
    CREATE TABLE IF NOT EXISTS audit_log (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp       TEXT    NOT NULL,
        action          TEXT    NOT NULL,
        sequence_number INTEGER,
        file_hash       TEXT,
        success         INTEGER NOT NULL,
        details         TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_audit_sequence ON audit_log (sequence_number);
";

const SELECT_COLUMNS: &str =
    "SELECT id, timestamp, action, sequence_number, file_hash, success, details FROM audit_log";

fn db_err(e: rusqlite::Error) -> PrintdeskError {
    PrintdeskError::StorageUnavailable(format!("audit log: {e}"))
}

/// Column value for a sequence number; SQLite integers are signed.
fn seq_key(seq: SequenceNumber) -> Result<i64> {
    i64::try_from(seq.0).map_err(|_| {
        PrintdeskError::IntegrityViolation(format!(
            "submission number {seq} does not fit the audit log"
        ))
    })
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SubmissionAccepted,
    SubmissionRejected,
    FileStoreFailed,
    StateChanged,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SubmissionAccepted => "submission_accepted",
            Self::SubmissionRejected => "submission_rejected",
            Self::FileStoreFailed => "file_store_failed",
            Self::StateChanged => "state_changed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single entry in the audit log, used for queries.
///
/// `action` stays a plain string so entries written by newer releases can
/// still be listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: i64,
    pub timestamp: String,
    pub action: String,
    pub sequence_number: Option<SequenceNumber>,
    pub file_hash: Option<String>,
    pub success: bool,
    pub details: Option<String>,
}

impl AuditEntry {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            timestamp: row.get(1)?,
            action: row.get(2)?,
            sequence_number: row
                .get::<_, Option<i64>>(3)?
                .map(u64::try_from)
                .transpose()
                .map_err(|e| FromSqlConversionFailure(3, Type::Integer, Box::new(e)))?
                .map(SequenceNumber),
            file_hash: row.get(4)?,
            success: row.get::<_, i32>(5)? != 0,
            details: row.get(6)?,
        })
    }
}

/// Append-only audit log backed by a SQLite database.
pub struct AuditLog {
    conn: Connection,
}

impl AuditLog {
    /// Open (or create) the audit database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_err)?;

        // Enable WAL for concurrent readers.
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(db_err)?;
        conn.execute_batch(CREATE_AUDIT_SQL).map_err(db_err)?;

        debug!("audit log opened");
        Ok(Self { conn })
    }

    /// Open an in-memory audit database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(CREATE_AUDIT_SQL).map_err(db_err)?;

        debug!("in-memory audit log opened");
        Ok(Self { conn })
    }

    /// Record a new audit entry.
    #[instrument(skip(self, file_hash, details), fields(%action, success))]
    pub fn record(
        &self,
        action: AuditAction,
        sequence_number: Option<SequenceNumber>,
        file_hash: Option<&str>,
        success: bool,
        details: Option<&str>,
    ) -> Result<()> {
        let timestamp = Utc::now().to_rfc3339();
        let seq = sequence_number.map(seq_key).transpose()?;

        self.conn
            .execute(
                "INSERT INTO audit_log
                     (timestamp, action, sequence_number, file_hash, success, details)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    timestamp,
                    action.as_str(),
                    seq,
                    file_hash,
                    i32::from(success),
                    details
                ],
            )
            .map_err(db_err)?;

        debug!("audit entry recorded");
        Ok(())
    }

    /// All entries for one submission, oldest first.
    pub fn entries_for_submission(&self, seq: SequenceNumber) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} WHERE sequence_number = ?1 ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![seq_key(seq)?], AuditEntry::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// The most recent `limit` entries, newest first.
    pub fn recent_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id DESC LIMIT ?1");
        let mut stmt = self.conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params![limit], AuditEntry::from_row)
            .map_err(db_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(db_err)
    }

    /// Digest recorded when submission `seq` was accepted, if any.
    pub fn accepted_hash(&self, seq: SequenceNumber) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT file_hash FROM audit_log
                 WHERE sequence_number = ?1 AND action = ?2 AND success = 1
                 ORDER BY id DESC LIMIT 1",
                params![seq_key(seq)?, AuditAction::SubmissionAccepted.as_str()],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()
            .map(Option::flatten)
            .map_err(db_err)
    }

    /// Total number of entries in the audit log.
    pub fn count(&self) -> Result<u64> {
        self.conn
            .query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))
            .map_err(db_err)
    }
}
