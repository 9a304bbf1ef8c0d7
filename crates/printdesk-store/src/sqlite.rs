// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Relational backend: printers and submissions in a SQLite database.
//
// Table and column names match the lab's MySQL schema so the same queries
// work against both databases.  Sequence numbers come from `AUTOINCREMENT`,
// which SQLite never reuses, and every insert runs inside an IMMEDIATE
// transaction so concurrent writers serialise on the database lock.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, ErrorCode, OptionalExtension, TransactionBehavior, params};
use tracing::{debug, info, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::{
    NewSubmission, ParseEnumError, Printer, PrinterFilter, PrinterStatus, SequenceNumber,
    Submission, SubmissionFilter, SubmissionState,
};

use crate::store::SubmissionStore;
use crate::vault::FileVault;

/// SQLite schema for the printer roster and the submissions table.
const CREATE_TABLES_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        printer TEXT NOT NULL UNIQUE,
        state TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS submissions (
        submissionnumber INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        requester TEXT NOT NULL,
        printer TEXT NOT NULL,
        material TEXT NOT NULL,
        color TEXT NOT NULL,
        note TEXT,
        filename TEXT,
        state TEXT NOT NULL,
        estimated_time INTEGER NOT NULL CHECK (estimated_time >= 0),
        total_wait_time INTEGER
    );
"#;

/// Queue lookups filter by printer and state and order by number.
const CREATE_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS submissions_by_printer
    ON submissions (printer, state, submissionnumber)";

/// Columns every submissions table must have after migration.
const REQUIRED_COLUMNS: &[&str] = &[
    "submissionnumber",
    "name",
    "requester",
    "printer",
    "material",
    "color",
    "note",
    "filename",
    "state",
    "estimated_time",
    "total_wait_time",
];

const SELECT_SUBMISSIONS: &str = "SELECT submissionnumber, name, requester, printer, material,
        color, note, filename, state, estimated_time, total_wait_time
     FROM submissions";

/// Classify a `rusqlite::Error` into the Printdesk error taxonomy.
fn db_err(context: &str, e: rusqlite::Error) -> PrintdeskError {
    let msg = format!("{context}: {e}");
    match &e {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => PrintdeskError::IntegrityViolation(msg),
            ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => PrintdeskError::Schema(msg),
            _ => PrintdeskError::StorageUnavailable(msg),
        },
        rusqlite::Error::FromSqlConversionFailure(..)
        | rusqlite::Error::InvalidColumnType(..)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::IntegralValueOutOfRange(..) => PrintdeskError::Schema(msg),
        _ => PrintdeskError::StorageUnavailable(msg),
    }
}

/// Relational Persistence Adapter backed by a SQLite database.
pub struct SqliteStore {
    conn: Connection,
    vault: FileVault,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Waits up to `busy_timeout` for other writers, applies WAL journal
    /// mode, creates missing tables, and checks the submissions columns.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, vault: FileVault, busy_timeout: Duration) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(|e| db_err("open", e))?;

        conn.busy_timeout(busy_timeout)
            .map_err(|e| db_err("busy timeout", e))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| db_err("WAL pragma", e))?;

        Self::init_schema(&conn)?;

        info!("submission database opened");
        Ok(Self { conn, vault })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory(vault: FileVault) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("open in-memory", e))?;
        Self::init_schema(&conn)?;

        debug!("in-memory submission database opened");
        Ok(Self { conn, vault })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(CREATE_TABLES_SQL)
            .map_err(|e| db_err("create tables", e))?;
        Self::migrate_wait_column(conn)?;
        Self::check_columns(conn)?;
        conn.execute_batch(CREATE_INDEX_SQL)
            .map_err(|e| db_err("create index", e))
    }

    fn submission_columns(conn: &Connection) -> Result<Vec<String>> {
        let mut stmt = conn
            .prepare("SELECT name FROM pragma_table_info('submissions')")
            .map_err(|e| db_err("prepare table_info", e))?;
        stmt.query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| db_err("query table_info", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("collect table_info", e))
    }

    /// Databases created before the wait time was cached lack the
    /// `total_wait_time` column; add it.
    fn migrate_wait_column(conn: &Connection) -> Result<()> {
        let columns = Self::submission_columns(conn)?;
        if !columns.iter().any(|c| c == "total_wait_time") {
            conn.execute_batch("ALTER TABLE submissions ADD COLUMN total_wait_time INTEGER")
                .map_err(|e| db_err("add total_wait_time", e))?;
            warn!("migrated submissions table: added total_wait_time");
        }
        Ok(())
    }

    fn check_columns(conn: &Connection) -> Result<()> {
        let columns = Self::submission_columns(conn)?;
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|req| !columns.iter().any(|c| c.eq_ignore_ascii_case(req)))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PrintdeskError::Schema(format!(
                "submissions table lacks columns: {}",
                missing.join(", ")
            )))
        }
    }

    /// Add a printer to the roster, or update its status if it exists.
    ///
    /// The roster is normally administered outside Printdesk.
    #[instrument(skip(self))]
    pub fn register_printer(&self, name: &str, status: PrinterStatus) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO printers (printer, state) VALUES (?1, ?2)
                 ON CONFLICT(printer) DO UPDATE SET state = excluded.state",
                params![name, status.as_str()],
            )
            .map_err(|e| db_err("register printer", e))?;
        info!(printer = name, status = %status, "printer registered");
        Ok(())
    }
}

impl SubmissionStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    fn next_sequence_number(&self) -> Result<SequenceNumber> {
        let last: Option<i64> = self
            .conn
            .query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'submissions'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| db_err("read sqlite_sequence", e))?;
        match last {
            Some(n) => {
                let n = u64::try_from(n)
                    .map_err(|e| PrintdeskError::Schema(format!("sequence counter {n}: {e}")))?;
                Ok(SequenceNumber(n).next())
            }
            None => Ok(SequenceNumber::FIRST),
        }
    }

    #[instrument(skip(self))]
    fn list_printers(&self, filter: PrinterFilter) -> Result<Vec<Printer>> {
        let mut stmt = self
            .conn
            .prepare("SELECT printer, state FROM printers ORDER BY id ASC")
            .map_err(|e| db_err("prepare list_printers", e))?;

        let printers = stmt
            .query_map([], |row| {
                Ok(Printer {
                    name: row.get(0)?,
                    status: parse_column(row, 1)?,
                })
            })
            .map_err(|e| db_err("query list_printers", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("collect printers", e))?;

        Ok(printers.into_iter().filter(|p| filter.matches(p)).collect())
    }

    #[instrument(skip(self))]
    fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let mut clauses: Vec<&str> = Vec::new();
        let mut args: Vec<Value> = Vec::new();
        if let Some(state) = filter.state {
            clauses.push("state = ?");
            args.push(Value::Text(state.as_str().to_owned()));
        }
        if let Some(printer) = &filter.printer {
            clauses.push("printer = ?");
            args.push(Value::Text(printer.clone()));
        }
        if let Some(bound) = filter.up_to {
            clauses.push("submissionnumber <= ?");
            args.push(Value::Integer(i64::try_from(bound.0).unwrap_or(i64::MAX)));
        }

        let mut sql = String::from(SELECT_SUBMISSIONS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY submissionnumber ASC");

        let mut stmt = self
            .conn
            .prepare(&sql)
            .map_err(|e| db_err("prepare list_submissions", e))?;

        let submissions = stmt
            .query_map(rusqlite::params_from_iter(args), row_to_submission)
            .map_err(|e| db_err("query list_submissions", e))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| db_err("collect submissions", e))?;

        debug!(count = submissions.len(), "submissions listed");
        Ok(submissions)
    }

    #[instrument(skip(self, record), fields(printer = %record.printer))]
    fn create_submission(&mut self, record: NewSubmission) -> Result<Submission> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| db_err("begin", e))?;

        tx.execute(
            "INSERT INTO submissions (name, requester, printer, material, color, note,
                 filename, state, estimated_time, total_wait_time)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)",
            params![
                record.name,
                record.requester.as_str(),
                record.printer,
                record.material.as_str(),
                record.color.as_str(),
                record.note,
                SubmissionState::Waitlist.as_str(),
                i64::from(record.estimated_minutes),
                i64::try_from(record.cumulative_wait_minutes).unwrap_or(i64::MAX),
            ],
        )
        .map_err(|e| db_err("insert submission", e))?;

        let rowid = tx.last_insert_rowid();
        let seq = u64::try_from(rowid)
            .map(SequenceNumber)
            .map_err(|e| PrintdeskError::IntegrityViolation(format!("rowid {rowid}: {e}")))?;
        let submission = record.into_submission(seq);

        tx.execute(
            "UPDATE submissions SET filename = ?1 WHERE submissionnumber = ?2",
            params![submission.file_reference, rowid],
        )
        .map_err(|e| db_err("set filename", e))?;

        tx.commit().map_err(|e| db_err("commit", e))?;

        info!(seq = %seq, "submission inserted");
        Ok(submission)
    }

    #[instrument(skip(self))]
    fn update_state(&mut self, seq: SequenceNumber, state: SubmissionState) -> Result<()> {
        let key = i64::try_from(seq.0).map_err(|_| PrintdeskError::UnknownSubmission(seq))?;
        let rows = self
            .conn
            .execute(
                "UPDATE submissions SET state = ?1 WHERE submissionnumber = ?2",
                params![state.as_str(), key],
            )
            .map_err(|e| db_err("update state", e))?;

        if rows == 0 {
            return Err(PrintdeskError::UnknownSubmission(seq));
        }

        debug!(seq = %seq, state = %state, "submission state updated");
        Ok(())
    }

    fn register_printer(&mut self, name: &str, status: PrinterStatus) -> Result<()> {
        SqliteStore::register_printer(self, name, status)
    }

    fn vault(&self) -> &FileVault {
        &self.vault
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_failure(
    idx: usize,
    ty: Type,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(e))
}

/// Read a text column holding one of the stored enumerations.
fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_failure(idx, Type::Text, e))
}

/// Read an integer column into a narrower unsigned type.
fn unsigned_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: TryFrom<i64, Error = std::num::TryFromIntError>,
{
    let raw: i64 = row.get(idx)?;
    T::try_from(raw).map_err(|e| conversion_failure(idx, Type::Integer, e))
}

/// Map a SQLite row to a `Submission`.
///
/// Column indices must match `SELECT_SUBMISSIONS`.
fn row_to_submission(row: &rusqlite::Row<'_>) -> rusqlite::Result<Submission> {
    let total_wait: Option<i64> = row.get(10)?;
    let cumulative_wait_minutes = total_wait
        .map(u64::try_from)
        .transpose()
        .map_err(|e| conversion_failure(10, Type::Integer, e))?;

    Ok(Submission {
        sequence_number: SequenceNumber(unsigned_column(row, 0)?),
        name: row.get(1)?,
        requester: parse_column(row, 2)?,
        printer: row.get(3)?,
        material: parse_column(row, 4)?,
        color: parse_column(row, 5)?,
        note: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        file_reference: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        state: parse_column(row, 8)?,
        estimated_minutes: unsigned_column(row, 9)?,
        cumulative_wait_minutes,
    })
}
