// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tabular backend: printers and submissions as two CSV sheets.
//
// Layout of the data directory:
//   printers.csv      Printer,State
//   submissions.csv   SubmissionNumber,Name,Requester,Printer,Material,Color,
//                     Note,FileName,State,Estimated Time,Total Wait Time
//   .sheet.lock       present while a writer holds the sheets
//
// Writers take the lock file, re-read the sheet, allocate `max + 1`, and
// replace the sheet through a temporary file renamed over the old one.
// Readers never see a half-written sheet.  Rows are never deleted, so the
// highest number on the sheet is also the highest ever issued.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::{
    Color, Material, NewSubmission, Printer, PrinterFilter, PrinterStatus, RequesterCategory,
    SequenceNumber, Submission, SubmissionFilter, SubmissionState,
};

use crate::store::SubmissionStore;
use crate::vault::FileVault;

const PRINTERS_FILE: &str = "printers.csv";
const SUBMISSIONS_FILE: &str = "submissions.csv";
const LOCK_FILE: &str = ".sheet.lock";

const PRINTER_COLUMNS: &[&str] = &["Printer", "State"];
const SUBMISSION_COLUMNS: &[&str] = &[
    "SubmissionNumber",
    "Name",
    "Requester",
    "Printer",
    "Material",
    "Color",
    "Note",
    "FileName",
    "State",
    "Estimated Time",
    "Total Wait Time",
];

/// Delay between attempts to take the sheet lock.
const LOCK_POLL: Duration = Duration::from_millis(25);

/// A lock file older than this was left by a writer that died.
const STALE_LOCK_AGE: Duration = Duration::from_secs(10 * 60);

// ---------------------------------------------------------------------------
// Sheet rows
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct PrinterRow {
    #[serde(rename = "Printer")]
    printer: String,
    #[serde(rename = "State")]
    state: PrinterStatus,
}

#[derive(Debug, Serialize, Deserialize)]
struct SubmissionRow {
    #[serde(rename = "SubmissionNumber")]
    submission_number: u64,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Requester")]
    requester: RequesterCategory,
    #[serde(rename = "Printer")]
    printer: String,
    #[serde(rename = "Material")]
    material: Material,
    #[serde(rename = "Color")]
    color: Color,
    #[serde(rename = "Note")]
    note: String,
    #[serde(rename = "FileName")]
    file_name: String,
    #[serde(rename = "State")]
    state: SubmissionState,
    #[serde(rename = "Estimated Time")]
    estimated_time: u32,
    #[serde(rename = "Total Wait Time")]
    total_wait_time: Option<u64>,
}

impl From<SubmissionRow> for Submission {
    fn from(row: SubmissionRow) -> Self {
        Self {
            sequence_number: SequenceNumber(row.submission_number),
            name: row.name,
            requester: row.requester,
            printer: row.printer,
            material: row.material,
            color: row.color,
            note: row.note,
            file_reference: row.file_name,
            state: row.state,
            estimated_minutes: row.estimated_time,
            cumulative_wait_minutes: row.total_wait_time,
        }
    }
}

impl From<&Submission> for SubmissionRow {
    fn from(sub: &Submission) -> Self {
        Self {
            submission_number: sub.sequence_number.0,
            name: sub.name.clone(),
            requester: sub.requester,
            printer: sub.printer.clone(),
            material: sub.material,
            color: sub.color,
            note: sub.note.clone(),
            file_name: sub.file_reference.clone(),
            state: sub.state,
            estimated_time: sub.estimated_minutes,
            total_wait_time: sub.cumulative_wait_minutes,
        }
    }
}

// ---------------------------------------------------------------------------
// Writer lock
// ---------------------------------------------------------------------------

/// Exclusive writer lock, held for as long as the guard lives.
///
/// The lock is a file created with `create_new`, which the filesystem grants
/// to exactly one process at a time.
#[derive(Debug)]
struct SheetLock {
    path: PathBuf,
}

impl SheetLock {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Owner pid, for whoever has to clear a stale lock.
                    let _ = writeln!(file, "{}", std::process::id());
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if clear_stale_lock(path) {
                        continue;
                    }
                    if Instant::now() >= deadline {
                        return Err(PrintdeskError::StorageUnavailable(format!(
                            "sheets are locked by another writer (remove {} if no writer is running)",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(PrintdeskError::StorageUnavailable(format!(
                        "take lock {}: {e}",
                        path.display()
                    )));
                }
            }
        }
    }
}

/// Remove the lock file at `path` if it is older than `STALE_LOCK_AGE`.
///
/// Returns true when a stale lock was removed.
fn clear_stale_lock(path: &Path) -> bool {
    let age = fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok());
    match age {
        Some(age) if age >= STALE_LOCK_AGE => {
            let owner = fs::read_to_string(path).unwrap_or_default();
            match fs::remove_file(path) {
                Ok(()) => {
                    warn!(
                        path = %path.display(),
                        owner = owner.trim(),
                        age_secs = age.as_secs(),
                        "removed stale sheet lock"
                    );
                    true
                }
                // Another writer removed or replaced it first.
                Err(_) => false,
            }
        }
        _ => false,
    }
}

impl Drop for SheetLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release sheet lock");
        }
    }
}

// ---------------------------------------------------------------------------
// Sheet I/O
// ---------------------------------------------------------------------------

/// Classify a `csv::Error` into the Printdesk error taxonomy.
fn sheet_err(path: &Path, e: csv::Error) -> PrintdeskError {
    if e.is_io_error() {
        PrintdeskError::StorageUnavailable(format!("{}: {e}", path.display()))
    } else {
        PrintdeskError::Schema(format!("{}: {e}", path.display()))
    }
}

/// Read every row of a sheet after checking its header line.
fn read_sheet<T: DeserializeOwned>(path: &Path, columns: &[&str]) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(|e| sheet_err(path, e))?;

    let headers = reader.headers().map_err(|e| sheet_err(path, e))?.clone();
    if !headers.iter().eq(columns.iter().copied()) {
        return Err(PrintdeskError::Schema(format!(
            "{}: expected columns [{}], found [{}]",
            path.display(),
            columns.join(", "),
            headers.iter().collect::<Vec<_>>().join(", ")
        )));
    }

    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| sheet_err(path, e))
}

/// Replace a sheet atomically: write a sibling temporary file, flush it to
/// disk, then rename it over `path`.
fn write_sheet<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| {
        PrintdeskError::StorageUnavailable(format!("temp sheet in {}: {e}", dir.display()))
    })?;

    {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut tmp);
        writer
            .write_record(columns)
            .map_err(|e| sheet_err(path, e))?;
        for row in rows {
            writer.serialize(row).map_err(|e| sheet_err(path, e))?;
        }
        writer.flush()?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| PrintdeskError::StorageUnavailable(format!("{}: {}", path.display(), e.error)))?;
    Ok(())
}

/// Whether the sheet at `path` is missing or empty.
fn sheet_is_blank(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len() == 0),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(e) => Err(PrintdeskError::StorageUnavailable(format!(
            "{}: {e}",
            path.display()
        ))),
    }
}

/// Create a header-only sheet if it is missing or empty.
///
/// Call with the writer lock held.
fn ensure_sheet(path: &Path, columns: &[&str]) -> Result<()> {
    if sheet_is_blank(path)? {
        write_sheet::<PrinterRow>(path, columns, &[])?;
        info!(path = %path.display(), "empty sheet created");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Flat-file Persistence Adapter backed by two CSV sheets.
pub struct TabularStore {
    printers_path: PathBuf,
    submissions_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
    vault: FileVault,
}

impl TabularStore {
    /// Open (or create) the sheets in `dir`.
    ///
    /// Writers wait up to `lock_timeout` for another writer to finish.  The
    /// lock is only taken here when a sheet has to be created, so opening
    /// existing sheets for reading never waits on a writer.
    #[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
    pub fn open(dir: impl AsRef<Path>, vault: FileVault, lock_timeout: Duration) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| {
            PrintdeskError::StorageUnavailable(format!("create {}: {e}", dir.display()))
        })?;

        let store = Self {
            printers_path: dir.join(PRINTERS_FILE),
            submissions_path: dir.join(SUBMISSIONS_FILE),
            lock_path: dir.join(LOCK_FILE),
            lock_timeout,
            vault,
        };

        if sheet_is_blank(&store.printers_path)? || sheet_is_blank(&store.submissions_path)? {
            let _lock = store.lock()?;
            ensure_sheet(&store.printers_path, PRINTER_COLUMNS)?;
            ensure_sheet(&store.submissions_path, SUBMISSION_COLUMNS)?;
        }

        // Surface a malformed header now rather than on the first submission.
        store.read_printers()?;
        store.read_submissions()?;

        info!("submission sheets opened");
        Ok(store)
    }

    fn lock(&self) -> Result<SheetLock> {
        SheetLock::acquire(&self.lock_path, self.lock_timeout)
    }

    fn read_printers(&self) -> Result<Vec<Printer>> {
        let rows: Vec<PrinterRow> = read_sheet(&self.printers_path, PRINTER_COLUMNS)?;
        Ok(rows
            .into_iter()
            .map(|r| Printer::new(r.printer, r.state))
            .collect())
    }

    fn read_submissions(&self) -> Result<Vec<Submission>> {
        let rows: Vec<SubmissionRow> = read_sheet(&self.submissions_path, SUBMISSION_COLUMNS)?;
        Ok(rows.into_iter().map(Submission::from).collect())
    }

    fn write_submissions(&self, submissions: &[Submission]) -> Result<()> {
        let rows: Vec<SubmissionRow> = submissions.iter().map(SubmissionRow::from).collect();
        write_sheet(&self.submissions_path, SUBMISSION_COLUMNS, &rows)
    }

    /// Add a printer to the roster, or update its status if it exists.
    ///
    /// The roster is normally edited by hand.
    #[instrument(skip(self))]
    pub fn register_printer(&self, name: &str, status: PrinterStatus) -> Result<()> {
        let _lock = self.lock()?;
        let mut printers = self.read_printers()?;
        match printers.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.status = status,
            None => printers.push(Printer::new(name, status)),
        }
        let rows: Vec<PrinterRow> = printers
            .into_iter()
            .map(|p| PrinterRow {
                printer: p.name,
                state: p.status,
            })
            .collect();
        write_sheet(&self.printers_path, PRINTER_COLUMNS, &rows)?;
        info!(printer = name, status = %status, "printer registered");
        Ok(())
    }
}

/// Highest number on the sheet plus one.
///
/// Only sound while the writer lock is held.
fn next_after(submissions: &[Submission]) -> SequenceNumber {
    submissions
        .iter()
        .map(|s| s.sequence_number)
        .max()
        .map_or(SequenceNumber::FIRST, SequenceNumber::next)
}

/// Reject a sheet on which some number appears twice.
fn check_unique(submissions: &[Submission]) -> Result<()> {
    let mut numbers: Vec<SequenceNumber> = submissions.iter().map(|s| s.sequence_number).collect();
    numbers.sort_unstable();
    match numbers.windows(2).find(|w| w[0] == w[1]) {
        Some(w) => Err(PrintdeskError::IntegrityViolation(format!(
            "submission number {} appears more than once",
            w[0]
        ))),
        None => Ok(()),
    }
}

impl SubmissionStore for TabularStore {
    fn backend_name(&self) -> &'static str {
        "tabular"
    }

    fn next_sequence_number(&self) -> Result<SequenceNumber> {
        Ok(next_after(&self.read_submissions()?))
    }

    #[instrument(skip(self))]
    fn list_printers(&self, filter: PrinterFilter) -> Result<Vec<Printer>> {
        Ok(self
            .read_printers()?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect())
    }

    #[instrument(skip(self))]
    fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
        let mut submissions: Vec<Submission> = self
            .read_submissions()?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect();
        submissions.sort_by_key(|s| s.sequence_number);
        debug!(count = submissions.len(), "submissions listed");
        Ok(submissions)
    }

    #[instrument(skip(self, record), fields(printer = %record.printer))]
    fn create_submission(&mut self, record: NewSubmission) -> Result<Submission> {
        let _lock = self.lock()?;
        let mut submissions = self.read_submissions()?;
        check_unique(&submissions)?;

        let seq = next_after(&submissions);
        let submission = record.into_submission(seq);
        submissions.push(submission.clone());
        self.write_submissions(&submissions)?;

        info!(seq = %seq, "submission appended");
        Ok(submission)
    }

    #[instrument(skip(self))]
    fn update_state(&mut self, seq: SequenceNumber, state: SubmissionState) -> Result<()> {
        let _lock = self.lock()?;
        let mut submissions = self.read_submissions()?;
        let target = submissions
            .iter_mut()
            .find(|s| s.sequence_number == seq)
            .ok_or(PrintdeskError::UnknownSubmission(seq))?;
        target.state = state;
        self.write_submissions(&submissions)?;

        debug!(seq = %seq, state = %state, "submission state updated");
        Ok(())
    }

    fn register_printer(&mut self, name: &str, status: PrinterStatus) -> Result<()> {
        TabularStore::register_printer(self, name, status)
    }

    fn vault(&self) -> &FileVault {
        &self.vault
    }
}
