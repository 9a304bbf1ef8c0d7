// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer: opens the configured backend and the audit trail
// and serialises every request through them.
//
// Both stores and the audit log hold a rusqlite connection or file handles
// that are `Send` but not `Sync`, so they are wrapped in `Arc<Mutex<>>`.  The
// store mutex also makes the waitlist read and the insert of one submission a
// single step with respect to other requests in this process.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use printdesk_core::config::{AppConfig, StorageBackend};
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::types::{Printer, PrinterStatus, SequenceNumber, Submission, SubmissionState};
use printdesk_core::waitlist::QueueEntry;
use printdesk_store::{AuditEntry, AuditLog, FileVault, SqliteStore, SubmissionStore, TabularStore};
use tracing::{error, info, warn};

use crate::validation::SubmissionRequest;
use crate::workflow::{self, SubmissionOutcome};
use crate::{availability, waitlist};

/// Outcome of re-hashing a stored upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCheck {
    /// The file matches the digest recorded when it was accepted.
    Verified { sha256: String },
    /// No digest was recorded (audit disabled, or accepted before it was
    /// enabled).
    Unrecorded,
}

/// Shared intake services.
///
/// All fields are Arc-wrapped so the struct can be cloned into worker
/// threads.
#[derive(Clone)]
pub struct IntakeService {
    store: Arc<Mutex<Box<dyn SubmissionStore>>>,
    audit_log: Option<Arc<Mutex<AuditLog>>>,
    data_dir: PathBuf,
    config: Arc<Mutex<AppConfig>>,
}

impl IntakeService {
    /// Initialise all services from the config file in `data_dir`.
    ///
    /// `backend` overrides the configured storage backend for this run.
    pub fn init(data_dir: PathBuf, backend: Option<StorageBackend>) -> Result<Self> {
        let mut config = load_config(&data_dir).unwrap_or_default();
        if let Some(backend) = backend {
            config.backend = backend;
        }
        Self::open_with(data_dir, config)
    }

    /// Open the stores named by `config` under `data_dir`.
    pub fn open_with(data_dir: PathBuf, config: AppConfig) -> Result<Self> {
        info!(path = %data_dir.display(), backend = ?config.backend, "initialising intake services");

        let vault = FileVault::open(config.resolve(&data_dir, &config.files_dir))?;
        let swept = vault.sweep_staging()?;
        if swept > 0 {
            warn!(swept, "removed uploads left over from interrupted submissions");
        }

        let store: Box<dyn SubmissionStore> = match config.backend {
            StorageBackend::Sqlite => Box::new(SqliteStore::open(
                config.resolve(&data_dir, &config.database_file),
                vault,
                config.lock_timeout(),
            )?),
            StorageBackend::Tabular => Box::new(TabularStore::open(
                config.resolve(&data_dir, &config.tabular_dir),
                vault,
                config.lock_timeout(),
            )?),
        };

        let audit_log = if config.audit_enabled {
            let log = AuditLog::open(config.resolve(&data_dir, &config.audit_file))?;
            Some(Arc::new(Mutex::new(log)))
        } else {
            None
        };

        info!(backend = store.backend_name(), "intake services initialised");

        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            audit_log,
            data_dir,
            config: Arc::new(Mutex::new(config)),
        })
    }

    fn store(&self) -> Result<MutexGuard<'_, Box<dyn SubmissionStore>>> {
        self.store
            .lock()
            .map_err(|_| PrintdeskError::StorageUnavailable("store lock poisoned".into()))
    }

    fn audit_guard(&self) -> Result<Option<MutexGuard<'_, AuditLog>>> {
        self.audit_log
            .as_ref()
            .map(|log| {
                log.lock()
                    .map_err(|_| PrintdeskError::StorageUnavailable("audit lock poisoned".into()))
            })
            .transpose()
    }

    /// Name of the active backend (`sqlite` or `tabular`).
    pub fn backend_name(&self) -> Result<&'static str> {
        Ok(self.store()?.backend_name())
    }

    // -- Printers ------------------------------------------------------------

    /// Printers a requester may pick.
    pub fn available_printers(&self) -> Result<Vec<Printer>> {
        availability::available_printers(&**self.store()?)
    }

    /// The whole roster with a selectable flag per printer.
    pub fn printer_roster(&self) -> Result<Vec<(Printer, bool)>> {
        availability::printer_roster(&**self.store()?)
    }

    /// Add or update a printer in the roster.
    pub fn register_printer(&self, name: &str, status: PrinterStatus) -> Result<()> {
        self.store()?.register_printer(name, status)
    }

    // -- Waitlist ------------------------------------------------------------

    /// Current waitlist of `printer` with running waits.
    pub fn queue(&self, printer: &str) -> Result<Vec<QueueEntry>> {
        waitlist::compute_queue(&**self.store()?, printer, None)
    }

    /// Look up one submission.
    pub fn submission(&self, seq: SequenceNumber) -> Result<Submission> {
        self.store()?
            .get_submission(seq)?
            .ok_or(PrintdeskError::UnknownSubmission(seq))
    }

    // -- Workflow ------------------------------------------------------------

    /// Validate and enqueue a submission.
    pub fn submit(&self, request: SubmissionRequest) -> Result<SubmissionOutcome> {
        let config = self.config();
        let mut store = self.store()?;
        let audit = self.audit_guard()?;
        workflow::submit(&mut **store, &config, audit.as_deref(), request)
    }

    /// Move a submission along its lifecycle.
    pub fn transition(&self, seq: SequenceNumber, state: SubmissionState) -> Result<Submission> {
        let mut store = self.store()?;
        let audit = self.audit_guard()?;
        workflow::transition(&mut **store, audit.as_deref(), seq, state)
    }

    // -- Integrity -----------------------------------------------------------

    /// Re-hash the stored upload of `seq` and compare it with the digest
    /// recorded at acceptance.
    pub fn verify_submission_file(&self, seq: SequenceNumber) -> Result<FileCheck> {
        let store = self.store()?;
        let submission = store
            .get_submission(seq)?
            .ok_or(PrintdeskError::UnknownSubmission(seq))?;

        let Some(audit) = self.audit_guard()? else {
            return Ok(FileCheck::Unrecorded);
        };
        let Some(expected) = audit.accepted_hash(seq)? else {
            return Ok(FileCheck::Unrecorded);
        };

        match store.vault().verify(&submission.file_reference, &expected) {
            Ok(()) => {
                info!(seq = %seq, "stored upload verified");
                Ok(FileCheck::Verified { sha256: expected })
            }
            Err(e) => {
                error!(seq = %seq, error = %e, "stored upload failed verification");
                Err(e)
            }
        }
    }

    // -- Audit Trail ---------------------------------------------------------

    /// Most recent audit entries, newest first.  Empty when auditing is off.
    pub fn recent_audit_entries(&self, limit: u32) -> Result<Vec<AuditEntry>> {
        match self.audit_guard()? {
            Some(log) => log.recent_entries(limit),
            None => Ok(Vec::new()),
        }
    }

    // -- Config Persistence --------------------------------------------------

    /// Get a clone of the current config.
    pub fn config(&self) -> AppConfig {
        self.config
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Update and persist the config.  Store paths and the backend take
    /// effect on the next start.
    pub fn save_config(&self, config: &AppConfig) -> Result<()> {
        *self.config.lock().unwrap_or_else(PoisonError::into_inner) = config.clone();
        persist_config(&self.data_dir, config)
    }

    /// Path to the data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

fn load_config(data_dir: &Path) -> Option<AppConfig> {
    let path = data_dir.join(CONFIG_FILE);
    let data = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&data) {
        Ok(config) => Some(config),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable config");
            None
        }
    }
}

fn persist_config(data_dir: &Path, config: &AppConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::validation::Upload;

    fn request(minutes: u32) -> SubmissionRequest {
        SubmissionRequest {
            name: "Grace".into(),
            requester: "STARTUPS".into(),
            printer: "P1".into(),
            material: "PETG".into(),
            color: "Bleu".into(),
            estimated_minutes: minutes.to_string(),
            note: "matte finish".into(),
            upload: Some(Upload {
                file_name: "gear.stl".into(),
                bytes: b"solid gear".to_vec(),
            }),
        }
    }

    fn service(backend: StorageBackend) -> (tempfile::TempDir, IntakeService) {
        let dir = tempfile::tempdir().expect("temp dir");
        let svc = IntakeService::init(dir.path().to_path_buf(), Some(backend)).expect("init");
        svc.register_printer("P1", PrinterStatus::Available)
            .expect("register");
        (dir, svc)
    }

    #[test]
    fn both_backends_serve_the_same_workflow() {
        for backend in [StorageBackend::Sqlite, StorageBackend::Tabular] {
            let (_dir, svc) = service(backend);
            for minutes in [30, 45, 20] {
                match svc.submit(request(minutes)).expect("submit") {
                    SubmissionOutcome::Accepted(_) => {}
                    SubmissionOutcome::Rejected { errors, .. } => panic!("rejected: {errors}"),
                }
            }
            let waits: Vec<u64> = svc
                .queue("P1")
                .expect("queue")
                .iter()
                .map(|e| e.cumulative_wait_minutes)
                .collect();
            assert_eq!(waits, vec![30, 75, 95], "backend {backend:?}");
        }
    }

    #[test]
    fn verification_catches_a_replaced_file() {
        let (dir, svc) = service(StorageBackend::Sqlite);
        svc.submit(request(10)).expect("submit");
        let seq = SequenceNumber(1);

        match svc.verify_submission_file(seq).expect("verify") {
            FileCheck::Verified { sha256 } => {
                assert_eq!(sha256, printdesk_store::hash_bytes(b"solid gear"));
            }
            FileCheck::Unrecorded => panic!("hash should be recorded"),
        }

        fs::write(dir.path().join("files").join("submission_1.stl"), b"solid cog")
            .expect("replace file");
        assert!(matches!(
            svc.verify_submission_file(seq),
            Err(PrintdeskError::IntegrityMismatch { .. })
        ));
        assert!(matches!(
            svc.verify_submission_file(SequenceNumber(9)),
            Err(PrintdeskError::UnknownSubmission(_))
        ));
    }

    #[test]
    fn disabled_audit_records_nothing() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = AppConfig {
            audit_enabled: false,
            ..AppConfig::default()
        };
        let svc = IntakeService::open_with(dir.path().to_path_buf(), config).expect("open");
        svc.register_printer("P1", PrinterStatus::Busy)
            .expect("register");
        svc.submit(request(5)).expect("submit");

        assert!(svc.recent_audit_entries(10).expect("audit").is_empty());
        assert_eq!(
            svc.verify_submission_file(SequenceNumber(1)).expect("verify"),
            FileCheck::Unrecorded
        );
        assert!(!dir.path().join("audit.db").exists());
    }

    #[test]
    fn saved_config_selects_backend_on_next_start() {
        let dir = tempfile::tempdir().expect("temp dir");
        {
            let svc = IntakeService::init(dir.path().to_path_buf(), None).expect("init");
            assert_eq!(svc.backend_name().expect("backend"), "sqlite");
            let config = AppConfig {
                backend: StorageBackend::Tabular,
                ..svc.config()
            };
            svc.save_config(&config).expect("save");
        }
        let svc = IntakeService::init(dir.path().to_path_buf(), None).expect("restart");
        assert_eq!(svc.backend_name().expect("backend"), "tabular");
        assert!(dir.path().join("tabular").join("submissions.csv").exists());
    }

    #[test]
    fn startup_sweeps_interrupted_uploads() {
        let dir = tempfile::tempdir().expect("temp dir");
        let staging = dir.path().join("files").join(".staging");
        fs::create_dir_all(&staging).expect("staging dir");
        fs::write(staging.join("upload-crashed.stl"), b"partial").expect("leftover");

        IntakeService::init(dir.path().to_path_buf(), None).expect("init");
        assert_eq!(fs::read_dir(&staging).expect("read").count(), 0);
    }

    #[test]
    fn transitions_go_through_the_service() {
        let (_dir, svc) = service(StorageBackend::Tabular);
        svc.submit(request(10)).expect("submit");
        let seq = SequenceNumber(1);

        svc.transition(seq, SubmissionState::Printing)
            .expect("printing");
        assert!(svc.queue("P1").expect("queue").is_empty());
        assert_eq!(
            svc.submission(seq).expect("get").state,
            SubmissionState::Printing
        );

        let recent = svc.recent_audit_entries(1).expect("audit");
        assert_eq!(recent[0].action, "state_changed");
    }
}
