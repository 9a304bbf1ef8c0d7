// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Submission workflow.
//
// Order of side effects for an accepted request:
//   1. validate every field (nothing written on failure)
//   2. stage the upload under an anonymous name
//   3. sum the waitlist ahead of the new job
//   4. create the record; the store allocates the number atomically
//   5. promote the staged upload to `submission_<n>.<ext>`
//   6. record the acceptance in the audit trail
//   7. read back the queue up to the new number
//
// If step 5 fails the record is moved to Cancelled so that no waitlisted
// submission ever points at a missing file.  Once step 5 succeeds the
// submission is accepted; a failed read-back in step 7 only degrades the
// returned queue to the new entry alone.

use printdesk_core::config::AppConfig;
use printdesk_core::error::{PrintdeskError, Result, ValidationErrors};
use printdesk_core::types::{NewSubmission, SequenceNumber, Submission, SubmissionState};
use printdesk_core::waitlist::{QueueEntry, wait_behind};
use printdesk_store::{AuditAction, AuditLog, SubmissionStore};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::validation::{SubmissionRequest, validate};
use crate::waitlist::compute_queue;

/// An accepted submission and the queue it joined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionReceipt {
    pub submission: Submission,
    /// The printer's waitlist up to and including the new submission.
    pub queue: Vec<QueueEntry>,
}

impl SubmissionReceipt {
    /// Minutes until the new job is expected to finish, counting every job
    /// ahead of it.
    pub fn cumulative_wait_minutes(&self) -> u64 {
        self.queue
            .last()
            .map_or(0, |entry| entry.cumulative_wait_minutes)
    }
}

/// Result of a submission attempt that reached the store.
#[derive(Debug)]
pub enum SubmissionOutcome {
    Accepted(SubmissionReceipt),
    /// The form was rejected.  `queue` is the unchanged waitlist of the
    /// selected printer, empty when no known printer was selected.
    Rejected {
        errors: ValidationErrors,
        queue: Vec<QueueEntry>,
    },
}

/// Record an audit event, logging rather than failing when the trail is
/// unavailable.
fn audit(
    log: Option<&AuditLog>,
    action: AuditAction,
    seq: Option<SequenceNumber>,
    file_hash: Option<&str>,
    success: bool,
    details: Option<&str>,
) {
    if let Some(log) = log {
        if let Err(e) = log.record(action, seq, file_hash, success, details) {
            error!(error = %e, %action, "failed to record audit entry");
        }
    }
}

/// Validate `request` and, if it holds up, append it to its printer's
/// waitlist.
///
/// Field problems are returned as `SubmissionOutcome::Rejected` with nothing
/// written.  Storage failures before the upload is stored are returned as
/// errors.
#[instrument(skip_all, fields(printer = %request.printer.trim()))]
pub fn submit(
    store: &mut dyn SubmissionStore,
    config: &AppConfig,
    audit_log: Option<&AuditLog>,
    request: SubmissionRequest,
) -> Result<SubmissionOutcome> {
    let valid = match validate(&request, &*store, config) {
        Ok(valid) => valid,
        Err(PrintdeskError::Validation(errors)) => {
            warn!(fields = ?errors.field_names(), "submission rejected");
            audit(
                audit_log,
                AuditAction::SubmissionRejected,
                None,
                None,
                false,
                Some(&errors.to_string()),
            );
            let printer = request.printer.trim();
            let queue = if printer.is_empty() {
                Vec::new()
            } else {
                compute_queue(&*store, printer, None)?
            };
            return Ok(SubmissionOutcome::Rejected { errors, queue });
        }
        Err(e) => return Err(e),
    };

    let staged = store.vault().stage(&valid.upload.bytes, &valid.extension)?;
    let file_hash = staged.sha256().to_owned();

    let ahead = compute_queue(&*store, &valid.printer.name, None)?;
    let cumulative = wait_behind(&ahead, valid.estimated_minutes);

    let created = store.create_submission(NewSubmission {
        name: valid.name,
        requester: valid.requester,
        printer: valid.printer.name.clone(),
        material: valid.material,
        color: valid.color,
        note: valid.note,
        file_extension: valid.extension,
        estimated_minutes: valid.estimated_minutes,
        cumulative_wait_minutes: cumulative,
    })?;
    let seq = created.sequence_number;

    if let Err(e) = store.store_file(seq, staged) {
        error!(seq = %seq, error = %e, "upload not stored, cancelling submission");
        if let Err(rollback) = store.update_state(seq, SubmissionState::Cancelled) {
            error!(seq = %seq, error = %rollback, "submission left without its file");
        }
        audit(
            audit_log,
            AuditAction::FileStoreFailed,
            Some(seq),
            Some(&file_hash),
            false,
            Some(&e.to_string()),
        );
        return Err(e);
    }

    audit(
        audit_log,
        AuditAction::SubmissionAccepted,
        Some(seq),
        Some(&file_hash),
        true,
        Some(&created.file_reference),
    );

    let queue = match compute_queue(&*store, &created.printer, Some(seq)) {
        Ok(queue) => queue,
        Err(e) => {
            warn!(seq = %seq, error = %e, "queue read-back failed, returning the new entry only");
            vec![QueueEntry {
                submission: created.clone(),
                cumulative_wait_minutes: cumulative,
            }]
        }
    };
    info!(
        seq = %seq,
        printer = %created.printer,
        wait_minutes = cumulative,
        "submission accepted"
    );

    Ok(SubmissionOutcome::Accepted(SubmissionReceipt {
        submission: created,
        queue,
    }))
}

/// Move submission `seq` to `next`, enforcing the lifecycle.
#[instrument(skip(store, audit_log))]
pub fn transition(
    store: &mut dyn SubmissionStore,
    audit_log: Option<&AuditLog>,
    seq: SequenceNumber,
    next: SubmissionState,
) -> Result<Submission> {
    let mut submission = store
        .get_submission(seq)?
        .ok_or(PrintdeskError::UnknownSubmission(seq))?;
    let from = submission.state;
    if !from.can_transition_to(next) {
        return Err(PrintdeskError::InvalidTransition { from, to: next });
    }

    store.update_state(seq, next)?;
    submission.state = next;

    audit(
        audit_log,
        AuditAction::StateChanged,
        Some(seq),
        None,
        true,
        Some(&format!("{from} -> {next}")),
    );
    info!(seq = %seq, %from, to = %next, "submission state changed");
    Ok(submission)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::validation::Upload;
    use printdesk_core::types::{Printer, PrinterFilter, PrinterStatus, SubmissionFilter};
    use printdesk_store::{FileVault, SqliteStore, TabularStore};

    struct Fixture {
        dir: tempfile::TempDir,
        store: Box<dyn SubmissionStore>,
        audit: AuditLog,
    }

    impl Fixture {
        fn files(&self) -> Vec<String> {
            let mut names: Vec<String> = fs::read_dir(self.dir.path().join("files"))
                .expect("read files dir")
                .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
                .filter(|n| !n.starts_with('.'))
                .collect();
            names.sort();
            names
        }

        fn submit(&mut self, request: SubmissionRequest) -> Result<SubmissionOutcome> {
            submit(
                self.store.as_mut(),
                &AppConfig::default(),
                Some(&self.audit),
                request,
            )
        }
    }

    fn sqlite_fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let vault = FileVault::open(dir.path().join("files")).expect("vault");
        let mut store: Box<dyn SubmissionStore> =
            Box::new(SqliteStore::open_in_memory(vault).expect("store"));
        seed(store.as_mut());
        Fixture {
            dir,
            store,
            audit: AuditLog::open_in_memory().expect("audit"),
        }
    }

    fn tabular_fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("temp dir");
        let vault = FileVault::open(dir.path().join("files")).expect("vault");
        let mut store: Box<dyn SubmissionStore> = Box::new(
            TabularStore::open(
                dir.path().join("tabular"),
                vault,
                std::time::Duration::from_secs(1),
            )
            .expect("store"),
        );
        seed(store.as_mut());
        Fixture {
            dir,
            store,
            audit: AuditLog::open_in_memory().expect("audit"),
        }
    }

    fn seed(store: &mut dyn SubmissionStore) {
        store
            .register_printer("P1", PrinterStatus::Available)
            .expect("P1");
        store
            .register_printer("Resine", PrinterStatus::Available)
            .expect("Resine");
    }

    fn request(printer: &str, material: &str, minutes: u32) -> SubmissionRequest {
        SubmissionRequest {
            name: "Ada".into(),
            requester: "INNOVATION".into(),
            printer: printer.into(),
            material: material.into(),
            color: "Quelconque".into(),
            estimated_minutes: minutes.to_string(),
            note: String::new(),
            upload: Some(Upload {
                file_name: "part.stl".into(),
                bytes: format!("solid part {minutes}").into_bytes(),
            }),
        }
    }

    fn accepted(outcome: SubmissionOutcome) -> SubmissionReceipt {
        match outcome {
            SubmissionOutcome::Accepted(receipt) => receipt,
            SubmissionOutcome::Rejected { errors, .. } => panic!("rejected: {errors}"),
        }
    }

    fn queue_waits(queue: &[QueueEntry]) -> Vec<u64> {
        queue.iter().map(|e| e.cumulative_wait_minutes).collect()
    }

    fn third_job_waits_behind_first_two(mut fx: Fixture) {
        let first = accepted(fx.submit(request("P1", "PLA", 30)).expect("first"));
        let second = accepted(fx.submit(request("P1", "ABS", 45)).expect("second"));
        let third = accepted(fx.submit(request("P1", "PETG", 20)).expect("third"));

        assert_eq!(third.submission.cumulative_wait_minutes, Some(95));
        assert_eq!(third.cumulative_wait_minutes(), 95);
        assert_eq!(queue_waits(&third.queue), vec![30, 75, 95]);
        let order: Vec<_> = third
            .queue
            .iter()
            .map(|e| e.submission.sequence_number)
            .collect();
        assert_eq!(
            order,
            vec![
                first.submission.sequence_number,
                second.submission.sequence_number,
                third.submission.sequence_number
            ]
        );
        assert_eq!(
            fx.files(),
            vec!["submission_1.stl", "submission_2.stl", "submission_3.stl"]
        );
        assert_eq!(
            fx.audit
                .accepted_hash(third.submission.sequence_number)
                .expect("hash")
                .as_deref(),
            Some(printdesk_store::hash_bytes(b"solid part 20").as_str())
        );
    }

    #[test]
    fn third_job_waits_behind_first_two_sqlite() {
        third_job_waits_behind_first_two(sqlite_fixture());
    }

    #[test]
    fn third_job_waits_behind_first_two_tabular() {
        third_job_waits_behind_first_two(tabular_fixture());
    }

    #[test]
    fn first_job_waits_only_for_itself() {
        let mut fx = sqlite_fixture();
        let receipt = accepted(fx.submit(request("P1", "PLA", 40)).expect("submit"));
        assert_eq!(receipt.cumulative_wait_minutes(), 40);
        assert_eq!(receipt.queue.len(), 1);
    }

    #[test]
    fn pla_on_resin_printer_writes_nothing() {
        let mut fx = sqlite_fixture();
        accepted(fx.submit(request("Resine", "RESINE", 60)).expect("resin job"));

        match fx.submit(request("Resine", "PLA", 10)).expect("submit") {
            SubmissionOutcome::Rejected { errors, queue } => {
                assert_eq!(errors.field_names(), vec!["material"]);
                assert_eq!(queue_waits(&queue), vec![60]);
            }
            SubmissionOutcome::Accepted(r) => panic!("accepted {:?}", r.submission),
        }
        let all = fx
            .store
            .list_submissions(&SubmissionFilter::default())
            .expect("list");
        assert_eq!(all.len(), 1);
        assert_eq!(fx.files(), vec!["submission_1.stl"]);
    }

    #[test]
    fn missing_printer_issues_no_number() {
        let mut fx = tabular_fixture();
        let before = fx.store.next_sequence_number().expect("peek");

        match fx.submit(request("", "PLA", 10)).expect("submit") {
            SubmissionOutcome::Rejected { errors, queue } => {
                assert!(errors.contains("printer"));
                assert!(queue.is_empty());
            }
            SubmissionOutcome::Accepted(r) => panic!("accepted {:?}", r.submission),
        }

        assert_eq!(fx.store.next_sequence_number().expect("peek"), before);
        assert!(fx.files().is_empty());
        let recent = fx.audit.recent_entries(1).expect("audit");
        assert_eq!(recent[0].action, "submission_rejected");
        assert_eq!(recent[0].sequence_number, None);
    }

    #[test]
    fn failed_promotion_cancels_the_record() {
        let mut fx = sqlite_fixture();
        // Occupy the final name the next submission will need.
        fs::write(fx.dir.path().join("files").join("submission_1.stl"), b"squatter")
            .expect("seed clash");

        let result = fx.submit(request("P1", "PLA", 30));
        assert!(matches!(result, Err(PrintdeskError::FileWrite(_))));

        let record = fx
            .store
            .get_submission(SequenceNumber(1))
            .expect("get")
            .expect("record kept");
        assert_eq!(record.state, SubmissionState::Cancelled);
        assert!(
            compute_queue(fx.store.as_ref(), "P1", None)
                .expect("queue")
                .is_empty()
        );
        assert_eq!(fx.store.vault().sweep_staging().expect("sweep"), 0);

        let next = accepted(fx.submit(request("P1", "PLA", 15)).expect("retry"));
        assert_eq!(next.submission.sequence_number, SequenceNumber(2));
        assert_eq!(next.cumulative_wait_minutes(), 15);
    }

    /// Store whose listings stop working once a submission was created.
    struct ReadBackFails {
        inner: SqliteStore,
        created: bool,
    }

    impl SubmissionStore for ReadBackFails {
        fn backend_name(&self) -> &'static str {
            "read-back-fails"
        }

        fn next_sequence_number(&self) -> Result<SequenceNumber> {
            self.inner.next_sequence_number()
        }

        fn list_printers(&self, filter: PrinterFilter) -> Result<Vec<Printer>> {
            self.inner.list_printers(filter)
        }

        fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>> {
            if self.created {
                return Err(PrintdeskError::StorageUnavailable("connection dropped".into()));
            }
            self.inner.list_submissions(filter)
        }

        fn create_submission(&mut self, record: NewSubmission) -> Result<Submission> {
            let created = self.inner.create_submission(record)?;
            self.created = true;
            Ok(created)
        }

        fn update_state(&mut self, seq: SequenceNumber, state: SubmissionState) -> Result<()> {
            self.inner.update_state(seq, state)
        }

        fn register_printer(&mut self, name: &str, status: PrinterStatus) -> Result<()> {
            self.inner.register_printer(name, status)
        }

        fn vault(&self) -> &FileVault {
            self.inner.vault()
        }
    }

    #[test]
    fn failed_read_back_still_accepts() {
        let dir = tempfile::tempdir().expect("temp dir");
        let vault = FileVault::open(dir.path().join("files")).expect("vault");
        let mut store = ReadBackFails {
            inner: SqliteStore::open_in_memory(vault).expect("store"),
            created: false,
        };
        seed(&mut store);
        let audit_log = AuditLog::open_in_memory().expect("audit");

        let outcome = submit(
            &mut store,
            &AppConfig::default(),
            Some(&audit_log),
            request("P1", "PLA", 25),
        )
        .expect("accepted despite read-back failure");
        let receipt = accepted(outcome);
        let seq = receipt.submission.sequence_number;

        assert_eq!(receipt.queue.len(), 1);
        assert_eq!(receipt.queue[0].submission, receipt.submission);
        assert_eq!(receipt.cumulative_wait_minutes(), 25);
        assert_eq!(
            audit_log.accepted_hash(seq).expect("hash").as_deref(),
            Some(printdesk_store::hash_bytes(b"solid part 25").as_str())
        );
        assert!(dir.path().join("files").join("submission_1.stl").exists());

        let stored = store
            .inner
            .get_submission(seq)
            .expect("get")
            .expect("record kept");
        assert_eq!(stored.state, SubmissionState::Waitlist);
    }

    #[test]
    fn lifecycle_transitions_are_enforced() {
        let mut fx = sqlite_fixture();
        let seq = accepted(fx.submit(request("P1", "PLA", 30)).expect("submit"))
            .submission
            .sequence_number;

        let printing = transition(
            fx.store.as_mut(),
            Some(&fx.audit),
            seq,
            SubmissionState::Printing,
        )
        .expect("start printing");
        assert_eq!(printing.state, SubmissionState::Printing);

        let back = transition(
            fx.store.as_mut(),
            Some(&fx.audit),
            seq,
            SubmissionState::Waitlist,
        );
        assert!(matches!(
            back,
            Err(PrintdeskError::InvalidTransition {
                from: SubmissionState::Printing,
                to: SubmissionState::Waitlist
            })
        ));

        transition(fx.store.as_mut(), None, seq, SubmissionState::Done).expect("finish");
        let unknown = transition(
            fx.store.as_mut(),
            None,
            SequenceNumber(99),
            SubmissionState::Printing,
        );
        assert!(matches!(
            unknown,
            Err(PrintdeskError::UnknownSubmission(SequenceNumber(99)))
        ));

        let history = fx.audit.entries_for_submission(seq).expect("history");
        let actions: Vec<&str> = history.iter().map(|e| e.action.as_str()).collect();
        assert_eq!(actions, vec!["submission_accepted", "state_changed"]);
    }
}
