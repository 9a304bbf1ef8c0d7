// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The persistence contract shared by every backend.

use printdesk_core::error::Result;
use printdesk_core::types::{
    NewSubmission, Printer, PrinterFilter, PrinterStatus, SequenceNumber, Submission,
    SubmissionFilter, SubmissionState,
};

use crate::vault::{FileVault, StagedFile};

/// Durable store of printers and submissions.
///
/// Implementations own every persisted record.  Sequence numbers are
/// allocated inside `create_submission`, atomically with the insert, so two
/// writers can never receive the same number.  Numbers are never reused:
/// records are not deleted, only moved to a terminal state.
///
/// All methods are synchronous.  In an async context, wrap calls in
/// `tokio::task::spawn_blocking`.
pub trait SubmissionStore: Send {
    /// Short backend name for logs (`sqlite`, `tabular`).
    fn backend_name(&self) -> &'static str;

    /// The number the next `create_submission` would receive if no other
    /// writer gets there first.  Informational only.
    fn next_sequence_number(&self) -> Result<SequenceNumber>;

    /// Printers in roster order.
    fn list_printers(&self, filter: PrinterFilter) -> Result<Vec<Printer>>;

    /// Matching submissions in ascending sequence-number order.
    fn list_submissions(&self, filter: &SubmissionFilter) -> Result<Vec<Submission>>;

    /// Allocate the next sequence number and insert `record` under it, in
    /// one atomic step.  The stored file reference is derived from the
    /// allocated number.
    fn create_submission(&mut self, record: NewSubmission) -> Result<Submission>;

    /// Overwrite the state of an existing submission.
    ///
    /// Fails with `UnknownSubmission` if no record carries `seq`.
    fn update_state(&mut self, seq: SequenceNumber, state: SubmissionState) -> Result<()>;

    /// Add a printer to the roster, or update the status of an existing one.
    ///
    /// Administrative; the intake workflow itself never writes printers.
    fn register_printer(&mut self, name: &str, status: PrinterStatus) -> Result<()>;

    /// Where this store keeps uploaded model files.
    fn vault(&self) -> &FileVault;

    /// Promote a staged upload to the final name of submission `seq`.
    ///
    /// Call only after `create_submission` has committed the record.
    fn store_file(&self, seq: SequenceNumber, staged: StagedFile) -> Result<String> {
        self.vault().store_file(seq, staged)
    }

    /// Look up one printer by name.
    fn find_printer(&self, name: &str) -> Result<Option<Printer>> {
        Ok(self
            .list_printers(PrinterFilter::All)?
            .into_iter()
            .find(|p| p.name == name))
    }

    /// Look up one submission by number.
    fn get_submission(&self, seq: SequenceNumber) -> Result<Option<Submission>> {
        let filter = SubmissionFilter {
            up_to: Some(seq),
            ..SubmissionFilter::default()
        };
        Ok(self
            .list_submissions(&filter)?
            .into_iter()
            .rev()
            .find(|s| s.sequence_number == seq))
    }
}

/// Behaviour every backend must show, exercised by each backend's tests.
#[cfg(test)]
pub(crate) mod contract {
    use super::*;
    use printdesk_core::error::PrintdeskError;
    use printdesk_core::types::{Color, Material, RequesterCategory};

    /// Stores handed to these checks carry printers `P1` (Available),
    /// `P2` (Busy), and `Resine` (Offline).
    pub fn draft(printer: &str, minutes: u32) -> NewSubmission {
        NewSubmission {
            name: "Grace".into(),
            requester: RequesterCategory::Startups,
            printer: printer.into(),
            material: Material::Petg,
            color: Color::Green,
            note: "two copies, 20% infill".into(),
            file_extension: "stl".into(),
            estimated_minutes: minutes,
            cumulative_wait_minutes: u64::from(minutes),
        }
    }

    pub fn round_trip_preserves_fields(store: &mut dyn SubmissionStore) {
        let created = store.create_submission(draft("P1", 42)).expect("create");
        assert_eq!(created.file_reference, created.sequence_number.file_name("stl"));

        let read = store
            .get_submission(created.sequence_number)
            .expect("get")
            .expect("present");
        assert_eq!(read, created);
        assert_eq!(read.note, "two copies, 20% infill");
        assert_eq!(read.cumulative_wait_minutes, Some(42));
    }

    /// Leading and trailing whitespace in free text is stored as given.
    pub fn padded_text_round_trips(store: &mut dyn SubmissionStore) {
        let mut record = draft("P1", 15);
        record.name = "Ada ".to_string();
        record.note = "  indented note\n".to_string();
        let created = store.create_submission(record).expect("create");

        let read = store
            .get_submission(created.sequence_number)
            .expect("get")
            .expect("present");
        assert_eq!(read, created);
        assert_eq!(read.name, "Ada ");
        assert_eq!(read.note, "  indented note\n");
    }

    pub fn sequence_numbers_strictly_increase(store: &mut dyn SubmissionStore) {
        let mut previous: Option<SequenceNumber> = None;
        for i in 0..6 {
            let printer = if i % 2 == 0 { "P1" } else { "P2" };
            let peek = store.next_sequence_number().expect("peek");
            let created = store.create_submission(draft(printer, 10)).expect("create");
            assert_eq!(created.sequence_number, peek);
            if let Some(prev) = previous {
                assert!(created.sequence_number > prev);
            }
            previous = Some(created.sequence_number);
        }
        let all = store
            .list_submissions(&SubmissionFilter::default())
            .expect("list");
        let numbers: Vec<u64> = all.iter().map(|s| s.sequence_number.0).collect();
        let mut sorted = numbers.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(numbers, sorted, "ascending and unique");
        assert_eq!(numbers.len(), 6);
    }

    pub fn filters_select_printer_state_and_bound(store: &mut dyn SubmissionStore) {
        let a = store.create_submission(draft("P1", 30)).expect("a");
        let b = store.create_submission(draft("P2", 99)).expect("b");
        let c = store.create_submission(draft("P1", 45)).expect("c");
        let d = store.create_submission(draft("P1", 20)).expect("d");
        store
            .update_state(c.sequence_number, SubmissionState::Printing)
            .expect("start c");

        let waiting = store
            .list_submissions(&SubmissionFilter::waitlist_for("P1"))
            .expect("waitlist");
        let numbers: Vec<_> = waiting.iter().map(|s| s.sequence_number).collect();
        assert_eq!(numbers, vec![a.sequence_number, d.sequence_number]);

        let bounded = store
            .list_submissions(&SubmissionFilter::waitlist_for("P1").up_to(Some(c.sequence_number)))
            .expect("bounded");
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].sequence_number, a.sequence_number);

        let p2 = store
            .list_submissions(&SubmissionFilter::waitlist_for("P2"))
            .expect("p2");
        assert_eq!(p2.len(), 1);
        assert_eq!(p2[0].sequence_number, b.sequence_number);
    }

    pub fn printer_filter_hides_unavailable(store: &dyn SubmissionStore) {
        let all = store.list_printers(PrinterFilter::All).expect("all");
        let names: Vec<&str> = all.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P1", "P2", "Resine"]);

        let open = store
            .list_printers(PrinterFilter::AcceptingWork)
            .expect("accepting");
        let names: Vec<&str> = open.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["P1", "P2"]);
    }

    pub fn update_state_of_unknown_submission_fails(store: &mut dyn SubmissionStore) {
        let result = store.update_state(SequenceNumber(404), SubmissionState::Done);
        assert!(matches!(
            result,
            Err(PrintdeskError::UnknownSubmission(SequenceNumber(404)))
        ));
    }

    pub fn numbers_survive_cancellation(store: &mut dyn SubmissionStore) {
        let first = store.create_submission(draft("P1", 10)).expect("first");
        store
            .update_state(first.sequence_number, SubmissionState::Cancelled)
            .expect("cancel");
        let second = store.create_submission(draft("P1", 10)).expect("second");
        assert!(second.sequence_number > first.sequence_number);
        assert!(
            store
                .list_submissions(&SubmissionFilter::waitlist_for("P1"))
                .expect("waitlist")
                .iter()
                .all(|s| s.sequence_number != first.sequence_number)
        );
    }
}
