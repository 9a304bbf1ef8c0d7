// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Waitlist view of a printer, read through the persistence contract.

use printdesk_core::error::Result;
use printdesk_core::types::{SequenceNumber, SubmissionFilter};
use printdesk_core::waitlist::{QueueEntry, running_totals};
use printdesk_store::SubmissionStore;
use tracing::{debug, instrument};

/// Ordered queue of `printer` with the running wait of every entry.
///
/// Only waitlisted submissions numbered at most `as_of` count; `None` takes
/// the whole current waitlist.
#[instrument(skip(store))]
pub fn compute_queue(
    store: &dyn SubmissionStore,
    printer: &str,
    as_of: Option<SequenceNumber>,
) -> Result<Vec<QueueEntry>> {
    let filter = SubmissionFilter::waitlist_for(printer).up_to(as_of);
    let submissions = store.list_submissions(&filter)?;
    let queue = running_totals(submissions, printer, as_of);
    debug!(entries = queue.len(), "queue computed");
    Ok(queue)
}
