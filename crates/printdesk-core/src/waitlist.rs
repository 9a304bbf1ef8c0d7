// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Waitlist accounting: running totals of estimated print time per printer.

use serde::{Deserialize, Serialize};

use crate::types::{SequenceNumber, Submission, SubmissionFilter};

/// One row of a printer's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub submission: Submission,
    /// Estimated minutes of every waitlisted job up to and including this one.
    pub cumulative_wait_minutes: u64,
}

/// Order `submissions` into `printer`'s queue and attach running totals.
///
/// Keeps only waitlisted entries of `printer` numbered at most `as_of` (all of
/// them when `None`), sorts by sequence number, and computes the inclusive
/// prefix sum of estimated minutes.
pub fn running_totals(
    submissions: impl IntoIterator<Item = Submission>,
    printer: &str,
    as_of: Option<SequenceNumber>,
) -> Vec<QueueEntry> {
    let filter = SubmissionFilter::waitlist_for(printer).up_to(as_of);
    let mut queued: Vec<Submission> = submissions
        .into_iter()
        .filter(|s| filter.matches(s))
        .collect();
    queued.sort_by_key(|s| s.sequence_number);

    let mut total: u64 = 0;
    queued
        .into_iter()
        .map(|submission| {
            total += u64::from(submission.estimated_minutes);
            QueueEntry {
                submission,
                cumulative_wait_minutes: total,
            }
        })
        .collect()
}

/// Cumulative wait of a job appended behind `queue`.
///
/// With an empty queue this is the job's own estimate.
pub fn wait_behind(queue: &[QueueEntry], estimated_minutes: u32) -> u64 {
    let ahead = queue.last().map_or(0, |e| e.cumulative_wait_minutes);
    ahead + u64::from(estimated_minutes)
}
