// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Intake: from a raw form submission to a place in a printer's
// waitlist.
//
// The workflow functions take the store as `&mut dyn SubmissionStore` and
// never look at which backend is behind it.  `services` wires the configured
// backend, the audit trail, and the data directory together for the binary.

pub mod availability;
pub mod services;
pub mod validation;
pub mod waitlist;
pub mod workflow;

pub use availability::{available_printers, printer_roster};
pub use validation::{SubmissionRequest, Upload, ValidatedRequest, validate};
pub use waitlist::compute_queue;
pub use workflow::{SubmissionOutcome, SubmissionReceipt, submit, transition};
