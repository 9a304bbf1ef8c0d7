// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Store: durable home of printers and submissions.
//
// One contract (`SubmissionStore`) with two interchangeable backends: a
// relational SQLite database and a pair of flat CSV sheets.  Uploaded model
// files live in a `FileVault` shared by both, and security-relevant events go
// to a separate append-only audit trail.

pub mod audit;
pub mod integrity;
pub mod sqlite;
pub mod store;
pub mod tabular;
pub mod vault;

pub use audit::{AuditAction, AuditEntry, AuditLog};
pub use integrity::{hash_bytes, hash_file, verify_hash};
pub use sqlite::SqliteStore;
pub use store::SubmissionStore;
pub use tabular::TabularStore;
pub use vault::{FileVault, StagedFile};
