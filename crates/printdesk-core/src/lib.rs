// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk: Core types and error definitions shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod types;
pub mod waitlist;

pub use config::{AppConfig, StorageBackend};
pub use error::{FieldError, PrintdeskError, ValidationErrors};
pub use types::*;
pub use waitlist::{QueueEntry, running_totals};
