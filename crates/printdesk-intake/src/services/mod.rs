// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: opens the configured backend and audit trail and exposes
// the workflow to a front end (the CLI today).

pub mod app_services;
pub mod data_dir;

pub use app_services::{FileCheck, IntakeService};
