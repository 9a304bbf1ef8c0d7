// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line surface of the printdesk binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use printdesk_core::config::StorageBackend;
use printdesk_core::types::{PrinterStatus, SubmissionState};

#[derive(Parser)]
#[command(name = "printdesk")]
#[command(about = "3D print request intake and per-printer waitlists", long_about = None)]
pub struct Cli {
    /// Data directory holding config, databases, and stored files
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Storage backend for this run (sqlite or tabular), overriding config.json
    #[arg(long, global = true, env = "PRINTDESK_BACKEND")]
    pub backend: Option<StorageBackend>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the printers a request can be sent to
    Printers {
        /// Also show offline and maintenance printers
        #[arg(long)]
        all: bool,
    },

    /// Show a printer's waitlist with cumulative wait times
    Queue {
        /// Printer name
        printer: String,
    },

    /// Submit a print request
    ///
    /// Values are checked together; every problem is reported at once.
    Submit {
        /// Requester's name
        #[arg(long, default_value = "")]
        name: String,

        /// Requester category (INNOVATION or STARTUPS)
        #[arg(long, default_value = "")]
        requester: String,

        /// Printer name
        #[arg(long, default_value = "")]
        printer: String,

        /// PLA, ABS, PETG, or RESINE for the resin printer
        #[arg(long, default_value = "")]
        material: String,

        /// Quelconque, Noir, Rouge, Bleu, or Vert
        #[arg(long, default_value = "Quelconque")]
        color: String,

        /// Estimated print time in whole minutes
        #[arg(long, default_value = "")]
        minutes: String,

        /// Free-text note for the operators
        #[arg(long, default_value = "")]
        note: String,

        /// Model file to upload
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Move a submission to another state
    SetState {
        /// Submission number
        seq: u64,

        /// Waitlist, Printing, Done, or Cancelled
        state: SubmissionState,
    },

    /// Add a printer to the roster or change its status
    AddPrinter {
        /// Printer name
        name: String,

        /// Available, Busy, Offline, or Maintenance
        status: PrinterStatus,
    },

    /// Show recent audit trail entries
    Audit {
        /// Number of entries to show
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Check a stored model file against the hash recorded at submission
    Verify {
        /// Submission number
        seq: u64,
    },
}
