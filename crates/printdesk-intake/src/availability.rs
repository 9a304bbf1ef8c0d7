// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer availability view.

use printdesk_core::error::Result;
use printdesk_core::types::{Printer, PrinterFilter};
use printdesk_store::SubmissionStore;

/// Printers a requester may pick: Available and Busy, in roster order.
pub fn available_printers(store: &dyn SubmissionStore) -> Result<Vec<Printer>> {
    store.list_printers(PrinterFilter::AcceptingWork)
}

/// The whole roster, each printer paired with whether it can be selected.
///
/// Offline and maintenance printers are shown for information only.
pub fn printer_roster(store: &dyn SubmissionStore) -> Result<Vec<(Printer, bool)>> {
    Ok(store
        .list_printers(PrinterFilter::All)?
        .into_iter()
        .map(|p| {
            let selectable = p.status.accepts_work();
            (p, selectable)
        })
        .collect())
}
