// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdesk request queue.
//
// Every enumerated domain is a closed type.  Each one is persisted as the
// exact string the lab spreadsheet and database carry, so both storage
// backends read and write the same vocabulary.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Unique, strictly increasing identifier of a submission.
///
/// Used both as the primary key and as the ordering key of every waitlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(pub u64);

impl SequenceNumber {
    /// Number handed to the very first submission of an empty store.
    pub const FIRST: Self = Self(1);

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Deterministic name of the uploaded model stored for this submission.
    pub fn file_name(self, extension: &str) -> String {
        format!("submission_{}.{}", self.0, extension.to_ascii_lowercase())
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A stored string did not name any variant of the expected enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {kind} `{value}`")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Declare a closed enumeration together with its stored string form.
///
/// Generates `ALL`, `as_str`, `Display`, case-insensitive `FromStr`, and
/// string-based serde impls so that CSV rows and JSON config use the same
/// spelling as the SQLite columns.
macro_rules! stored_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Stored spelling of this value.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().eq_ignore_ascii_case(trimmed))
                    .ok_or_else(|| ParseEnumError {
                        kind: $kind,
                        value: trimmed.to_owned(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

stored_enum! {
    /// Operational state of a printer, administered outside Printdesk.
    PrinterStatus, "printer status" {
        /// Idle and ready for new work.
        Available => "Available",
        /// Printing, but still accepting new requests onto its waitlist.
        Busy => "Busy",
        /// Switched off or unreachable.
        Offline => "Offline",
        /// Out of service for upkeep.
        Maintenance => "Maintenance",
    }
}

impl PrinterStatus {
    /// Whether requesters may currently pick this printer.
    pub fn accepts_work(&self) -> bool {
        matches!(self, Self::Available | Self::Busy)
    }
}

stored_enum! {
    /// Material a job is printed in.
    Material, "material" {
        Pla => "PLA",
        Abs => "ABS",
        Petg => "PETG",
        Resin => "RESINE",
    }
}

impl Material {
    /// Materials a printer of `class` can print.
    pub fn allowed_for(class: PrinterClass) -> &'static [Material] {
        match class {
            PrinterClass::Resin => &[Material::Resin],
            PrinterClass::Filament => &[Material::Pla, Material::Abs, Material::Petg],
        }
    }

    pub fn is_compatible_with(&self, class: PrinterClass) -> bool {
        Self::allowed_for(class).contains(self)
    }
}

stored_enum! {
    /// Requested colour of the print.
    Color, "color" {
        /// No colour preference; also means "no preview requested".
        Any => "Quelconque",
        Black => "Noir",
        Red => "Rouge",
        Blue => "Bleu",
        Green => "Vert",
    }
}

impl Color {
    pub fn is_unspecified(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Display colour handed to the preview renderer, if a preview applies.
    pub fn preview_hex(&self) -> Option<&'static str> {
        match self {
            Self::Any => None,
            Self::Black => Some("#222222"),
            Self::Red => Some("red"),
            Self::Blue => Some("blue"),
            Self::Green => Some("green"),
        }
    }
}

stored_enum! {
    /// Which programme the requester belongs to.
    RequesterCategory, "requester category" {
        Innovation => "INNOVATION",
        Startups => "STARTUPS",
    }
}

stored_enum! {
    /// Lifecycle of a submission.
    SubmissionState, "submission state" {
        /// Accepted and waiting for its printer.
        Waitlist => "Waitlist",
        Printing => "Printing",
        Done => "Done",
        Cancelled => "Cancelled",
    }
}

impl SubmissionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled)
    }

    /// Allowed lifecycle moves: Waitlist → Printing → Done, and
    /// cancellation from either non-terminal state.
    pub fn can_transition_to(&self, next: SubmissionState) -> bool {
        matches!(
            (self, next),
            (Self::Waitlist, Self::Printing)
                | (Self::Waitlist, Self::Cancelled)
                | (Self::Printing, Self::Done)
                | (Self::Printing, Self::Cancelled)
        )
    }
}

/// Material family a printer works with, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrinterClass {
    /// FDM printers (PLA, ABS, PETG).
    Filament,
    /// The resin printer.
    Resin,
}

impl PrinterClass {
    /// Name the resin printer carries in the roster.
    pub const RESIN_PRINTER_NAME: &'static str = "Resine";

    pub fn for_printer(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case(Self::RESIN_PRINTER_NAME) {
            Self::Resin
        } else {
            Self::Filament
        }
    }
}

/// A printer in the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Printer {
    /// Unique printer name.
    pub name: String,
    pub status: PrinterStatus,
}

impl Printer {
    pub fn new(name: impl Into<String>, status: PrinterStatus) -> Self {
        Self {
            name: name.into(),
            status,
        }
    }

    pub fn class(&self) -> PrinterClass {
        PrinterClass::for_printer(&self.name)
    }
}

/// A persisted print request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub sequence_number: SequenceNumber,
    /// Requester's name.
    pub name: String,
    pub requester: RequesterCategory,
    /// Name of the chosen printer.
    pub printer: String,
    pub material: Material,
    pub color: Color,
    pub note: String,
    /// Name of the stored model file (`submission_<n>.<ext>`).
    pub file_reference: String,
    pub state: SubmissionState,
    /// Estimated print time in minutes.
    pub estimated_minutes: u32,
    /// Cumulative wait cached at creation time.  Derived, not authoritative;
    /// absent on rows written before the column existed.
    pub cumulative_wait_minutes: Option<u64>,
}

/// A validated submission that has not been assigned a sequence number yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    pub name: String,
    pub requester: RequesterCategory,
    pub printer: String,
    pub material: Material,
    pub color: Color,
    pub note: String,
    /// Extension of the uploaded model, used to derive the stored file name.
    pub file_extension: String,
    pub estimated_minutes: u32,
    pub cumulative_wait_minutes: u64,
}

impl NewSubmission {
    /// Materialise the record under the number the store allocated.
    ///
    /// New submissions always enter the waitlist.
    pub fn into_submission(self, sequence_number: SequenceNumber) -> Submission {
        Submission {
            sequence_number,
            file_reference: sequence_number.file_name(&self.file_extension),
            name: self.name,
            requester: self.requester,
            printer: self.printer,
            material: self.material,
            color: self.color,
            note: self.note,
            state: SubmissionState::Waitlist,
            estimated_minutes: self.estimated_minutes,
            cumulative_wait_minutes: Some(self.cumulative_wait_minutes),
        }
    }
}

/// Which printers `list_printers` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PrinterFilter {
    #[default]
    All,
    /// Only printers whose status accepts new work.
    AcceptingWork,
}

impl PrinterFilter {
    pub fn matches(&self, printer: &Printer) -> bool {
        match self {
            Self::All => true,
            Self::AcceptingWork => printer.status.accepts_work(),
        }
    }
}

/// Selection of submissions; every unset field matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionFilter {
    pub state: Option<SubmissionState>,
    pub printer: Option<String>,
    /// Inclusive upper bound on the sequence number.
    pub up_to: Option<SequenceNumber>,
}

impl SubmissionFilter {
    /// Waitlisted submissions of one printer.
    pub fn waitlist_for(printer: impl Into<String>) -> Self {
        Self {
            state: Some(SubmissionState::Waitlist),
            printer: Some(printer.into()),
            up_to: None,
        }
    }

    pub fn up_to(mut self, bound: Option<SequenceNumber>) -> Self {
        self.up_to = bound;
        self
    }

    pub fn matches(&self, submission: &Submission) -> bool {
        self.state.is_none_or(|s| submission.state == s)
            && self
                .printer
                .as_deref()
                .is_none_or(|p| submission.printer == p)
            && self.up_to.is_none_or(|n| submission.sequence_number <= n)
    }
}
