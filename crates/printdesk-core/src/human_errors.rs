// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for people submitting print requests.
//
// Every technical error is mapped to a plain sentence with a suggestion the
// intake form can show next to the queue.

use crate::error::PrintdeskError;

/// Severity of an error from the submitter's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Storage hiccup; submitting again will likely work.
    Transient,
    /// The submitter must fix something in the form.
    ActionRequired,
    /// Needs an administrator; retrying will not help.
    Permanent,
}

/// A human-readable error with plain message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Short summary (shown as a heading).
    pub message: String,
    /// What the submitter should try (shown as body text).
    pub suggestion: String,
    /// Whether resubmitting the same form is worthwhile.
    pub retriable: bool,
    /// Severity level (drives icon/colour in the form).
    pub severity: Severity,
}

/// Convert a `PrintdeskError` into a `HumanError` for the intake form.
pub fn humanize_error(err: &PrintdeskError) -> HumanError {
    match err {
        // -- Submission errors --
        PrintdeskError::Validation(errors) => HumanError {
            message: "Submission failed! Please fill the form correctly.".into(),
            suggestion: format!("Check these fields: {}.", errors.field_names().join(", ")),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PrintdeskError::UnknownPrinter(name) => HumanError {
            message: "That printer isn't in the list.".into(),
            suggestion: format!("Pick another printer. ({name} may have been removed.)"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PrintdeskError::UnknownSubmission(seq) => HumanError {
            message: "That request doesn't exist.".into(),
            suggestion: format!("Check the submission number ({seq}) and try again."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PrintdeskError::InvalidTransition { from, to } => HumanError {
            message: "That request can't change state like this.".into(),
            suggestion: format!("A request in {from} cannot be moved to {to}."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        // -- Storage --
        PrintdeskError::StorageUnavailable(_) => HumanError {
            message: "The print queue is busy or unreachable.".into(),
            suggestion: "Wait a moment and submit again. Nothing was saved.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintdeskError::IntegrityViolation(_) => HumanError {
            message: "Your request collided with another one.".into(),
            suggestion: "Please submit again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintdeskError::Schema(_) => HumanError {
            message: "The print queue data is damaged.".into(),
            suggestion: "Ask the lab administrator to check the queue storage.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PrintdeskError::FileWrite(_) => HumanError {
            message: "Your model file couldn't be saved.".into(),
            suggestion: "Submit again. If this keeps happening the storage may be full.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PrintdeskError::IntegrityMismatch { .. } => HumanError {
            message: "This model file has been changed since it was submitted.".into(),
            suggestion: "The stored copy doesn't match the upload. Ask the requester to send the file again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PrintdeskError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "It may have been moved or deleted. Try choosing the file again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, the disk may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        PrintdeskError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Ask the lab administrator to check config.json.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },
    }
}
