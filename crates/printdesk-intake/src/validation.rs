// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Submission form validation.
//
// Every field is checked, and all failures are reported together so the
// requester can fix the form in one pass.  Nothing here writes to the store.

use std::path::Path;

use printdesk_core::config::AppConfig;
use printdesk_core::error::{PrintdeskError, Result, ValidationErrors};
use printdesk_core::types::{Color, Material, Printer, RequesterCategory};
use printdesk_store::SubmissionStore;
use serde::{Deserialize, Serialize};

/// An uploaded model file as received from the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    /// Name the file had on the requester's machine.
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    /// Lowercase extension of the original file name, if it has one.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| !e.is_empty())
            .map(str::to_ascii_lowercase)
    }
}

/// Raw form values, exactly as typed or selected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub name: String,
    pub requester: String,
    pub printer: String,
    pub material: String,
    pub color: String,
    /// Estimated print time in whole minutes.
    pub estimated_minutes: String,
    pub note: String,
    pub upload: Option<Upload>,
}

/// A request whose every field checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub name: String,
    pub requester: RequesterCategory,
    pub printer: Printer,
    pub material: Material,
    pub color: Color,
    pub estimated_minutes: u32,
    pub note: String,
    pub upload: Upload,
    /// Extension the stored file will carry.
    pub extension: String,
}

/// Check `request` against the roster in `store` and the upload rules in
/// `config`.
///
/// Field problems come back as `PrintdeskError::Validation` listing every
/// failing field.  Other errors come from reading the roster.
pub fn validate(
    request: &SubmissionRequest,
    store: &dyn SubmissionStore,
    config: &AppConfig,
) -> Result<ValidatedRequest> {
    let mut errors = ValidationErrors::default();

    let name = request.name.trim();
    if name.is_empty() {
        errors.push("name", "is required");
    }

    let requester = required(&mut errors, "requester", &request.requester)
        .and_then(|raw| parse_field::<RequesterCategory>(&mut errors, "requester", raw));

    let upload = check_upload(&mut errors, request.upload.as_ref(), config);

    let printer = match required(&mut errors, "printer", &request.printer) {
        Some(raw) => match store.find_printer(raw)? {
            Some(p) if p.status.accepts_work() => Some(p),
            Some(p) => {
                errors.push("printer", format!("{} is {} and not taking requests", p.name, p.status));
                None
            }
            None => {
                errors.push("printer", format!("no printer named `{raw}`"));
                None
            }
        },
        None => None,
    };

    let material = required(&mut errors, "material", &request.material)
        .and_then(|raw| parse_field::<Material>(&mut errors, "material", raw));
    if let (Some(m), Some(p)) = (material, printer.as_ref()) {
        if !m.is_compatible_with(p.class()) {
            let allowed: Vec<&str> = Material::allowed_for(p.class())
                .iter()
                .map(|m| m.as_str())
                .collect();
            errors.push(
                "material",
                format!("{m} cannot be printed on {} (use {})", p.name, allowed.join(", ")),
            );
        }
    }

    let color = required(&mut errors, "color", &request.color)
        .and_then(|raw| parse_field::<Color>(&mut errors, "color", raw));

    let estimated_minutes = required(&mut errors, "estimated_minutes", &request.estimated_minutes)
        .and_then(|raw| parse_minutes(&mut errors, raw));

    match (requester, upload, printer, material, color, estimated_minutes) {
        (
            Some(requester),
            Some((upload, extension)),
            Some(printer),
            Some(material),
            Some(color),
            Some(estimated_minutes),
        ) if errors.is_empty() => Ok(ValidatedRequest {
            name: name.to_owned(),
            requester,
            printer,
            material,
            color,
            estimated_minutes,
            note: request.note.trim().to_owned(),
            upload,
            extension,
        }),
        _ => Err(PrintdeskError::Validation(errors)),
    }
}

/// Trimmed value of a required field, or `None` after recording the gap.
fn required<'a>(errors: &mut ValidationErrors, field: &'static str, raw: &'a str) -> Option<&'a str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        errors.push(field, "is required");
        None
    } else {
        Some(trimmed)
    }
}

fn parse_field<T>(errors: &mut ValidationErrors, field: &'static str, raw: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| errors.push(field, e.to_string()))
        .ok()
}

fn parse_minutes(errors: &mut ValidationErrors, raw: &str) -> Option<u32> {
    match raw.parse::<i64>() {
        Ok(n) if n < 0 => {
            errors.push("estimated_minutes", "cannot be negative");
            None
        }
        Ok(n) => match u32::try_from(n) {
            Ok(minutes) => Some(minutes),
            Err(_) => {
                errors.push("estimated_minutes", "is unrealistically large");
                None
            }
        },
        Err(_) => {
            errors.push("estimated_minutes", format!("`{raw}` is not a whole number of minutes"));
            None
        }
    }
}

fn check_upload(
    errors: &mut ValidationErrors,
    upload: Option<&Upload>,
    config: &AppConfig,
) -> Option<(Upload, String)> {
    let Some(upload) = upload else {
        errors.push("file", "no file uploaded");
        return None;
    };
    if upload.bytes.is_empty() {
        errors.push("file", format!("{} is empty", upload.file_name));
        return None;
    }
    match upload.extension() {
        Some(ext) if config.accepts_extension(&ext) => Some((upload.clone(), ext)),
        _ => {
            let accepted: Vec<String> = config
                .accepted_extensions
                .iter()
                .map(|e| format!(".{e}"))
                .collect();
            errors.push(
                "file",
                format!("{} is not an accepted model file ({})", upload.file_name, accepted.join(", ")),
            );
            None
        }
    }
}
