// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk: 3D print request intake
//
// Entry point. Initialises logging, opens the configured store, and runs one
// command.

mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use printdesk_core::error::{PrintdeskError, Result};
use printdesk_core::human_errors::humanize_error;
use printdesk_core::types::SequenceNumber;
use printdesk_core::waitlist::QueueEntry;
use printdesk_intake::services::{FileCheck, IntakeService, data_dir};
use printdesk_intake::{SubmissionOutcome, SubmissionRequest, Upload};

use cli::{Cli, Commands};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            let human = humanize_error(&e);
            eprintln!("{}", human.message);
            eprintln!("{}", human.suggestion);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let dir = data_dir::data_dir(cli.data_dir.as_deref())?;
    let svc = IntakeService::init(dir, cli.backend)?;

    match cli.command {
        Commands::Printers { all } => {
            for (printer, selectable) in svc.printer_roster()? {
                if all || selectable {
                    let marker = if selectable { "" } else { "  (not taking requests)" };
                    println!("{:<20} {}{marker}", printer.name, printer.status);
                }
            }
        }

        Commands::Queue { printer } => {
            print_queue(&svc.queue(&printer)?);
        }

        Commands::Submit {
            name,
            requester,
            printer,
            material,
            color,
            minutes,
            note,
            file,
        } => {
            let upload = file.as_deref().map(read_upload).transpose()?;
            let request = SubmissionRequest {
                name,
                requester,
                printer,
                material,
                color,
                estimated_minutes: minutes,
                note,
                upload,
            };
            match svc.submit(request)? {
                SubmissionOutcome::Accepted(receipt) => {
                    let sub = &receipt.submission;
                    println!(
                        "Submission {} accepted, stored as {}.",
                        sub.sequence_number, sub.file_reference
                    );
                    println!(
                        "Estimated wait on {}: {} minutes.",
                        sub.printer,
                        receipt.cumulative_wait_minutes()
                    );
                    print_queue(&receipt.queue);
                }
                SubmissionOutcome::Rejected { errors, queue } => {
                    let human = humanize_error(&PrintdeskError::Validation(errors.clone()));
                    eprintln!("{}", human.message);
                    for field in &errors.fields {
                        eprintln!("  {}: {}", field.field, field.reason);
                    }
                    if !queue.is_empty() {
                        print_queue(&queue);
                    }
                    return Ok(ExitCode::from(2));
                }
            }
        }

        Commands::SetState { seq, state } => {
            let sub = svc.transition(SequenceNumber(seq), state)?;
            println!("Submission {} is now {}.", sub.sequence_number, sub.state);
        }

        Commands::AddPrinter { name, status } => {
            svc.register_printer(&name, status)?;
            println!("{name} is {status}.");
        }

        Commands::Audit { limit } => {
            for entry in svc.recent_audit_entries(limit)? {
                let seq = entry
                    .sequence_number
                    .map_or_else(|| "-".to_owned(), |s| s.to_string());
                let status = if entry.success { "ok" } else { "FAILED" };
                println!(
                    "{:>5}  {}  {:<20} {:>5}  {:<6} {}",
                    entry.id,
                    entry.timestamp,
                    entry.action,
                    seq,
                    status,
                    entry.details.unwrap_or_default()
                );
            }
        }

        Commands::Verify { seq } => {
            let seq = SequenceNumber(seq);
            match svc.verify_submission_file(seq)? {
                FileCheck::Verified { sha256 } => {
                    println!("Submission {seq}: file intact (sha256 {sha256}).");
                }
                FileCheck::Unrecorded => {
                    println!("Submission {seq}: no hash recorded, nothing to compare.");
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(Upload { file_name, bytes })
}

fn print_queue(queue: &[QueueEntry]) {
    if queue.is_empty() {
        println!("Waitlist is empty.");
        return;
    }
    println!(
        "{:>6}  {:<8} {:<11} {:>10} {:>10}",
        "#", "Material", "Color", "Est. (min)", "Wait (min)"
    );
    for entry in queue {
        let sub = &entry.submission;
        println!(
            "{:>6}  {:<8} {:<11} {:>10} {:>10}",
            sub.sequence_number.to_string(),
            sub.material.as_str(),
            sub.color.as_str(),
            sub.estimated_minutes,
            entry.cumulative_wait_minutes
        );
    }
}
