// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the waitlist running-total computation in the
// printdesk-core crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printdesk_core::{
    Color, Material, RequesterCategory, SequenceNumber, Submission, SubmissionState,
    running_totals,
};

// ---------------------------------------------------------------------------
// Helper: synthetic submission history
// ---------------------------------------------------------------------------

/// Build `count` submissions spread over four printers, one in five no longer
/// on the waitlist.
fn history(count: u64) -> Vec<Submission> {
    (1..=count)
        .map(|n| Submission {
            sequence_number: SequenceNumber(n),
            name: format!("requester {n}"),
            requester: RequesterCategory::Startups,
            printer: format!("P{}", n % 4),
            material: Material::Petg,
            color: Color::Blue,
            note: String::new(),
            file_reference: SequenceNumber(n).file_name("stl"),
            state: if n % 5 == 0 {
                SubmissionState::Done
            } else {
                SubmissionState::Waitlist
            },
            estimated_minutes: (n % 240) as u32,
            cumulative_wait_minutes: None,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Queue computation over histories from a small lab to a busy semester.
fn bench_running_totals(c: &mut Criterion) {
    let mut group = c.benchmark_group("running_totals");
    for &count in &[100u64, 1_000, 10_000] {
        let subs = history(count);
        group.bench_function(format!("{count} submissions"), |b| {
            b.iter(|| {
                let queue = running_totals(black_box(subs.clone()), "P1", None);
                black_box(queue);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_running_totals);
criterion_main!(benches);
