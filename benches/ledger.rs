// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Benchmarks for the carpool ledger.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Applying single trips and trip streams
//! - Recomputing a ledger from a full history
//! - Driver suggestion as the group grows
//! - Editing a trip inside a session

use carpool_ledger::{Ledger, Participant, Session, SessionConfig, Trip, TripHistory, suggest};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

// =============================================================================
// Helper Functions
// =============================================================================

fn make_group(size: usize) -> Vec<Participant> {
    (0..size).map(|i| Participant::new(format!("P{i:03}"))).collect()
}

/// Deterministic rotation: trip `i` is driven by member `i % n` of a
/// sliding window of four.
fn make_trips(group: &[Participant], count: usize) -> Vec<Trip> {
    (0..count)
        .map(|i| {
            let passengers: Vec<Participant> = (0..group.len().min(4))
                .map(|k| group[(i + k) % group.len()].clone())
                .collect();
            let driver = passengers[i % passengers.len()].clone();
            Trip::new(driver, passengers)
        })
        .collect()
}

fn make_session(group: &[Participant], trips: &[Trip]) -> Session {
    let mut session = Session::new(SessionConfig::default());
    for p in group {
        session.add_participant(p.as_str()).unwrap();
    }
    for trip in trips {
        session.record_trip(&trip.driver, &trip.passengers).unwrap();
    }
    session
}

// =============================================================================
// Ledger Benchmarks
// =============================================================================

fn bench_apply_trip(c: &mut Criterion) {
    let group = make_group(4);
    c.bench_function("apply_trip", |b| {
        let mut ledger = Ledger::new();
        let mut i = 0usize;
        b.iter(|| {
            let driver = &group[i % group.len()];
            i += 1;
            ledger.apply_trip(black_box(driver), black_box(&group)).unwrap();
        })
    });
}

fn bench_trip_throughput(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("trip_throughput");

    for count in [100, 1_000, 10_000].iter() {
        let trips = make_trips(&make_group(12), *count);
        bench_group.throughput(Throughput::Elements(*count as u64));
        bench_group.bench_with_input(BenchmarkId::from_parameter(count), &trips, |b, trips| {
            b.iter(|| black_box(Ledger::replay(trips).unwrap()))
        });
    }
    bench_group.finish();
}

fn bench_recompute_from_history(c: &mut Criterion) {
    let trips = make_trips(&make_group(12), 20);
    let history = TripHistory::from_trips(trips.into_iter().rev(), 20);

    c.bench_function("recompute_from_history", |b| {
        b.iter(|| black_box(Ledger::recompute_from_history(black_box(&history)).unwrap()))
    });
}

// =============================================================================
// Suggestion Benchmarks
// =============================================================================

fn bench_suggest(c: &mut Criterion) {
    let mut bench_group = c.benchmark_group("suggest");

    for size in [4, 16, 64].iter() {
        let members = make_group(*size);
        let ledger = Ledger::replay(&make_trips(&members, size * 10)).unwrap();
        bench_group.bench_with_input(BenchmarkId::from_parameter(size), &members, |b, members| {
            b.iter(|| black_box(suggest(black_box(members), &ledger)))
        });
    }
    bench_group.finish();
}

// =============================================================================
// Session Benchmarks
// =============================================================================

fn bench_edit_trip(c: &mut Criterion) {
    let members = make_group(8);
    let trips = make_trips(&members, 100);

    c.bench_function("edit_trip", |b| {
        let mut session = make_session(&members, &trips);
        let mut flip = false;
        b.iter(|| {
            let trip = session.history().get(0).unwrap();
            let driver = trip.passengers[usize::from(flip)].clone();
            flip = !flip;
            session.edit_trip(0, black_box(driver.as_str())).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_apply_trip,
    bench_trip_throughput,
    bench_recompute_from_history,
    bench_suggest,
    bench_edit_trip,
);
criterion_main!(benches);
