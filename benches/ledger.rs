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

//! Benchmarks for the reserve ledger.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Single-threaded use and add
//! - Contended movements on one reserve versus spread across many
//! - Dashboard aggregation over a populated ledger

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use rayon::prelude::*;
use reserve_ledger_rs::{Credit, Dashboard, Period, RecordId, Repository, Reserve, ReserveLedger};
use rust_decimal::Decimal;
use std::sync::Arc;

// =============================================================================
// Helper Functions
// =============================================================================

fn create_reserve(ledger: &ReserveLedger, balance: i64) -> RecordId {
    let balance = Decimal::new(balance, 4);
    ledger
        .create_reserve(Reserve::new(
            RecordId::new(),
            "bench",
            balance,
            balance,
            Period::new(1, 2025).unwrap(),
        ))
        .unwrap()
        .id()
}

// =============================================================================
// Single-Threaded Benchmarks
// =============================================================================

fn bench_single_use(c: &mut Criterion) {
    c.bench_function("single_use", |b| {
        b.iter(|| {
            let ledger = ReserveLedger::in_memory();
            let id = create_reserve(&ledger, 1_000_000);
            ledger
                .use_reserve(id, black_box(Decimal::new(5000, 4)), "bench")
                .unwrap();
        })
    });
}

fn bench_add_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_throughput");

    for count in [100, 1_000, 10_000].iter() {
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            b.iter(|| {
                let ledger = ReserveLedger::in_memory();
                let id = create_reserve(&ledger, 0);
                for _ in 0..count {
                    ledger.add_to_reserve(id, Decimal::new(10000, 4), "").unwrap();
                }
                black_box(&ledger);
            })
        });
    }
    group.finish();
}

// =============================================================================
// Contention Benchmarks
// =============================================================================

fn bench_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("contention");
    let total_ops = 10_000usize;

    // Fewer reserves = more threads competing for the same lock
    for num_reserves in [1, 10, 100, 1_000].iter() {
        group.throughput(Throughput::Elements(total_ops as u64));
        group.bench_with_input(
            BenchmarkId::new("reserves", num_reserves),
            num_reserves,
            |b, &num_reserves| {
                b.iter(|| {
                    let ledger = Arc::new(ReserveLedger::in_memory());
                    let ids: Vec<RecordId> = (0..num_reserves)
                        .map(|_| create_reserve(&ledger, 100_000_000))
                        .collect();

                    (0..total_ops).into_par_iter().for_each(|i| {
                        let id = ids[i % num_reserves];
                        if i % 2 == 0 {
                            ledger.add_to_reserve(id, Decimal::new(10000, 4), "").unwrap();
                        } else {
                            ledger.use_reserve(id, Decimal::new(5000, 4), "").unwrap();
                        }
                    });

                    black_box(&ledger);
                })
            },
        );
    }
    group.finish();
}

// =============================================================================
// Aggregation Benchmarks
// =============================================================================

fn bench_dashboard(c: &mut Criterion) {
    let mut group = c.benchmark_group("dashboard");

    for count in [1_000, 10_000].iter() {
        let credits: Arc<Repository<Credit>> = Arc::new(Repository::in_memory());
        let ledger = Arc::new(ReserveLedger::in_memory());
        let user = RecordId::new();
        for i in 0..*count {
            let period = Period::new(i % 12 + 1, 2025).unwrap();
            credits
                .insert(Credit::new(user, "bench", Decimal::new(i64::from(i), 2), period))
                .unwrap();
        }
        let id = create_reserve(&ledger, 1_000_000_000);
        for _ in 0..*count {
            ledger.use_reserve(id, Decimal::new(100, 4), "").unwrap();
        }
        let dashboard = Dashboard::new(
            credits,
            Arc::new(Repository::in_memory()),
            Arc::new(Repository::in_memory()),
            ledger,
        );

        group.throughput(Throughput::Elements(u64::from(*count)));
        group.bench_with_input(BenchmarkId::new("credits_by_month", count), count, |b, _| {
            b.iter(|| black_box(dashboard.credits_by_month(2025).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("transaction_history", count), count, |b, _| {
            b.iter(|| black_box(dashboard.transaction_history().unwrap()))
        });
    }
    group.finish();
}

criterion_group!(single_threaded, bench_single_use, bench_add_throughput,);

criterion_group!(multi_threaded, bench_contention,);

criterion_group!(aggregation, bench_dashboard,);

criterion_main!(single_threaded, multi_threaded, aggregation);
