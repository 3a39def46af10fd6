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

//! Benchmarks for the accrual and reporting engines.
//!
//! Run with: cargo bench
//!
//! Benchmarks include:
//! - Usage recording and reward granting
//! - Monthly report aggregation over growing history logs

use chrono::{TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use loyalty_ledger_rs::accrual::{DEFAULT_CONSUME_ORDER, grant_reward, record_usage};
use loyalty_ledger_rs::customer::CustomerMap;
use loyalty_ledger_rs::report::monthly_report;
use loyalty_ledger_rs::{Counter, CustomerRecord, EntryKind, HistoryEntry, MonthKey, PhoneKey};

// =============================================================================
// Helper Functions
// =============================================================================

fn fresh_record(laundry: u32, dry: u32) -> CustomerRecord {
    let mut record = CustomerRecord::new("Kim", "", Utc::now());
    record.laundry = laundry;
    record.dry = dry;
    record.recalc(10);
    record
}

fn synthetic_history(entries: usize) -> Vec<HistoryEntry> {
    (0..entries)
        .map(|i| {
            let phone = PhoneKey::normalize(&format!("010{:08}", i % 500));
            let date = Utc
                .with_ymd_and_hms(2026, 1 + (i % 12) as u32, 1 + (i % 28) as u32, 12, 0, 0)
                .unwrap();
            HistoryEntry {
                id: i.to_string(),
                date,
                phone,
                kind: EntryKind::VisitLaundry { laundry_added: 1, count_after: 1 },
            }
        })
        .collect()
}

// =============================================================================
// Accrual Benchmarks
// =============================================================================

fn bench_record_usage(c: &mut Criterion) {
    c.bench_function("record_usage", |b| {
        b.iter(|| {
            let mut record = fresh_record(0, 0);
            for _ in 0..100 {
                record_usage(&mut record, black_box(Counter::Laundry), 1, 10).unwrap();
            }
            record
        })
    });
}

fn bench_grant_reward(c: &mut Criterion) {
    c.bench_function("grant_reward", |b| {
        b.iter(|| {
            let mut record = fresh_record(6, 7);
            grant_reward(&mut record, black_box(2000), 10, &DEFAULT_CONSUME_ORDER).unwrap()
        })
    });
}

// =============================================================================
// Reporting Benchmarks
// =============================================================================

fn bench_monthly_report(c: &mut Criterion) {
    let mut group = c.benchmark_group("monthly_report");
    let customers = CustomerMap::new();
    let month = MonthKey::new(2026, 3).unwrap();

    for size in [100usize, 1_000, 10_000] {
        let history = synthetic_history(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &history, |b, history| {
            b.iter(|| monthly_report(&customers, black_box(history), month, 3))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_record_usage, bench_grant_reward, bench_monthly_report);
criterion_main!(benches);
