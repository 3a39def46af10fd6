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

//! Property-based tests for the accrual engine and data model.
//!
//! These verify invariants that should hold for any sequence of valid
//! operations.

use chrono::{TimeZone, Utc};
use loyalty_ledger_rs::accrual::{
    Counter, DEFAULT_CONSUME_ORDER, RewardOutcome, grant_reward, record_usage,
    remaining_until_threshold,
};
use loyalty_ledger_rs::{CustomerRecord, PhoneKey};
use proptest::prelude::*;

// =============================================================================
// Arbitrary Strategies
// =============================================================================

/// Usage amounts within the per-entry cap.
fn arb_amount() -> impl Strategy<Value = u32> {
    0u32..=50
}

fn arb_counter() -> impl Strategy<Value = Counter> {
    prop_oneof![Just(Counter::Laundry), Just(Counter::Dry)]
}

fn record_with(laundry: u32, dry: u32, points: u32, threshold: u32) -> CustomerRecord {
    let created = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
    let mut record = CustomerRecord::new("Kim", "", created);
    record.laundry = laundry;
    record.dry = dry;
    record.points_remaining = points;
    record.recalc(threshold);
    record
}

// =============================================================================
// Remaining-Until-Threshold Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// Result is always within [0, threshold) and completes total to a
    /// multiple of the threshold.
    #[test]
    fn remaining_is_bounded_and_complements(
        total in 0u32..100_000,
        threshold in 1u32..1_000,
    ) {
        let remaining = remaining_until_threshold(total, threshold).unwrap();
        prop_assert!(remaining < threshold);
        prop_assert_eq!((total + remaining) % threshold, 0);
    }
}

// =============================================================================
// Derived-Field Invariants
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(1000))]

    /// After any sequence of usage recordings, total equals the counter sum
    /// and reward_needed matches the threshold comparison.
    #[test]
    fn usage_keeps_derived_fields_consistent(
        usages in prop::collection::vec((arb_counter(), arb_amount()), 1..20),
        threshold in 1u32..100,
    ) {
        let mut record = record_with(0, 0, 0, threshold);
        for (kind, amount) in usages {
            record_usage(&mut record, kind, amount, threshold).unwrap();
            prop_assert_eq!(record.total, record.laundry + record.dry);
            prop_assert_eq!(record.reward_needed, record.total >= threshold);
        }
    }

    /// Granting a reward drains exactly the threshold and credits exactly
    /// the configured points.
    #[test]
    fn grant_conserves_units_and_points(
        laundry in 0u32..200,
        dry in 0u32..200,
        points in 1u32..10_000,
        threshold in 1u32..100,
    ) {
        let mut record = record_with(laundry, dry, 0, threshold);
        let before = record.total;
        match grant_reward(&mut record, points, threshold, &DEFAULT_CONSUME_ORDER).unwrap() {
            RewardOutcome::Granted(receipt) => {
                prop_assert!(before >= threshold);
                prop_assert_eq!(record.total, before - threshold);
                prop_assert_eq!(receipt.count_before, before);
                prop_assert_eq!(receipt.count_after, record.total);
                prop_assert_eq!(record.points_remaining, points);
                prop_assert_eq!(record.total, record.laundry + record.dry);
                prop_assert_eq!(record.reward_needed, record.total >= threshold);
            }
            RewardOutcome::Insufficient { count_before, .. } => {
                prop_assert!(before < threshold);
                prop_assert_eq!(count_before, before);
                // Refusal mutates nothing
                prop_assert_eq!(record.total, before);
                prop_assert_eq!(record.points_remaining, 0);
            }
        }
    }

    /// The same record and order always drain the same way.
    #[test]
    fn grant_is_deterministic(
        laundry in 0u32..200,
        dry in 0u32..200,
        threshold in 1u32..100,
    ) {
        let mut a = record_with(laundry, dry, 0, threshold);
        let mut b = record_with(laundry, dry, 0, threshold);
        let out_a = grant_reward(&mut a, 2000, threshold, &DEFAULT_CONSUME_ORDER).unwrap();
        let out_b = grant_reward(&mut b, 2000, threshold, &DEFAULT_CONSUME_ORDER).unwrap();
        prop_assert_eq!(out_a, out_b);
        prop_assert_eq!(a, b);
    }

    /// The default order never touches laundry while dry can still cover
    /// the drain.
    #[test]
    fn default_order_drains_dry_first(
        laundry in 0u32..200,
        dry in 0u32..200,
        threshold in 1u32..100,
    ) {
        let mut record = record_with(laundry, dry, 0, threshold);
        if let RewardOutcome::Granted(receipt) =
            grant_reward(&mut record, 2000, threshold, &DEFAULT_CONSUME_ORDER).unwrap()
        {
            if dry >= threshold {
                prop_assert_eq!(receipt.laundry_after, laundry);
                prop_assert_eq!(receipt.dry_after, dry - threshold);
            } else {
                prop_assert_eq!(receipt.dry_after, 0);
                prop_assert_eq!(receipt.laundry_after, laundry + dry - threshold);
            }
        }
    }
}

// =============================================================================
// Data-Model Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Normalization is idempotent.
    #[test]
    fn normalize_is_idempotent(raw in ".{0,30}") {
        let once = PhoneKey::normalize(&raw);
        let twice = PhoneKey::normalize(once.as_str());
        prop_assert_eq!(once, twice);
    }

    /// A customer record survives a JSON round trip unchanged.
    #[test]
    fn customer_record_round_trips(
        laundry in 0u32..1_000,
        dry in 0u32..1_000,
        points in 0u32..100_000,
        name in "[a-zA-Z]{1,12}",
    ) {
        let mut record = record_with(laundry, dry, points, 10);
        record.name = name;
        let json = serde_json::to_string(&record).unwrap();
        let back: CustomerRecord = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, record);
    }
}
