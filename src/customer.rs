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

//! Customer records and the versioned on-disk schema.
//!
//! The customer file has carried two shapes over its lifetime: the current
//! [`CustomerRecord`] and a legacy form with `activity_1` / `activity_2` /
//! `total_points` fields. [`StoredCustomer`] models both as a union with one
//! deterministic upgrade per version transition, so future schema changes
//! stay additive.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::base::PhoneKey;

/// The customer map as persisted: one JSON object keyed by normalized phone.
///
/// `BTreeMap` keeps iteration in phone-ascending order, which display rows
/// and report tie-breaks depend on.
pub type CustomerMap = BTreeMap<PhoneKey, CustomerRecord>;

/// Per-customer ledger state.
///
/// `total` and `reward_needed` are pure functions of the other fields,
/// recomputed by [`recalc`](Self::recalc) after every mutation; they are
/// persisted for the benefit of external readers of the JSON file but never
/// trusted on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub name: String,
    #[serde(default)]
    pub memo: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_visit_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub laundry: u32,
    #[serde(default)]
    pub dry: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub points_remaining: u32,
    #[serde(default)]
    pub reward_needed: bool,
    #[serde(default)]
    pub month_count: u32,
}

impl CustomerRecord {
    /// Fresh record with zeroed counters.
    pub fn new(name: impl Into<String>, memo: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        CustomerRecord {
            name: name.into(),
            memo: memo.into(),
            created_at,
            last_visit_at: None,
            laundry: 0,
            dry: 0,
            total: 0,
            points_remaining: 0,
            reward_needed: false,
            month_count: 0,
        }
    }

    /// Recomputes the derived fields from the raw counters.
    ///
    /// Must be called after any counter or point mutation; `total` and
    /// `reward_needed` are never set independently.
    pub fn recalc(&mut self, threshold: u32) {
        self.total = self.laundry + self.dry;
        self.reward_needed = self.total >= threshold;
    }

    /// Records a visit at `at`: bumps `last_visit_at` and the per-month visit
    /// counter, resetting the counter when the visit lands in a new calendar
    /// month.
    pub fn mark_visit(&mut self, at: DateTime<Utc>) {
        let same_month = self
            .last_visit_at
            .is_some_and(|prev| prev.year() == at.year() && prev.month() == at.month());
        if !same_month {
            self.month_count = 0;
        }
        self.month_count += 1;
        self.last_visit_at = Some(at);
    }
}

/// Legacy record shape from the first deployment.
///
/// All fields default so that partial legacy rows still load; the upgrade
/// path decides what they mean.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyCustomer {
    #[serde(default)]
    pub activity_1: u32,
    #[serde(default)]
    pub activity_2: u32,
    #[serde(default)]
    pub total_points: u32,
}

impl LegacyCustomer {
    /// One-way upgrade to the current schema.
    ///
    /// `activity_1` was the laundry counter, `activity_2` the dry counter.
    /// Derived fields are recomputed fresh; legacy rows carried no name,
    /// memo, or visit dates.
    pub fn upgrade(self, now: DateTime<Utc>, threshold: u32) -> CustomerRecord {
        let mut record = CustomerRecord::new("", "", now);
        record.laundry = self.activity_1;
        record.dry = self.activity_2;
        record.points_remaining = self.total_points;
        record.recalc(threshold);
        record
    }
}

/// On-disk customer value: current schema, or the legacy shape.
///
/// Untagged: a row carrying `name` and `created_at` deserializes as
/// [`Current`](StoredCustomer::Current) (the other fields default so partial
/// rows keep their counters); anything else falls through to
/// [`Legacy`](StoredCustomer::Legacy).
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredCustomer {
    Current(CustomerRecord),
    Legacy(LegacyCustomer),
}

impl StoredCustomer {
    /// Resolves either variant to a current-schema record with derived
    /// fields recomputed.
    pub fn into_current(self, now: DateTime<Utc>, threshold: u32) -> CustomerRecord {
        match self {
            StoredCustomer::Current(mut record) => {
                record.recalc(threshold);
                record
            }
            StoredCustomer::Legacy(legacy) => legacy.upgrade(now, threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn recalc_keeps_invariants() {
        let mut record = CustomerRecord::new("Kim", "", at(2026, 1, 1));
        record.laundry = 7;
        record.dry = 3;
        record.recalc(10);
        assert_eq!(record.total, 10);
        assert!(record.reward_needed);

        record.dry = 2;
        record.recalc(10);
        assert_eq!(record.total, 9);
        assert!(!record.reward_needed);
    }

    #[test]
    fn mark_visit_counts_within_month() {
        let mut record = CustomerRecord::new("Kim", "", at(2026, 3, 1));
        record.mark_visit(at(2026, 3, 2));
        record.mark_visit(at(2026, 3, 20));
        assert_eq!(record.month_count, 2);
        assert_eq!(record.last_visit_at, Some(at(2026, 3, 20)));
    }

    #[test]
    fn mark_visit_resets_on_new_month() {
        let mut record = CustomerRecord::new("Kim", "", at(2026, 3, 1));
        record.mark_visit(at(2026, 3, 30));
        record.mark_visit(at(2026, 4, 1));
        assert_eq!(record.month_count, 1);
    }

    #[test]
    fn legacy_rows_deserialize_and_upgrade() {
        let json = r#"{"activity_1": 4, "activity_2": 8, "total_points": 2000}"#;
        let stored: StoredCustomer = serde_json::from_str(json).unwrap();
        let record = stored.into_current(at(2026, 1, 1), 10);
        assert_eq!(record.laundry, 4);
        assert_eq!(record.dry, 8);
        assert_eq!(record.points_remaining, 2000);
        assert_eq!(record.total, 12);
        assert!(record.reward_needed);
    }

    #[test]
    fn current_rows_keep_their_fields() {
        let mut record = CustomerRecord::new("Lee", "regular", at(2026, 2, 2));
        record.laundry = 3;
        record.recalc(10);
        let json = serde_json::to_string(&record).unwrap();
        let stored: StoredCustomer = serde_json::from_str(&json).unwrap();
        let back = stored.into_current(at(2026, 5, 5), 10);
        assert_eq!(back, record);
    }

    #[test]
    fn upgrade_is_deterministic() {
        let legacy = || LegacyCustomer { activity_1: 2, activity_2: 5, total_points: 4000 };
        let now = at(2026, 1, 1);
        assert_eq!(legacy().upgrade(now, 10), legacy().upgrade(now, 10));
    }
}
