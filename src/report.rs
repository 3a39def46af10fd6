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

//! Monthly statistics derived from the history log.
//!
//! Reports are re-derived by scanning the persisted log; nothing here mutates
//! state. Rankings break ties by phone key ascending so the same log always
//! produces the same report.

use chrono::{DateTime, Datelike, Utc};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::base::PhoneKey;
use crate::customer::CustomerMap;
use crate::error::LedgerError;
use crate::history::{EntryKind, HistoryEntry};

/// A calendar month, parsed from and displayed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Result<Self, LedgerError> {
        if !(1..=12).contains(&month) {
            return Err(LedgerError::InvalidInput(format!("month out of range: {month}")));
        }
        Ok(MonthKey { year, month })
    }

    pub fn from_date(date: DateTime<Utc>) -> Self {
        MonthKey { year: date.year(), month: date.month() }
    }

    /// The calendar-previous month, rolling the year over January.
    pub fn prev(self) -> Self {
        if self.month == 1 {
            MonthKey { year: self.year - 1, month: 12 }
        } else {
            MonthKey { year: self.year, month: self.month - 1 }
        }
    }

    pub fn contains(self, date: DateTime<Utc>) -> bool {
        self == MonthKey::from_date(date)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for MonthKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LedgerError::InvalidInput(format!("expected YYYY-MM, got {s:?}"));
        let (year, month) = s.split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month)
    }
}

impl Serialize for MonthKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// One ranking row: a customer and their visit count for the month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopCustomer {
    pub phone: PhoneKey,
    pub name: String,
    pub visits: u32,
}

/// Aggregated statistics for one calendar month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyReport {
    pub month: MonthKey,
    pub total_visits: u32,
    pub laundry_visits: u32,
    pub dry_visits: u32,
    pub bundle_visits: u32,
    pub rewards_granted: u32,
    pub points_used: u32,
    /// Loyal customers (visits >= loyalty threshold) over customers with any
    /// visit; 0.0 when nobody visited.
    pub loyal_ratio: f64,
    pub visits_by_customer: BTreeMap<PhoneKey, u32>,
    pub top5: Vec<TopCustomer>,
}

/// Numeric field differences between two monthly reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDelta {
    pub total_visits: i64,
    pub laundry_visits: i64,
    pub dry_visits: i64,
    pub bundle_visits: i64,
    pub rewards_granted: i64,
    pub points_used: i64,
    pub loyal_ratio: f64,
}

/// A month's report next to the previous month's, with deltas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthOverMonth {
    pub current: MonthlyReport,
    pub previous: MonthlyReport,
    pub delta: ReportDelta,
}

/// Scans the log for entries in `month` and aggregates visit, reward, and
/// point-use statistics.
///
/// `loyal_visits` is the monthly visit count at which a customer counts as
/// loyal. The customer map only supplies display names for the ranking;
/// visits by customers since deleted still count.
pub fn monthly_report(
    customers: &CustomerMap,
    history: &[HistoryEntry],
    month: MonthKey,
    loyal_visits: u32,
) -> MonthlyReport {
    let mut laundry_visits = 0u32;
    let mut dry_visits = 0u32;
    let mut bundle_visits = 0u32;
    let mut rewards_granted = 0u32;
    let mut points_used = 0u32;
    let mut visits_by_customer: BTreeMap<PhoneKey, u32> = BTreeMap::new();

    for entry in history.iter().filter(|e| month.contains(e.date)) {
        match &entry.kind {
            EntryKind::VisitLaundry { .. } => laundry_visits += 1,
            EntryKind::VisitDry { .. } => dry_visits += 1,
            EntryKind::VisitBundle { .. } => bundle_visits += 1,
            EntryKind::RewardGranted { .. } => rewards_granted += 1,
            EntryKind::PointUse { .. } => points_used += 1,
            _ => {}
        }
        if matches!(
            entry.kind,
            EntryKind::VisitLaundry { .. }
                | EntryKind::VisitDry { .. }
                | EntryKind::VisitBundle { .. }
        ) {
            *visits_by_customer.entry(entry.phone.clone()).or_insert(0) += 1;
        }
    }

    let visited = visits_by_customer.len();
    let loyal = visits_by_customer.values().filter(|&&count| count >= loyal_visits).count();
    let loyal_ratio = if visited == 0 { 0.0 } else { loyal as f64 / visited as f64 };

    // BTreeMap iterates phone-ascending; the stable sort keeps that order
    // within equal visit counts.
    let mut ranked: Vec<TopCustomer> = visits_by_customer
        .iter()
        .map(|(phone, &visits)| TopCustomer {
            phone: phone.clone(),
            name: customers.get(phone).map_or_else(String::new, |c| c.name.clone()),
            visits,
        })
        .collect();
    ranked.sort_by(|a, b| b.visits.cmp(&a.visits));
    ranked.truncate(5);

    MonthlyReport {
        month,
        total_visits: laundry_visits + dry_visits + bundle_visits,
        laundry_visits,
        dry_visits,
        bundle_visits,
        rewards_granted,
        points_used,
        loyal_ratio,
        visits_by_customer,
        top5: ranked,
    }
}

/// Reports `month` and its calendar-previous month side by side with the
/// arithmetic difference of each numeric field.
pub fn month_over_month(
    customers: &CustomerMap,
    history: &[HistoryEntry],
    month: MonthKey,
    loyal_visits: u32,
) -> MonthOverMonth {
    let current = monthly_report(customers, history, month, loyal_visits);
    let previous = monthly_report(customers, history, month.prev(), loyal_visits);
    let diff = |a: u32, b: u32| i64::from(a) - i64::from(b);
    let delta = ReportDelta {
        total_visits: diff(current.total_visits, previous.total_visits),
        laundry_visits: diff(current.laundry_visits, previous.laundry_visits),
        dry_visits: diff(current.dry_visits, previous.dry_visits),
        bundle_visits: diff(current.bundle_visits, previous.bundle_visits),
        rewards_granted: diff(current.rewards_granted, previous.rewards_granted),
        points_used: diff(current.points_used, previous.points_used),
        loyal_ratio: current.loyal_ratio - previous.loyal_ratio,
    };
    MonthOverMonth { current, previous, delta }
}

/// Signed sum of all point movements for one customer across the whole log.
///
/// Grants count positive, point uses negative; the log is authoritative for
/// points ever granted.
pub fn lifetime_points(history: &[HistoryEntry], phone: &PhoneKey) -> i64 {
    history
        .iter()
        .filter(|entry| &entry.phone == phone)
        .map(|entry| entry.kind.points_delta())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_key_parses_and_displays() {
        let month: MonthKey = "2026-08".parse().unwrap();
        assert_eq!(month, MonthKey::new(2026, 8).unwrap());
        assert_eq!(month.to_string(), "2026-08");
    }

    #[test]
    fn month_key_rejects_garbage() {
        assert!("2026".parse::<MonthKey>().is_err());
        assert!("2026-13".parse::<MonthKey>().is_err());
        assert!("2026-00".parse::<MonthKey>().is_err());
        assert!("abcd-ef".parse::<MonthKey>().is_err());
    }

    #[test]
    fn prev_rolls_over_january() {
        assert_eq!(MonthKey::new(2026, 1).unwrap().prev(), MonthKey::new(2025, 12).unwrap());
        assert_eq!(MonthKey::new(2026, 8).unwrap().prev(), MonthKey::new(2026, 7).unwrap());
    }

    #[test]
    fn month_key_serializes_as_string() {
        let json = serde_json::to_string(&MonthKey::new(2026, 3).unwrap()).unwrap();
        assert_eq!(json, "\"2026-03\"");
    }
}
