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

//! The append-only activity log.
//!
//! Every mutation of the ledger leaves a [`HistoryEntry`] behind. Entries are
//! never rewritten or removed; ordering is by `date` with ties broken by
//! position in the file (append order).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::base::PhoneKey;

/// One log line: who, when, what.
///
/// The `id` is filled in by the store on append when left empty, matching the
/// write path where the caller only knows the event, not its identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub id: String,
    pub date: DateTime<Utc>,
    pub phone: PhoneKey,
    #[serde(flatten)]
    pub kind: EntryKind,
}

impl HistoryEntry {
    /// Entry stamped with the current time and no id yet.
    pub fn record(phone: PhoneKey, kind: EntryKind) -> Self {
        HistoryEntry { id: String::new(), date: Utc::now(), phone, kind }
    }
}

/// Event payloads, tagged by `type` in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    Register {
        name: String,
    },
    VisitLaundry {
        laundry_added: u32,
        count_after: u32,
    },
    VisitDry {
        dry_added: u32,
        count_after: u32,
    },
    VisitBundle {
        laundry_added: u32,
        dry_added: u32,
        count_after: u32,
    },
    RewardGranted {
        points: u32,
        count_before: u32,
        count_after: u32,
        threshold: u32,
        reason: String,
    },
    ManualGrant {
        points: u32,
        reason: String,
    },
    PointUse {
        points: u32,
        reason: String,
    },
    Undo {
        reverted_id: String,
        reverted_type: String,
    },
    CustomerDelete {
        name: String,
    },
}

impl EntryKind {
    /// The `type` tag as it appears on disk.
    pub fn type_name(&self) -> &'static str {
        match self {
            EntryKind::Register { .. } => "register",
            EntryKind::VisitLaundry { .. } => "visit_laundry",
            EntryKind::VisitDry { .. } => "visit_dry",
            EntryKind::VisitBundle { .. } => "visit_bundle",
            EntryKind::RewardGranted { .. } => "reward_granted",
            EntryKind::ManualGrant { .. } => "manual_grant",
            EntryKind::PointUse { .. } => "point_use",
            EntryKind::Undo { .. } => "undo",
            EntryKind::CustomerDelete { .. } => "customer_delete",
        }
    }

    /// Whether single-step undo may reverse this entry.
    ///
    /// Visits and point uses reverse cleanly from their payload. Reward
    /// grants consumed counters via the threshold transaction and are
    /// excluded; deletions and undos themselves likewise.
    pub fn is_reversible(&self) -> bool {
        matches!(
            self,
            EntryKind::VisitLaundry { .. }
                | EntryKind::VisitDry { .. }
                | EntryKind::VisitBundle { .. }
                | EntryKind::PointUse { .. }
        )
    }

    /// Signed point movement of this entry, for lifetime aggregation.
    pub fn points_delta(&self) -> i64 {
        match self {
            EntryKind::RewardGranted { points, .. } | EntryKind::ManualGrant { points, .. } => {
                i64::from(*points)
            }
            EntryKind::PointUse { points, .. } => -i64::from(*points),
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phone() -> PhoneKey {
        PhoneKey::normalize("01012345678")
    }

    #[test]
    fn serializes_with_type_tag() {
        let entry = HistoryEntry::record(
            phone(),
            EntryKind::VisitBundle { laundry_added: 2, dry_added: 1, count_after: 3 },
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "visit_bundle");
        assert_eq!(json["phone"], "01012345678");
        assert_eq!(json["laundry_added"], 2);
    }

    #[test]
    fn round_trips_through_json() {
        let entry = HistoryEntry {
            id: "abc".into(),
            date: Utc::now(),
            phone: phone(),
            kind: EntryKind::RewardGranted {
                points: 2000,
                count_before: 13,
                count_after: 3,
                threshold: 10,
                reason: "threshold reached".into(),
            },
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: HistoryEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn reversibility_classification() {
        assert!(EntryKind::VisitLaundry { laundry_added: 1, count_after: 1 }.is_reversible());
        assert!(EntryKind::PointUse { points: 100, reason: String::new() }.is_reversible());
        assert!(
            !EntryKind::RewardGranted {
                points: 2000,
                count_before: 10,
                count_after: 0,
                threshold: 10,
                reason: String::new(),
            }
            .is_reversible()
        );
        assert!(!EntryKind::CustomerDelete { name: String::new() }.is_reversible());
        assert!(
            !EntryKind::Undo { reverted_id: String::new(), reverted_type: String::new() }
                .is_reversible()
        );
    }

    #[test]
    fn points_delta_signs() {
        assert_eq!(
            EntryKind::ManualGrant { points: 500, reason: String::new() }.points_delta(),
            500
        );
        assert_eq!(
            EntryKind::PointUse { points: 300, reason: String::new() }.points_delta(),
            -300
        );
        assert_eq!(EntryKind::VisitDry { dry_added: 1, count_after: 1 }.points_delta(), 0);
    }
}
