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

//! One-time legacy store migration.
//!
//! Upgrades a brand-new install from a legacy `users.json` keyed by raw phone
//! strings to the current customer file keyed by normalized [`PhoneKey`]s.
//! Two raw keys can normalize to the same customer, so collisions are merged
//! deterministically; pairs whose key fails validation are routed to a side
//! file for manual review, never merged and never lost.
//!
//! The migration never touches an established store: it is gated on the
//! absence of the current customer file and on the flag file stamped at
//! completion.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use tracing::{info, warn};

use crate::base::PhoneKey;
use crate::customer::{CustomerMap, LegacyCustomer};
use crate::error::LedgerError;
use crate::store::LedgerStore;

const CONFLICTS_FILE: &str = "migration_conflicts.json";
const INVALIDS_FILE: &str = "migration_invalids.json";

/// Counts reported after a completed migration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub total: usize,
    pub migrated: usize,
    pub conflicts: usize,
    pub invalids: usize,
}

/// Result of a migration attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// The flag file says migration already ran.
    AlreadyMigrated,
    /// A current-schema customer file exists; never re-merge an established
    /// store.
    CurrentStoreExists,
    /// No legacy file to migrate from.
    NoLegacyData,
    Completed(MigrationReport),
}

/// A legacy pair routed to a side file, with enough context for manual audit.
#[derive(Debug, Serialize)]
struct SideRecord {
    raw: String,
    normalized: String,
    data: LegacyCustomer,
    migrated_at: String,
}

/// Merges two legacy records that normalized to the same key.
///
/// Usage counters are summed; the point balance takes the max of the two
/// candidates. The asymmetry is deliberate: the history log is the source of
/// truth for points ever granted, and summing balances from duplicate partial
/// records would double-count.
fn merge_legacy(a: &LegacyCustomer, b: &LegacyCustomer) -> LegacyCustomer {
    LegacyCustomer {
        activity_1: a.activity_1 + b.activity_1,
        activity_2: a.activity_2 + b.activity_2,
        total_points: a.total_points.max(b.total_points),
    }
}

/// Runs the legacy migration if it has never run and no current store exists.
///
/// On completion the merged map is written via the store, conflict/invalid
/// side files land in the backup directory, and the flag file is stamped with
/// a human-readable timestamp.
///
/// # Errors
///
/// [`LedgerError::PersistenceFailed`] when the merged map, a side file, or
/// the flag cannot be written.
pub fn migrate_legacy_once(
    store: &mut LedgerStore,
    threshold: u32,
) -> Result<MigrationOutcome, LedgerError> {
    info!("checking legacy phone-key migration");
    if store.customers_path().exists() {
        info!("customer file exists, skipping legacy migration");
        return Ok(MigrationOutcome::CurrentStoreExists);
    }
    if store.migration_flag_path().exists() {
        info!("migration flag present, skipping");
        return Ok(MigrationOutcome::AlreadyMigrated);
    }
    let legacy_path = store.legacy_users_path();
    if !legacy_path.exists() {
        info!("no legacy user file, skipping");
        return Ok(MigrationOutcome::NoLegacyData);
    }

    for dir in [store.data_dir().to_path_buf(), store.backup_dir().to_path_buf()] {
        fs::create_dir_all(&dir)
            .map_err(|source| LedgerError::PersistenceFailed { path: dir.clone(), source })?;
    }

    let legacy: BTreeMap<String, LegacyCustomer> = store.read_json(&legacy_path, BTreeMap::new());
    let now = Utc::now();
    let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();

    let mut merged: BTreeMap<PhoneKey, LegacyCustomer> = BTreeMap::new();
    let mut conflicts: Vec<SideRecord> = Vec::new();
    let mut invalids: Vec<SideRecord> = Vec::new();

    for (raw, data) in &legacy {
        let phone = PhoneKey::normalize(raw);
        if !phone.is_valid() {
            invalids.push(SideRecord {
                raw: raw.clone(),
                normalized: phone.as_str().to_string(),
                data: data.clone(),
                migrated_at: stamp.clone(),
            });
            continue;
        }
        match merged.get(&phone) {
            None => {
                merged.insert(phone, data.clone());
            }
            Some(existing) => {
                let combined = merge_legacy(existing, data);
                merged.insert(phone.clone(), combined);
                conflicts.push(SideRecord {
                    raw: raw.clone(),
                    normalized: phone.as_str().to_string(),
                    data: data.clone(),
                    migrated_at: stamp.clone(),
                });
            }
        }
    }

    let report = MigrationReport {
        total: legacy.len(),
        migrated: merged.len(),
        conflicts: conflicts.len(),
        invalids: invalids.len(),
    };
    info!(
        total = report.total,
        migrated = report.migrated,
        conflicts = report.conflicts,
        invalids = report.invalids,
        "legacy migration processed"
    );

    let customers: CustomerMap = merged
        .into_iter()
        .map(|(phone, legacy)| (phone, legacy.upgrade(now, threshold)))
        .collect();
    store.save_customers(&customers)?;

    if !conflicts.is_empty() {
        let path = store.backup_dir().join(CONFLICTS_FILE);
        warn!(count = conflicts.len(), path = %path.display(), "migration conflicts recorded");
        store.write_json(&path, &conflicts)?;
    }
    if !invalids.is_empty() {
        let path = store.backup_dir().join(INVALIDS_FILE);
        warn!(count = invalids.len(), path = %path.display(), "invalid phone keys recorded");
        store.write_json(&path, &invalids)?;
    }

    let flag = store.migration_flag_path();
    fs::write(&flag, &stamp)
        .map_err(|source| LedgerError::PersistenceFailed { path: flag.clone(), source })?;
    info!(path = %flag.display(), "migration flag stamped");

    Ok(MigrationOutcome::Completed(report))
}
