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

//! The ledger engine.
//!
//! [`LoyaltyLedger`] is the central object the presentation shell talks to.
//! It owns the store handle and an in-memory copy of the customer map, and
//! exposes every mutating operation as validate, mutate, persist the map,
//! then append the history entry. Opening the ledger runs the legacy
//! migration before anything else touches the store.
//!
//! # Example
//!
//! ```no_run
//! use loyalty_ledger_rs::{LedgerConfig, LoyaltyLedger};
//!
//! let mut ledger = LoyaltyLedger::open(LedgerConfig::new("./")).unwrap();
//! ledger.register("010-1234-5678", "Kim", "", 0, 0).unwrap();
//! ledger.record_visit("01012345678", 2, 1).unwrap();
//! for row in ledger.rows() {
//!     println!("{} {} {}", row.phone, row.name, row.total);
//! }
//! ```

use chrono::Utc;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::accrual::{
    Counter, DEFAULT_CONSUME_ORDER, MAX_UNITS_PER_ENTRY, RewardOutcome, RewardReceipt,
    grant_reward, record_usage, remaining_until_threshold,
};
use crate::base::PhoneKey;
use crate::customer::{CustomerMap, CustomerRecord};
use crate::error::LedgerError;
use crate::history::{EntryKind, HistoryEntry};
use crate::migration::{MigrationOutcome, migrate_legacy_once};
use crate::report::{MonthKey, MonthOverMonth, MonthlyReport, month_over_month, monthly_report};
use crate::store::{DeleteReport, LedgerStore};

/// Ledger construction parameters.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Base directory; `data/` and `backup/` live underneath.
    pub base_dir: PathBuf,
    /// Accumulated units required to trigger a reward.
    pub reward_threshold: u32,
    /// Points credited per reward.
    pub reward_points: u32,
    /// Monthly visits at which a customer counts as loyal.
    pub loyal_visits: u32,
    /// Drain priority for reward consumption.
    pub consume_order: Vec<Counter>,
}

impl LedgerConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        LedgerConfig {
            base_dir: base_dir.into(),
            reward_threshold: 10,
            reward_points: 2000,
            loyal_visits: 3,
            consume_order: DEFAULT_CONSUME_ORDER.to_vec(),
        }
    }
}

/// One row of the customer list as the shell renders it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CustomerRow {
    /// Hyphenated phone for display.
    pub phone: String,
    /// Normalized key, for the shell to hand back on actions.
    pub key: PhoneKey,
    pub name: String,
    pub laundry: u32,
    pub dry: u32,
    pub total: u32,
    pub reward_needed: bool,
    pub remaining: u32,
    pub points_remaining: u32,
    pub month_count: u32,
}

/// Per-batch reward results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardBatchReport {
    pub selected: usize,
    pub granted: Vec<(PhoneKey, RewardReceipt)>,
    pub insufficient: Vec<InsufficientCustomer>,
    pub not_found: Vec<PhoneKey>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsufficientCustomer {
    pub phone: PhoneKey,
    pub count_before: u32,
    pub threshold: u32,
}

/// Outcome of a single-step undo request. Reported, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UndoOutcome {
    Reverted { entry_id: String, entry_type: String },
    /// The customer's most recent entry cannot be reversed; no partial
    /// rollback is attempted.
    NotReversible { entry_type: String },
    NothingToUndo,
}

/// File-backed loyalty ledger: the store, the in-memory customer map, and
/// the accrual policy knobs.
pub struct LoyaltyLedger {
    config: LedgerConfig,
    store: LedgerStore,
    customers: CustomerMap,
    migration: MigrationOutcome,
}

impl LoyaltyLedger {
    /// Opens (or initializes) the ledger under `config.base_dir`.
    ///
    /// Runs the legacy migration first, then creates any missing files and
    /// loads the customer map.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidInput`] for a zero reward threshold;
    /// [`LedgerError::PersistenceFailed`] if initialization cannot write.
    pub fn open(config: LedgerConfig) -> Result<Self, LedgerError> {
        if config.reward_threshold == 0 {
            return Err(LedgerError::InvalidInput("reward threshold must be positive".into()));
        }
        let mut store = LedgerStore::new(&config.base_dir);
        let migration = migrate_legacy_once(&mut store, config.reward_threshold)?;
        if let MigrationOutcome::Completed(report) = &migration {
            info!(?report, "legacy migration completed");
        }
        store.ensure_files()?;
        let customers = store.load_customers(config.reward_threshold);
        info!(customers = customers.len(), "ledger opened");
        Ok(LoyaltyLedger { config, store, customers, migration })
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn customers(&self) -> &CustomerMap {
        &self.customers
    }

    /// What the startup migration did (or why it was skipped).
    pub fn migration_outcome(&self) -> &MigrationOutcome {
        &self.migration
    }

    /// Passes through the store's one-shot corrupt-file recovery warning.
    pub fn take_recovery_warning(&mut self) -> Option<String> {
        self.store.take_recovery_warning()
    }

    /// Validates and normalizes a raw phone string.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidPhone`] when the normalized key fails
    /// validation.
    pub fn phone_key(&self, raw: &str) -> Result<PhoneKey, LedgerError> {
        let key = PhoneKey::normalize(raw);
        if !key.is_valid() {
            return Err(LedgerError::InvalidPhone(raw.to_string()));
        }
        Ok(key)
    }

    /// Registers a new customer, optionally with the units of a first visit.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidPhone`], [`LedgerError::InvalidInput`] (empty
    /// name, oversized units), [`LedgerError::AlreadyRegistered`], or a
    /// persistence failure.
    pub fn register(
        &mut self,
        raw_phone: &str,
        name: &str,
        memo: &str,
        laundry: u32,
        dry: u32,
    ) -> Result<CustomerRow, LedgerError> {
        let phone = self.phone_key(raw_phone)?;
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("name must not be empty".into()));
        }
        if self.customers.contains_key(&phone) {
            return Err(LedgerError::AlreadyRegistered(phone.to_string()));
        }
        self.check_units(laundry, dry)?;

        let now = Utc::now();
        let mut record = CustomerRecord::new(name.trim(), memo.trim(), now);
        let threshold = self.config.reward_threshold;
        record_usage(&mut record, Counter::Laundry, laundry, threshold)?;
        record_usage(&mut record, Counter::Dry, dry, threshold)?;
        if laundry + dry > 0 {
            record.mark_visit(now);
        }

        self.customers.insert(phone.clone(), record);
        self.store.save_customers(&self.customers)?;
        self.store.append_history(HistoryEntry::record(
            phone.clone(),
            EntryKind::Register { name: name.trim().to_string() },
        ))?;
        if laundry + dry > 0 {
            let total = self.customers[&phone].total;
            self.store
                .append_history(HistoryEntry::record(phone.clone(), visit_kind(laundry, dry, total)))?;
        }
        info!(%phone, laundry, dry, "customer registered");
        Ok(self.row_for(&phone))
    }

    /// Records a visit's usage units for an existing customer.
    ///
    /// At least one unit is required; the entry is classified as a laundry,
    /// dry, or bundle visit for the log.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidPhone`], [`LedgerError::NotFound`],
    /// [`LedgerError::InvalidInput`], or a persistence failure.
    pub fn record_visit(
        &mut self,
        raw_phone: &str,
        laundry: u32,
        dry: u32,
    ) -> Result<CustomerRow, LedgerError> {
        let phone = self.phone_key(raw_phone)?;
        if laundry + dry == 0 {
            return Err(LedgerError::InvalidInput("a visit needs at least one unit".into()));
        }
        self.check_units(laundry, dry)?;
        let threshold = self.config.reward_threshold;
        let record = self
            .customers
            .get_mut(&phone)
            .ok_or_else(|| LedgerError::NotFound(phone.to_string()))?;

        record_usage(record, Counter::Laundry, laundry, threshold)?;
        record_usage(record, Counter::Dry, dry, threshold)?;
        record.mark_visit(Utc::now());
        let total = record.total;

        self.store.save_customers(&self.customers)?;
        self.store
            .append_history(HistoryEntry::record(phone.clone(), visit_kind(laundry, dry, total)))?;
        info!(%phone, laundry, dry, total, "visit recorded");
        Ok(self.row_for(&phone))
    }

    /// Grants the configured reward to each eligible customer in the batch.
    ///
    /// Customers below the threshold (or unknown) are reported in the batch
    /// result, not treated as failures; the caller decides how to present
    /// them. The map is persisted once, then one `reward_granted` entry is
    /// appended per grant.
    ///
    /// # Errors
    ///
    /// Persistence failures only.
    pub fn grant_rewards(&mut self, phones: &[PhoneKey]) -> Result<RewardBatchReport, LedgerError> {
        let threshold = self.config.reward_threshold;
        let points = self.config.reward_points;
        let order = self.config.consume_order.clone();

        let mut granted = Vec::new();
        let mut insufficient = Vec::new();
        let mut not_found = Vec::new();

        for phone in phones {
            let Some(record) = self.customers.get_mut(phone) else {
                warn!(%phone, "reward requested for unknown customer");
                not_found.push(phone.clone());
                continue;
            };
            match grant_reward(record, points, threshold, &order)? {
                RewardOutcome::Granted(receipt) => granted.push((phone.clone(), receipt)),
                RewardOutcome::Insufficient { count_before, threshold } => {
                    insufficient.push(InsufficientCustomer {
                        phone: phone.clone(),
                        count_before,
                        threshold,
                    });
                }
            }
        }

        if !granted.is_empty() {
            self.store.save_customers(&self.customers)?;
            for (phone, receipt) in &granted {
                self.store.append_history(HistoryEntry::record(
                    phone.clone(),
                    EntryKind::RewardGranted {
                        points: receipt.points_granted,
                        count_before: receipt.count_before,
                        count_after: receipt.count_after,
                        threshold: receipt.threshold,
                        reason: format!("accumulated {threshold} uses"),
                    },
                ))?;
            }
        }
        info!(
            selected = phones.len(),
            granted = granted.len(),
            insufficient = insufficient.len(),
            not_found = not_found.len(),
            "reward batch done"
        );
        Ok(RewardBatchReport { selected: phones.len(), granted, insufficient, not_found })
    }

    /// Credits points outside the threshold cycle, with a reason for the log.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidInput`] for zero points,
    /// [`LedgerError::NotFound`], or a persistence failure.
    pub fn manual_grant(
        &mut self,
        raw_phone: &str,
        points: u32,
        reason: &str,
    ) -> Result<u32, LedgerError> {
        let phone = self.phone_key(raw_phone)?;
        if points == 0 {
            return Err(LedgerError::InvalidInput("points must be positive".into()));
        }
        let threshold = self.config.reward_threshold;
        let record = self
            .customers
            .get_mut(&phone)
            .ok_or_else(|| LedgerError::NotFound(phone.to_string()))?;
        record.points_remaining += points;
        record.recalc(threshold);
        let balance = record.points_remaining;

        self.store.save_customers(&self.customers)?;
        self.store.append_history(HistoryEntry::record(
            phone.clone(),
            EntryKind::ManualGrant { points, reason: reason.to_string() },
        ))?;
        info!(%phone, points, balance, "manual grant");
        Ok(balance)
    }

    /// Spends points from a customer's balance.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientPoints`] when the balance is short (a
    /// structured refusal for the shell to render),
    /// [`LedgerError::InvalidInput`], [`LedgerError::NotFound`], or a
    /// persistence failure.
    pub fn use_points(
        &mut self,
        raw_phone: &str,
        points: u32,
        reason: &str,
    ) -> Result<u32, LedgerError> {
        let phone = self.phone_key(raw_phone)?;
        if points == 0 {
            return Err(LedgerError::InvalidInput("points must be positive".into()));
        }
        let threshold = self.config.reward_threshold;
        let record = self
            .customers
            .get_mut(&phone)
            .ok_or_else(|| LedgerError::NotFound(phone.to_string()))?;
        if record.points_remaining < points {
            return Err(LedgerError::InsufficientPoints {
                have: record.points_remaining,
                requested: points,
            });
        }
        record.points_remaining -= points;
        record.recalc(threshold);
        let balance = record.points_remaining;

        self.store.save_customers(&self.customers)?;
        self.store.append_history(HistoryEntry::record(
            phone.clone(),
            EntryKind::PointUse { points, reason: reason.to_string() },
        ))?;
        info!(%phone, points, balance, "points used");
        Ok(balance)
    }

    /// Reverses the customer's most recent history entry, if it is of a
    /// reversible type (visits and point uses).
    ///
    /// Reward grants, deletions, and undos themselves report
    /// [`UndoOutcome::NotReversible`] rather than attempting a partial
    /// rollback.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InvalidPhone`], [`LedgerError::NotFound`], or a
    /// persistence failure.
    pub fn undo_last(&mut self, raw_phone: &str) -> Result<UndoOutcome, LedgerError> {
        let phone = self.phone_key(raw_phone)?;
        let history = self.store.load_history();
        let Some(last) = history.iter().rev().find(|entry| entry.phone == phone) else {
            return Ok(UndoOutcome::NothingToUndo);
        };
        if !last.kind.is_reversible() {
            return Ok(UndoOutcome::NotReversible {
                entry_type: last.kind.type_name().to_string(),
            });
        }

        let threshold = self.config.reward_threshold;
        let record = self
            .customers
            .get_mut(&phone)
            .ok_or_else(|| LedgerError::NotFound(phone.to_string()))?;
        match &last.kind {
            EntryKind::VisitLaundry { laundry_added, .. } => {
                record.laundry = record.laundry.saturating_sub(*laundry_added);
                record.month_count = record.month_count.saturating_sub(1);
            }
            EntryKind::VisitDry { dry_added, .. } => {
                record.dry = record.dry.saturating_sub(*dry_added);
                record.month_count = record.month_count.saturating_sub(1);
            }
            EntryKind::VisitBundle { laundry_added, dry_added, .. } => {
                record.laundry = record.laundry.saturating_sub(*laundry_added);
                record.dry = record.dry.saturating_sub(*dry_added);
                record.month_count = record.month_count.saturating_sub(1);
            }
            EntryKind::PointUse { points, .. } => {
                record.points_remaining += points;
            }
            _ => unreachable!("is_reversible gated"),
        }
        record.recalc(threshold);

        let reverted_id = last.id.clone();
        let reverted_type = last.kind.type_name().to_string();
        self.store.save_customers(&self.customers)?;
        self.store.append_history(HistoryEntry::record(
            phone.clone(),
            EntryKind::Undo { reverted_id: reverted_id.clone(), reverted_type: reverted_type.clone() },
        ))?;
        info!(%phone, %reverted_id, %reverted_type, "undid last entry");
        Ok(UndoOutcome::Reverted { entry_id: reverted_id, entry_type: reverted_type })
    }

    /// Deletes customers and logs one `customer_delete` entry per removal.
    ///
    /// Unknown keys are counted in the report, not errors.
    ///
    /// # Errors
    ///
    /// Persistence failures only.
    pub fn delete(&mut self, phones: &[PhoneKey]) -> Result<DeleteReport, LedgerError> {
        let names: Vec<(PhoneKey, String)> = phones
            .iter()
            .filter_map(|phone| {
                self.customers.get(phone).map(|record| (phone.clone(), record.name.clone()))
            })
            .collect();
        let report = self.store.delete_customers(phones, self.config.reward_threshold)?;
        self.customers = self.store.load_customers(self.config.reward_threshold);
        for (phone, name) in names {
            self.store
                .append_history(HistoryEntry::record(phone, EntryKind::CustomerDelete { name }))?;
        }
        Ok(report)
    }

    /// The full customer list as display rows, phone ascending.
    pub fn rows(&self) -> Vec<CustomerRow> {
        self.customers.keys().map(|phone| self.row_for(phone)).collect()
    }

    /// Display rows whose phone or name contains `keyword`.
    pub fn search(&self, keyword: &str) -> Vec<CustomerRow> {
        if keyword.is_empty() {
            return self.rows();
        }
        self.customers
            .iter()
            .filter(|(phone, record)| {
                phone.as_str().contains(keyword) || record.name.contains(keyword)
            })
            .map(|(phone, _)| self.row_for(phone))
            .collect()
    }

    /// Monthly statistics from the persisted log.
    pub fn report(&mut self, month: MonthKey) -> MonthlyReport {
        let history = self.store.load_history();
        monthly_report(&self.customers, &history, month, self.config.loyal_visits)
    }

    /// Month-over-month statistics from the persisted log.
    pub fn report_mom(&mut self, month: MonthKey) -> MonthOverMonth {
        let history = self.store.load_history();
        month_over_month(&self.customers, &history, month, self.config.loyal_visits)
    }

    fn check_units(&self, laundry: u32, dry: u32) -> Result<(), LedgerError> {
        if laundry.max(dry) > MAX_UNITS_PER_ENTRY {
            return Err(LedgerError::InvalidInput(format!(
                "usage amount exceeds per-entry cap of {MAX_UNITS_PER_ENTRY}"
            )));
        }
        Ok(())
    }

    fn row_for(&self, phone: &PhoneKey) -> CustomerRow {
        let record = &self.customers[phone];
        let threshold = self.config.reward_threshold;
        // threshold > 0 is checked at open()
        let remaining = remaining_until_threshold(record.total, threshold).unwrap_or(0);
        CustomerRow {
            phone: phone.display(),
            key: phone.clone(),
            name: record.name.clone(),
            laundry: record.laundry,
            dry: record.dry,
            total: record.total,
            reward_needed: record.reward_needed,
            remaining,
            points_remaining: record.points_remaining,
            month_count: record.month_count,
        }
    }
}

fn visit_kind(laundry: u32, dry: u32, count_after: u32) -> EntryKind {
    match (laundry, dry) {
        (0, dry_added) => EntryKind::VisitDry { dry_added, count_after },
        (laundry_added, 0) => EntryKind::VisitLaundry { laundry_added, count_after },
        (laundry_added, dry_added) => {
            EntryKind::VisitBundle { laundry_added, dry_added, count_after }
        }
    }
}
