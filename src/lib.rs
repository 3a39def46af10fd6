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

//! # Loyalty Ledger
//!
//! This library provides a loyalty/points ledger for a small service
//! business: per-customer usage counters, reward accrual against a
//! threshold, a point balance, and a chronological activity log, persisted
//! as local JSON files with crash-safe writes and corruption recovery.
//!
//! ## Core Components
//!
//! - [`LoyaltyLedger`]: Central engine owning the customer map and store
//! - [`LedgerStore`]: Atomic file-backed persistence with backup and
//!   quarantine semantics
//! - [`PhoneKey`]: Normalized customer identity
//! - [`accrual`]: Pure reward-accrual transactions
//! - [`report`]: Monthly statistics derived from the history log
//! - [`LedgerError`]: Error types for ledger operation failures
//!
//! ## Example
//!
//! ```no_run
//! use loyalty_ledger_rs::{LedgerConfig, LoyaltyLedger};
//!
//! let mut ledger = LoyaltyLedger::open(LedgerConfig::new("./")).unwrap();
//!
//! // Register a customer and record a visit
//! ledger.register("010-1234-5678", "Kim", "", 0, 0).unwrap();
//! ledger.record_visit("010-1234-5678", 7, 3).unwrap();
//!
//! // Ten accumulated uses: the reward is due
//! let key = ledger.phone_key("010-1234-5678").unwrap();
//! let batch = ledger.grant_rewards(&[key]).unwrap();
//! assert_eq!(batch.granted.len(), 1);
//! ```
//!
//! ## Concurrency
//!
//! Single-process, single-threaded by design: every store operation is
//! synchronous, and the history log is re-read before each append. Two
//! processes pointed at the same files are unsupported.

pub mod accrual;
mod base;
pub mod customer;
pub mod error;
pub mod history;
mod ledger;
pub mod migration;
pub mod report;
mod store;

pub use accrual::{Counter, DEFAULT_CONSUME_ORDER, RewardOutcome, RewardReceipt};
pub use base::PhoneKey;
pub use customer::{CustomerMap, CustomerRecord};
pub use error::LedgerError;
pub use history::{EntryKind, HistoryEntry};
pub use ledger::{
    CustomerRow, InsufficientCustomer, LedgerConfig, LoyaltyLedger, RewardBatchReport, UndoOutcome,
};
pub use migration::{MigrationOutcome, MigrationReport};
pub use report::{MonthKey, MonthOverMonth, MonthlyReport, TopCustomer};
pub use store::{DeleteReport, LedgerStore};
