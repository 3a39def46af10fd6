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

//! Error types for ledger operations.
//!
//! Business refusals that callers are expected to handle in stride — a reward
//! request below the threshold, an undo of a non-reversible entry — are not
//! errors; they come back as structured outcome values
//! ([`RewardOutcome`](crate::accrual::RewardOutcome),
//! [`UndoOutcome`](crate::ledger::UndoOutcome)). The variants here are the
//! failures that abort an operation.

use std::path::PathBuf;
use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Phone number failed validation after normalization
    #[error("invalid phone number: {0}")]
    InvalidPhone(String),

    /// Negative, zero-where-positive-required, or out-of-range input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation referenced a phone key absent from the customer map
    #[error("customer not found: {0}")]
    NotFound(String),

    /// Registration for a phone key that already exists
    #[error("customer already registered: {0}")]
    AlreadyRegistered(String),

    /// Point use exceeding the customer's balance
    #[error("insufficient points: have {have}, requested {requested}")]
    InsufficientPoints { have: u32, requested: u32 },

    /// I/O or serialization failure while writing a ledger file.
    ///
    /// Always propagated: silently losing a write is worse than a crash.
    #[error("failed to persist {path}: {source}")]
    PersistenceFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LedgerError {
    /// Stable machine-readable reason code for the presentation shell.
    pub fn reason_code(&self) -> &'static str {
        match self {
            LedgerError::InvalidPhone(_) => "INVALID_PHONE",
            LedgerError::InvalidInput(_) => "INVALID_INPUT",
            LedgerError::NotFound(_) => "NOT_FOUND",
            LedgerError::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            LedgerError::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            LedgerError::PersistenceFailed { .. } => "PERSISTENCE_FAILED",
        }
    }
}
