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

//! Point accrual.
//!
//! Pure state transitions on a [`CustomerRecord`]: usage recording, the
//! threshold-consumption transaction that grants a reward, and the
//! remaining-until-threshold arithmetic. No I/O happens here — the caller
//! logs the returned receipt and persists the map, keeping side effects out
//! of the transaction logic.
//!
//! # Consume order
//!
//! When a reward is granted, exactly `threshold` units are drained from the
//! counters. Several counter combinations can satisfy the same threshold, so
//! the drain follows an explicit priority list: the first-listed counter is
//! taken down to zero before the next is touched. The default order drains
//! dry (the secondary activity) before laundry.

use serde::{Deserialize, Serialize};

use crate::customer::CustomerRecord;
use crate::error::LedgerError;

/// Per-entry safety cap on usage units, against fat-finger quantities.
pub const MAX_UNITS_PER_ENTRY: u32 = 50;

/// A usage counter on the customer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    Laundry,
    Dry,
}

/// Default drain priority: secondary activity before primary.
pub const DEFAULT_CONSUME_ORDER: [Counter; 2] = [Counter::Dry, Counter::Laundry];

/// Outcome of a reward request.
///
/// `Insufficient` is a reported condition, not an error: callers decide
/// whether to skip the customer or abort a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum RewardOutcome {
    Granted(RewardReceipt),
    Insufficient { count_before: u32, threshold: u32 },
}

/// Before/after snapshot of a granted reward, for the caller to log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RewardReceipt {
    pub laundry_before: u32,
    pub dry_before: u32,
    pub laundry_after: u32,
    pub dry_after: u32,
    pub count_before: u32,
    pub count_after: u32,
    pub points_before: u32,
    pub points_after: u32,
    pub points_granted: u32,
    pub threshold: u32,
    pub consume_order: Vec<Counter>,
}

/// Adds `amount` units to one counter and recomputes the derived fields.
///
/// # Errors
///
/// [`LedgerError::InvalidInput`] when `amount` exceeds
/// [`MAX_UNITS_PER_ENTRY`].
pub fn record_usage(
    record: &mut CustomerRecord,
    kind: Counter,
    amount: u32,
    threshold: u32,
) -> Result<(), LedgerError> {
    if amount > MAX_UNITS_PER_ENTRY {
        return Err(LedgerError::InvalidInput(format!(
            "usage amount {amount} exceeds per-entry cap of {MAX_UNITS_PER_ENTRY}"
        )));
    }
    match kind {
        Counter::Laundry => record.laundry += amount,
        Counter::Dry => record.dry += amount,
    }
    record.recalc(threshold);
    Ok(())
}

/// Consumes `threshold` units from the counters and credits `points`.
///
/// Precondition `total >= threshold` is checked first; falling short returns
/// [`RewardOutcome::Insufficient`] with the current total. On success the
/// counters are drained in `consume_order` priority, the balance grows by
/// `points`, derived fields are recomputed, and a full before/after
/// [`RewardReceipt`] comes back for logging.
///
/// # Errors
///
/// [`LedgerError::InvalidInput`] when `threshold` is zero or `consume_order`
/// does not reach `threshold` units.
pub fn grant_reward(
    record: &mut CustomerRecord,
    points: u32,
    threshold: u32,
    consume_order: &[Counter],
) -> Result<RewardOutcome, LedgerError> {
    if threshold == 0 {
        return Err(LedgerError::InvalidInput("reward threshold must be positive".into()));
    }

    let count_before = record.laundry + record.dry;
    if count_before < threshold {
        return Ok(RewardOutcome::Insufficient { count_before, threshold });
    }

    let mut laundry = record.laundry;
    let mut dry = record.dry;
    let mut need = threshold;
    for counter in consume_order {
        let available = match counter {
            Counter::Laundry => &mut laundry,
            Counter::Dry => &mut dry,
        };
        let take = need.min(*available);
        *available -= take;
        need -= take;
        if need == 0 {
            break;
        }
    }
    if need > 0 {
        return Err(LedgerError::InvalidInput(format!(
            "consume order {consume_order:?} cannot drain {threshold} units"
        )));
    }

    let receipt = RewardReceipt {
        laundry_before: record.laundry,
        dry_before: record.dry,
        laundry_after: laundry,
        dry_after: dry,
        count_before,
        count_after: laundry + dry,
        points_before: record.points_remaining,
        points_after: record.points_remaining + points,
        points_granted: points,
        threshold,
        consume_order: consume_order.to_vec(),
    };

    record.laundry = laundry;
    record.dry = dry;
    record.points_remaining += points;
    record.recalc(threshold);

    debug_assert_eq!(record.total, receipt.count_after);
    debug_assert_eq!(record.total, count_before - threshold);

    Ok(RewardOutcome::Granted(receipt))
}

/// Units still needed to reach the next multiple of `threshold`.
///
/// Satisfies `0 <= result < threshold` and
/// `(total + result) % threshold == 0`.
///
/// # Errors
///
/// [`LedgerError::InvalidInput`] when `threshold` is zero.
pub fn remaining_until_threshold(total: u32, threshold: u32) -> Result<u32, LedgerError> {
    if threshold == 0 {
        return Err(LedgerError::InvalidInput("reward threshold must be positive".into()));
    }
    Ok((threshold - total % threshold) % threshold)
}
