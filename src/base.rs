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

//! Customer identity keys.
//!
//! A [`PhoneKey`] is the normalized digit-only phone number that identifies a
//! customer throughout the ledger. Two raw phone strings refer to the same
//! customer iff their digit-only normalization is equal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Normalized customer identifier: 10 or 11 ASCII digits starting with "01".
///
/// Construction via [`PhoneKey::normalize`] never fails; validity is a
/// separate check so that raw user input can be normalized first and rejected
/// second. Only valid keys may be stored in the customer map.
///
/// # Example
///
/// ```
/// use loyalty_ledger_rs::PhoneKey;
///
/// let key = PhoneKey::normalize("010-1234-5678");
/// assert!(key.is_valid());
/// assert_eq!(key.as_str(), "01012345678");
/// assert_eq!(key.display(), "010-1234-5678");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(transparent)]
pub struct PhoneKey(String);

impl PhoneKey {
    /// Strips every non-digit character from `raw`.
    ///
    /// Never fails: empty or garbage input yields an empty or garbage key
    /// that [`is_valid`](Self::is_valid) will reject.
    pub fn normalize(raw: &str) -> Self {
        PhoneKey(raw.chars().filter(char::is_ascii_digit).collect())
    }

    /// True iff the key is 10 or 11 digits and starts with "01".
    ///
    /// Checked even though [`normalize`](Self::normalize) only emits digits:
    /// keys also arrive straight from hand-editable JSON files.
    pub fn is_valid(&self) -> bool {
        matches!(self.0.len(), 10 | 11)
            && self.0.bytes().all(|b| b.is_ascii_digit())
            && self.0.starts_with("01")
    }

    /// Hyphenated form for display: `01012345678` -> `010-1234-5678`.
    ///
    /// Keys of unexpected length pass through unchanged. Pure, no side
    /// effects.
    pub fn display(&self) -> String {
        match self.0.len() {
            11 => format!("{}-{}-{}", &self.0[..3], &self.0[3..7], &self.0[7..]),
            10 => format!("{}-{}-{}", &self.0[..3], &self.0[3..6], &self.0[6..]),
            _ => self.0.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
