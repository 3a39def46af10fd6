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

//! Durable, corruption-resistant persistence of the ledger files.
//!
//! The store owns the on-disk representation: the customer map, the
//! append-only history log, one generation of backups, and the quarantine of
//! broken files. Writes are atomic (backup, temp file, rename); reads degrade
//! to a default value rather than refusing to start, quarantining unparseable
//! bytes and surfacing a one-shot recovery warning for the caller to show the
//! user.
//!
//! Single-process access is assumed throughout: `append_history` is a
//! read-modify-write of the whole log with no lock, and the log is re-read
//! before every append rather than cached across operations.

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::base::PhoneKey;
use crate::customer::{CustomerMap, StoredCustomer};
use crate::error::LedgerError;
use crate::history::HistoryEntry;

const CUSTOMER_FILE: &str = "customers.json";
const LEGACY_USER_FILE: &str = "users.json";
const HISTORY_FILE: &str = "history.json";
const MIGRATION_FLAG: &str = ".migrated_phone_v1";

/// Outcome counts of a delete batch, for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteReport {
    pub requested: usize,
    pub deleted: usize,
}

/// File-backed ledger store rooted at a base directory.
///
/// Layout: `<base>/data` holds the live files and quarantined broken files,
/// `<base>/backup` holds the `.bak` generation and migration side files. The
/// one-shot recovery warning lives here as an explicit field rather than
/// module-global state.
#[derive(Debug)]
pub struct LedgerStore {
    data_dir: PathBuf,
    backup_dir: PathBuf,
    recovery_warning: Option<String>,
}

impl LedgerStore {
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        LedgerStore {
            data_dir: base.join("data"),
            backup_dir: base.join("backup"),
            recovery_warning: None,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    pub fn customers_path(&self) -> PathBuf {
        self.data_dir.join(CUSTOMER_FILE)
    }

    pub fn legacy_users_path(&self) -> PathBuf {
        self.data_dir.join(LEGACY_USER_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(HISTORY_FILE)
    }

    pub fn migration_flag_path(&self) -> PathBuf {
        self.data_dir.join(MIGRATION_FLAG)
    }

    /// Creates the data/backup directories and empty map/history files on
    /// first run.
    ///
    /// The customer file is not created while a legacy `users.json` is still
    /// waiting to be migrated; the migration engine produces it.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PersistenceFailed`] if a directory or file cannot be
    /// created.
    pub fn ensure_files(&mut self) -> Result<(), LedgerError> {
        for dir in [&self.data_dir, &self.backup_dir] {
            fs::create_dir_all(dir).map_err(|source| LedgerError::PersistenceFailed {
                path: dir.clone(),
                source,
            })?;
        }
        let customers = self.customers_path();
        if !customers.exists() && !self.legacy_users_path().exists() {
            self.write_json(&customers, &CustomerMap::new())?;
            info!(path = %customers.display(), "created empty customer file");
        }
        let history = self.history_path();
        if !history.exists() {
            self.write_json(&history, &Vec::<HistoryEntry>::new())?;
            info!(path = %history.display(), "created empty history file");
        }
        Ok(())
    }

    /// Atomically replaces `path` with the JSON serialization of `value`.
    ///
    /// Order: refresh `<name>.bak` in the backup directory if the file
    /// exists, serialize into a temp file in the destination directory, then
    /// rename over the destination. The rename is the only step that makes
    /// new content visible, so a failure anywhere leaves the old content
    /// intact.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PersistenceFailed`], always propagated to the caller.
    pub fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), LedgerError> {
        let fail = |source: std::io::Error| LedgerError::PersistenceFailed {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(&self.backup_dir).map_err(fail)?;
        if path.exists() {
            let name = file_name(path);
            let bak = self.backup_dir.join(format!("{name}.bak"));
            fs::copy(path, &bak).map_err(fail)?;
        }

        let dir = path.parent().unwrap_or(Path::new("."));
        let tmp = NamedTempFile::new_in(dir).map_err(fail)?;
        serde_json::to_writer_pretty(&tmp, value)
            .map_err(|e| fail(std::io::Error::other(e)))?;
        tmp.persist(path).map_err(|e| fail(e.error))?;
        debug!(path = %path.display(), "wrote ledger file");
        Ok(())
    }

    /// Reads and parses `path`, degrading to `default` on any failure.
    ///
    /// Missing file: first-run case, logged as informational. Unparseable
    /// content: the original bytes move aside to `<name>.broken_<timestamp>`,
    /// `default` becomes the new content, and a recovery warning is recorded
    /// for [`take_recovery_warning`](Self::take_recovery_warning). OS read
    /// failure: logged at error severity, `default` returned; a read never
    /// propagates a crash.
    pub fn read_json<T: DeserializeOwned + Serialize>(&mut self, path: &Path, default: T) -> T {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "file missing, starting empty");
                return default;
            }
            Err(e) => {
                error!(path = %path.display(), error = %e, "read failed");
                return default;
            }
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                error!(path = %path.display(), error = %e, "parse failed, file may be corrupt");
                self.quarantine_broken(path);
                if let Err(e) = self.write_json(path, &default) {
                    error!(path = %path.display(), error = %e, "could not reset corrupt file");
                }
                self.recovery_warning = Some(format!(
                    "data file was corrupt and has been reset: {}",
                    file_name(path)
                ));
                default
            }
        }
    }

    /// Moves a broken file aside under a timestamped quarantine name.
    fn quarantine_broken(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        let ts = Utc::now().format("%Y%m%d_%H%M%S");
        let quarantined = path.with_file_name(format!("{}.broken_{ts}", file_name(path)));
        match fs::rename(path, &quarantined) {
            Ok(()) => warn!(
                from = %path.display(),
                to = %quarantined.display(),
                "quarantined broken file"
            ),
            Err(e) => error!(path = %path.display(), error = %e, "quarantine failed"),
        }
    }

    /// Loads the customer map, normalizing keys and upgrading legacy-schema
    /// rows.
    ///
    /// Keys that fail validation after normalization are dropped with a
    /// warning; they never enter the in-memory map.
    pub fn load_customers(&mut self, threshold: u32) -> CustomerMap {
        let raw: BTreeMap<String, StoredCustomer> =
            self.read_json(&self.customers_path(), BTreeMap::new());
        let now = Utc::now();
        let mut customers = CustomerMap::new();
        for (key, stored) in raw {
            let phone = PhoneKey::normalize(&key);
            if !phone.is_valid() {
                warn!(key = %key, "dropping customer with invalid phone key");
                continue;
            }
            customers.insert(phone, stored.into_current(now, threshold));
        }
        customers
    }

    /// Persists the customer map.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PersistenceFailed`] on any write failure.
    pub fn save_customers(&self, customers: &CustomerMap) -> Result<(), LedgerError> {
        self.write_json(&self.customers_path(), customers)?;
        info!(count = customers.len(), "saved customer map");
        Ok(())
    }

    /// Loads the full history log, oldest first.
    pub fn load_history(&mut self) -> Vec<HistoryEntry> {
        self.read_json(&self.history_path(), Vec::new())
    }

    /// Appends one entry to the history log.
    ///
    /// The full log is re-read, the entry gets a fresh unique id when it has
    /// none, and the whole file is written back. Read-modify-write without a
    /// lock: single-process access assumed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PersistenceFailed`] on any write failure.
    pub fn append_history(&mut self, mut entry: HistoryEntry) -> Result<(), LedgerError> {
        if entry.id.is_empty() {
            entry.id = Uuid::new_v4().to_string();
        }
        let mut history = self.load_history();
        debug!(phone = %entry.phone, kind = entry.kind.type_name(), "appending history entry");
        history.push(entry);
        self.write_json(&self.history_path(), &history)
    }

    /// Removes the given customers from the map and writes it back.
    ///
    /// Missing keys are no-ops, not errors; the report carries requested vs.
    /// actually-deleted counts.
    ///
    /// # Errors
    ///
    /// [`LedgerError::PersistenceFailed`] on any write failure.
    pub fn delete_customers(
        &mut self,
        phones: &[PhoneKey],
        threshold: u32,
    ) -> Result<DeleteReport, LedgerError> {
        let mut customers = self.load_customers(threshold);
        let before = customers.len();
        let mut deleted = 0;
        for phone in phones {
            if customers.remove(phone).is_some() {
                deleted += 1;
            }
        }
        self.save_customers(&customers)?;
        info!(
            requested = phones.len(),
            deleted,
            total_before = before,
            total_after = customers.len(),
            "deleted customers"
        );
        Ok(DeleteReport { requested: phones.len(), deleted })
    }

    /// Returns the pending recovery warning, clearing it.
    ///
    /// At most one caller sees each warning; the shell surfaces it to the
    /// user once.
    pub fn take_recovery_warning(&mut self) -> Option<String> {
        self.recovery_warning.take()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(String::new, |n| n.to_string_lossy().into_owned())
}
