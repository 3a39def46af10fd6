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

use clap::{Parser, Subcommand};
use loyalty_ledger_rs::{
    LedgerConfig, LedgerError, LoyaltyLedger, MonthKey, PhoneKey, UndoOutcome,
};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Loyalty Ledger - customer points over local JSON files
///
/// Registers customers, records visits, grants threshold rewards, and
/// reports monthly statistics. All state lives under the base directory.
#[derive(Parser, Debug)]
#[command(name = "loyalty-ledger-rs")]
#[command(about = "A loyalty points ledger over local JSON files", long_about = None)]
struct Args {
    /// Base directory for data/ and backup/
    #[arg(long, default_value = ".", global = true)]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new customer
    Register {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        memo: String,
        /// Laundry units of a first visit
        #[arg(long, default_value_t = 0)]
        laundry: u32,
        /// Dry-cleaning units of a first visit
        #[arg(long, default_value_t = 0)]
        dry: u32,
    },
    /// Record a visit for an existing customer
    Visit {
        #[arg(long)]
        phone: String,
        #[arg(long, default_value_t = 0)]
        laundry: u32,
        #[arg(long, default_value_t = 0)]
        dry: u32,
    },
    /// Grant the threshold reward to each eligible customer
    Reward {
        /// Phone numbers, raw or hyphenated
        #[arg(required = true)]
        phones: Vec<String>,
    },
    /// Credit points outside the threshold cycle
    Grant {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        points: u32,
        #[arg(long, default_value = "manual grant")]
        reason: String,
    },
    /// Spend points from a customer's balance
    UsePoints {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        points: u32,
        #[arg(long, default_value = "point use")]
        reason: String,
    },
    /// Reverse the customer's most recent reversible entry
    Undo {
        #[arg(long)]
        phone: String,
    },
    /// List customers, optionally filtered by phone or name
    List {
        keyword: Option<String>,
    },
    /// Monthly statistics (YYYY-MM)
    Report {
        #[arg(long)]
        month: String,
        /// Include the previous month and deltas
        #[arg(long)]
        mom: bool,
    },
    /// Delete customers
    Delete {
        #[arg(required = true)]
        phones: Vec<String>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error [{}]: {}", e.reason_code(), e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), LedgerError> {
    let mut ledger = LoyaltyLedger::open(LedgerConfig::new(&args.base_dir))?;
    if let Some(warning) = ledger.take_recovery_warning() {
        eprintln!("warning: {warning}");
    }

    match args.command {
        Command::Register { phone, name, memo, laundry, dry } => {
            let row = ledger.register(&phone, &name, &memo, laundry, dry)?;
            println!("registered {} ({})", row.name, row.phone);
        }
        Command::Visit { phone, laundry, dry } => {
            let row = ledger.record_visit(&phone, laundry, dry)?;
            println!(
                "visit recorded for {}: total {} ({} until reward)",
                row.phone, row.total, row.remaining
            );
        }
        Command::Reward { phones } => {
            let keys = parse_phones(&ledger, &phones)?;
            let batch = ledger.grant_rewards(&keys)?;
            for (phone, receipt) in &batch.granted {
                println!(
                    "granted {} points to {} (count {} -> {})",
                    receipt.points_granted,
                    phone.display(),
                    receipt.count_before,
                    receipt.count_after
                );
            }
            for customer in &batch.insufficient {
                println!(
                    "skipped {} [INSUFFICIENT_COUNT]: {} of {} uses",
                    customer.phone.display(),
                    customer.count_before,
                    customer.threshold
                );
            }
            for phone in &batch.not_found {
                println!("skipped {} [NOT_FOUND]", phone.display());
            }
        }
        Command::Grant { phone, points, reason } => {
            let balance = ledger.manual_grant(&phone, points, &reason)?;
            println!("granted {points} points, balance {balance}");
        }
        Command::UsePoints { phone, points, reason } => {
            let balance = ledger.use_points(&phone, points, &reason)?;
            println!("used {points} points, balance {balance}");
        }
        Command::Undo { phone } => match ledger.undo_last(&phone)? {
            UndoOutcome::Reverted { entry_id, entry_type } => {
                println!("reverted {entry_type} entry {entry_id}");
            }
            UndoOutcome::NotReversible { entry_type } => {
                println!("cannot undo [NOT_REVERSIBLE]: last entry is {entry_type}");
            }
            UndoOutcome::NothingToUndo => println!("nothing to undo [NO_HISTORY]"),
        },
        Command::List { keyword } => {
            let rows = match keyword {
                Some(keyword) => ledger.search(&keyword),
                None => ledger.rows(),
            };
            println!(
                "{:<15} {:<12} {:>7} {:>5} {:>5} {:>9} {:>6} {:>8}",
                "phone", "name", "laundry", "dry", "total", "remaining", "due", "points"
            );
            for row in rows {
                println!(
                    "{:<15} {:<12} {:>7} {:>5} {:>5} {:>9} {:>6} {:>8}",
                    row.phone,
                    row.name,
                    row.laundry,
                    row.dry,
                    row.total,
                    row.remaining,
                    if row.reward_needed { "yes" } else { "no" },
                    row.points_remaining
                );
            }
        }
        Command::Report { month, mom } => {
            let month: MonthKey = month.parse()?;
            if mom {
                let report = ledger.report_mom(month);
                println!("{}", render_json(&report)?);
            } else {
                let report = ledger.report(month);
                println!("{}", render_json(&report)?);
            }
        }
        Command::Delete { phones } => {
            let keys = parse_phones(&ledger, &phones)?;
            let report = ledger.delete(&keys)?;
            println!("deleted {} of {} requested", report.deleted, report.requested);
        }
    }
    Ok(())
}

fn parse_phones(ledger: &LoyaltyLedger, raw: &[String]) -> Result<Vec<PhoneKey>, LedgerError> {
    raw.iter().map(|phone| ledger.phone_key(phone)).collect()
}

fn render_json<T: serde::Serialize>(value: &T) -> Result<String, LedgerError> {
    serde_json::to_string_pretty(value).map_err(|e| LedgerError::InvalidInput(e.to_string()))
}
