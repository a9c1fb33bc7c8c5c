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

use chrono::{DateTime, Utc};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tiered_ledger_rs::{
    AccountId, BankDetails, CsvJournal, DepositReference, Engine, EngineConfig, LedgerError,
    ManualClock, PaymentConfirmation, PlanCatalog, PlanId, Role, TaskTemplate, TaskTemplateId,
    WithdrawalId,
};
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

/// Acting admin for template loading.
const OPERATOR: AccountId = AccountId(0);

/// Tiered Ledger - Replay engine commands from a CSV file
///
/// Reads commands from a CSV file and outputs account snapshots to stdout.
/// Supports registration, deposits, plan purchases, tasks and withdrawals.
#[derive(Parser, Debug)]
#[command(name = "tiered-ledger-rs")]
#[command(about = "Replays ledger commands and prints account snapshots", long_about = None)]
struct Args {
    /// Path to CSV file with commands
    ///
    /// Expected format: op,account,target,amount,reference,at
    /// Example: cargo run -- commands.csv > accounts.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Plan catalog CSV (`id,name,price,withdrawal_limit`); defaults to the
    /// built-in tiers
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,

    /// Task template CSV
    /// (`id,title,reward,plan_id,duration_seconds,active_date,is_active`)
    #[arg(long, value_name = "FILE")]
    tasks: Option<PathBuf>,

    /// Append every committed transaction to this CSV file
    #[arg(long, value_name = "FILE")]
    journal: Option<PathBuf>,
}

fn main() {
    // A missing .env is fine; the environment may be set directly.
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let session = match build_engine(&args) {
        Ok(session) => session,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            error!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    if let Err(e) = replay(&session, BufReader::new(file)) {
        error!("Error replaying commands: {}", e);
        process::exit(1);
    }

    if let Err(e) = write_accounts(&session, std::io::stdout()) {
        error!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Engine plus the clock the replayed rows drive.
struct Session {
    engine: Engine,
    clock: Arc<ManualClock>,
}

fn build_engine(args: &Args) -> Result<Session, String> {
    let config = EngineConfig::from_env().map_err(|e| e.to_string())?;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let mut builder = Engine::builder().config(config).clock(clock.clone());

    if let Some(path) = &args.catalog {
        let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let catalog = PlanCatalog::from_csv(BufReader::new(file)).map_err(|e| e.to_string())?;
        builder = builder.catalog(catalog);
    }
    if let Some(path) = &args.journal {
        let file = File::create(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let journal = CsvJournal::new(file).map_err(|e| e.to_string())?;
        builder = builder.journal(Arc::new(journal));
    }

    let engine = builder.build();
    engine.roles().grant(OPERATOR, Role::Admin);

    if let Some(path) = &args.tasks {
        let file = File::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
        let loaded = load_templates(&engine, BufReader::new(file)).map_err(|e| e.to_string())?;
        info!(templates = loaded, "task templates loaded");
    }

    Ok(Session { engine, clock })
}

/// Loads task templates as the operator. Rejected rows are skipped.
fn load_templates<R: Read>(engine: &Engine, reader: R) -> Result<usize, csv::Error> {
    let mut rdr = ReaderBuilder::new().trim(Trim::All).from_reader(reader);
    let mut loaded = 0;
    for result in rdr.deserialize::<TaskTemplate>() {
        let template = result?;
        let id = template.id;
        match engine.upsert_template(OPERATOR, template) {
            Ok(()) => loaded += 1,
            Err(e) => debug!(task = %id, %e, "skipping task template"),
        }
    }
    Ok(loaded)
}

/// Raw CSV record matching the command format.
///
/// Fields: `op, account, target, amount, reference, at`
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: String,
    account: u32,
    #[serde(default)]
    target: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    amount: Option<Decimal>,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    at: Option<DateTime<Utc>>,
}

/// Replays commands from a CSV reader.
///
/// Rows are streamed, so arbitrarily large files are fine. Before a row runs,
/// the clock is moved to its `at` timestamp when one is given. Malformed rows
/// and rejected commands are logged and skipped.
///
/// # CSV Format
///
/// | op | account | target | amount | reference |
/// |----|---------|--------|--------|-----------|
/// | `register` | new account | referral code | | |
/// | `grant` | account made admin | | | |
/// | `deposit` | payer | | amount | gateway reference |
/// | `settle` | payer | gateway status (default `success`) | amount | gateway reference |
/// | `purchase` | account | plan id | | |
/// | `start` / `complete` | account | task template id | | |
/// | `withdraw` | account | bank name | amount | bank account number |
/// | `approve` / `reject` | acting admin | withdrawal id | | |
///
/// # Example
///
/// ```csv
/// op,account,target,amount,reference,at
/// register,1,,,,2025-01-01T09:00:00Z
/// settle,1,,6000,ps_001,
/// purchase,1,premium,,,
/// ```
///
/// # Errors
///
/// Returns a CSV error if the reader fails or the CSV structure is invalid.
fn replay<R: Read>(session: &Session, reader: R) -> Result<(), csv::Error> {
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .has_headers(true)
        .from_reader(reader);

    for (row, result) in rdr.deserialize::<CommandRecord>().enumerate() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                debug!(row, %e, "skipping malformed row");
                continue;
            }
        };
        if let Some(at) = record.at {
            session.clock.set(at);
        }
        let op = record.op.to_lowercase();
        match run(&session.engine, &op, record) {
            Ok(()) => {}
            Err(CommandError::Ledger(e)) => debug!(row, %op, %e, "command rejected"),
            Err(CommandError::Invalid(reason)) => debug!(row, %op, reason, "skipping row"),
        }
    }
    Ok(())
}

enum CommandError {
    Ledger(LedgerError),
    Invalid(&'static str),
}

impl From<LedgerError> for CommandError {
    fn from(err: LedgerError) -> Self {
        CommandError::Ledger(err)
    }
}

fn run(engine: &Engine, op: &str, record: CommandRecord) -> Result<(), CommandError> {
    let account = AccountId(record.account);
    let amount = || record.amount.ok_or(CommandError::Invalid("missing amount"));
    let target = || {
        record
            .target
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(CommandError::Invalid("missing target"))
    };
    let reference = || {
        record
            .reference
            .clone()
            .filter(|r| !r.is_empty())
            .ok_or(CommandError::Invalid("missing reference"))
    };
    let numeric = |raw: String| raw.parse::<u64>().map_err(|_| CommandError::Invalid("bad id"));

    match op {
        "register" => {
            let code = record.target.as_deref().filter(|c| !c.is_empty());
            engine.register_account(account, code)?;
        }
        "grant" => engine.roles().grant(account, Role::Admin),
        "deposit" => {
            engine.initiate_deposit(account, DepositReference::new(reference()?), amount()?)?;
        }
        "settle" => {
            let confirmation = PaymentConfirmation {
                reference: DepositReference::new(reference()?),
                amount: amount()?,
                payer_account_id: account,
                status: target().unwrap_or_else(|_| "success".to_string()),
            };
            engine.confirm_payment(&confirmation)?;
        }
        "purchase" => {
            engine.purchase_or_upgrade(account, &PlanId::new(target()?))?;
        }
        "start" => {
            let id = numeric(target()?)?;
            let id = u32::try_from(id).map_err(|_| CommandError::Invalid("bad id"))?;
            engine.start_task(account, TaskTemplateId(id))?;
        }
        "complete" => {
            let id = numeric(target()?)?;
            let id = u32::try_from(id).map_err(|_| CommandError::Invalid("bad id"))?;
            engine.complete_task(account, TaskTemplateId(id))?;
        }
        "withdraw" => {
            let bank = BankDetails {
                bank_name: target()?,
                account_number: reference()?,
                account_name: format!("Account {account}"),
            };
            engine.request_withdrawal(account, amount()?, bank)?;
        }
        "approve" => {
            engine.approve_withdrawal(account, WithdrawalId(numeric(target()?)?))?;
        }
        "reject" => {
            engine.reject_withdrawal(account, WithdrawalId(numeric(target()?)?))?;
        }
        _ => return Err(CommandError::Invalid("unknown op")),
    }
    Ok(())
}

/// Write account snapshots to a CSV writer.
///
/// Balances are rounded to two decimal places.
///
/// # CSV Format
///
/// Columns: `account, balance, plan, plan_price, withdrawal_limit,
/// total_withdrawn, referred_by, transactions`
///
/// # Example
///
/// ```csv
/// account,balance,plan,plan_price,withdrawal_limit,total_withdrawn,referred_by,transactions
/// 1,1000.00,premium,5000,10000,0,,2
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
fn write_accounts<W: Write>(session: &Session, writer: W) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);
    for account in session.engine.accounts() {
        wtr.serialize(account.snapshot())?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Cursor;

    fn session() -> Session {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let engine = Engine::builder().clock(clock.clone()).build();
        engine.roles().grant(OPERATOR, Role::Admin);
        Session { engine, clock }
    }

    fn run_csv(csv: &str) -> Session {
        let session = session();
        replay(&session, Cursor::new(csv.to_string())).unwrap();
        session
    }

    #[test]
    fn settle_and_purchase() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             settle,1,,6000,ps_001,\n\
             purchase,1,premium,,,\n",
        );
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(1000));
        assert_eq!(account.active_plan().unwrap().id, PlanId::new("premium"));
    }

    #[test]
    fn redelivered_settlement_is_ignored() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             settle,1,,500,ps_001,\n\
             settle,1,,500,ps_001,\n",
        );
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(500));
        assert_eq!(account.transactions().len(), 1);
    }

    #[test]
    fn failed_gateway_status_is_ignored() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             settle,1,failed,500,ps_001,\n",
        );
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(0));
    }

    #[test]
    fn referral_code_links_accounts() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             register,2,REF000001,,,\n\
             settle,2,,1000,ps_001,\n",
        );
        let referrer = session.engine.get_account(AccountId(1)).unwrap();
        let referred = session.engine.get_account(AccountId(2)).unwrap();
        assert_eq!(referrer.balance(), dec!(100));
        assert_eq!(referred.balance(), dec!(1050));
    }

    #[test]
    fn withdrawal_flow_with_admin() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             settle,1,,2000,ps_001,\n\
             purchase,1,basic,,,\n\
             withdraw,1,First Bank,500,0123456789,\n\
             approve,1,1,,,\n\
             approve,0,1,,,\n",
        );
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(500));
        assert_eq!(account.total_withdrawn(), dec!(500));
    }

    #[test]
    fn task_rows_follow_the_clock() {
        let session = session();
        load_templates(
            &session.engine,
            Cursor::new(
                "id,title,reward,plan_id,duration_seconds,active_date,is_active\n\
                 7,Watch video,25,basic,60,2025-01-01,true\n",
            ),
        )
        .unwrap();
        replay(
            &session,
            Cursor::new(
                "op,account,target,amount,reference,at\n\
                 register,1,,,,2025-01-01T09:00:00Z\n\
                 settle,1,,1000,ps_001,\n\
                 purchase,1,basic,,,\n\
                 start,1,7,,,2025-01-01T09:01:00Z\n\
                 complete,1,7,,,2025-01-01T09:01:30Z\n\
                 complete,1,7,,,2025-01-01T09:02:00Z\n\
                 complete,1,7,,,2025-01-01T09:03:00Z\n",
            ),
        )
        .unwrap();
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(25));
        assert_eq!(account.transactions().len(), 3);
    }

    #[test]
    fn skip_malformed_and_unknown_rows() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,1,,,,\n\
             register,not-a-number,,,,\n\
             teleport,1,,,,\n\
             register,2,,,,\n",
        );
        assert_eq!(session.engine.account_count(), 2);
    }

    #[test]
    fn parse_with_whitespace() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n \
             register , 1 , , , , \n \
             settle , 1 , , 150.5 , ps_001 , \n",
        );
        let account = session.engine.get_account(AccountId(1)).unwrap();
        assert_eq!(account.balance(), dec!(150.5));
    }

    #[test]
    fn write_accounts_to_csv() {
        let session = run_csv(
            "op,account,target,amount,reference,at\n\
             register,2,,,,\n\
             register,1,,,,\n\
             settle,1,,100.255,ps_001,\n",
        );
        let mut output = Vec::new();
        write_accounts(&session, &mut output).unwrap();

        let output = String::from_utf8(output).unwrap();
        let mut lines = output.lines();
        assert_eq!(
            lines.next(),
            Some(
                "account,balance,plan,plan_price,withdrawal_limit,total_withdrawn,\
                 referred_by,transactions"
            )
        );
        assert!(lines.next().unwrap().starts_with("1,100.26,"));
        assert!(lines.next().unwrap().starts_with("2,0.00,"));
    }
}
