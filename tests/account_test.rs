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

//! Account public API integration tests.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::thread;
use tiered_ledger_rs::{
    Account, AccountId, BankDetails, DepositReference, Engine, PlanId, Role, TaskTemplate,
    TaskTemplateId,
};

// === Helper Functions ===

fn funded_engine(amount: Decimal) -> Engine {
    let engine = Engine::new();
    engine.register_account(AccountId(1), None).unwrap();
    engine
        .settle_deposit(&DepositReference::new("seed"), amount, AccountId(1))
        .unwrap();
    engine
}

fn bank() -> BankDetails {
    BankDetails {
        bank_name: "GTBank".into(),
        account_number: "0212345678".into(),
        account_name: "Chidi Okafor".into(),
    }
}

// === Construction ===

#[test]
fn new_account_is_empty() {
    let account = Account::new(AccountId(5), None);
    assert_eq!(account.id(), AccountId(5));
    assert_eq!(account.balance(), Decimal::ZERO);
    assert_eq!(account.withdrawal_limit(), Decimal::ZERO);
    assert_eq!(account.total_withdrawn(), Decimal::ZERO);
    assert!(account.active_plan().is_none());
    assert!(account.referred_by().is_none());
    assert!(account.transactions().is_empty());
    assert!(account.withdrawals().is_empty());
    assert_eq!(account.settled_deposit_count(), 0);
}

#[test]
fn referral_code_is_zero_padded() {
    assert_eq!(Account::new(AccountId(42), None).referral_code(), "REF000042");
    assert_eq!(
        Account::new(AccountId(1_234_567), None).referral_code(),
        "REF1234567"
    );
}

// === Read Models ===

#[test]
fn active_plan_records_price_paid() {
    let engine = funded_engine(dec!(12000));
    engine
        .purchase_or_upgrade(AccountId(1), &PlanId::new("premium"))
        .unwrap();

    let plan = engine.get_account(AccountId(1)).unwrap().active_plan().unwrap();
    assert_eq!(plan.id, PlanId::new("premium"));
    assert_eq!(plan.name, "Premium");
    assert_eq!(plan.price, dec!(5000));
}

#[test]
fn pending_withdrawals_are_totalled() {
    let engine = funded_engine(dec!(6000));
    let id = AccountId(1);
    engine.purchase_or_upgrade(id, &PlanId::new("premium")).unwrap();
    engine.request_withdrawal(id, dec!(300), bank()).unwrap();
    engine.request_withdrawal(id, dec!(200), bank()).unwrap();

    let account = engine.get_account(id).unwrap();
    assert_eq!(account.pending_withdrawals_total(), dec!(500));
    assert_eq!(account.withdrawals().len(), 2);
    // Requests do not touch the balance
    assert_eq!(account.balance(), dec!(1000));
}

#[test]
fn task_status_tracks_start_and_completion() {
    let engine = funded_engine(dec!(1000));
    let id = AccountId(1);
    let admin = AccountId(2);
    engine.roles().grant(admin, Role::Admin);
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    engine
        .upsert_template(
            admin,
            TaskTemplate {
                id: TaskTemplateId(3),
                title: "Share post".into(),
                reward: dec!(15),
                plan_id: PlanId::new("basic"),
                duration_seconds: 0,
                active_date: chrono::Utc::now().date_naive(),
                is_active: true,
            },
        )
        .unwrap();

    let account = engine.get_account(id).unwrap();
    assert!(account.task_status(TaskTemplateId(3)).is_none());

    engine.start_task(id, TaskTemplateId(3)).unwrap();
    let started = account.task_status(TaskTemplateId(3)).unwrap();
    assert!(!started.completed);
    assert!(started.completed_at.is_none());

    engine.complete_task(id, TaskTemplateId(3)).unwrap();
    let done = account.task_status(TaskTemplateId(3)).unwrap();
    assert!(done.completed);
    assert_eq!(done.started_at, started.started_at);
    assert!(done.completed_at.is_some());
}

#[test]
fn audit_splits_credits_and_debits() {
    let engine = funded_engine(dec!(1500));
    engine
        .purchase_or_upgrade(AccountId(1), &PlanId::new("basic"))
        .unwrap();

    let report = engine.audit(AccountId(1)).unwrap();
    assert_eq!(report.credits, dec!(1500));
    assert_eq!(report.debits, dec!(1000));
    assert_eq!(report.balance, dec!(500));
    assert!(report.consistent);
}

#[test]
fn snapshot_serializes_to_json() {
    let engine = funded_engine(dec!(1500.5));
    engine
        .purchase_or_upgrade(AccountId(1), &PlanId::new("basic"))
        .unwrap();

    let json = serde_json::to_value(engine.get_account(AccountId(1)).unwrap().snapshot()).unwrap();
    assert_eq!(json["account"], 1);
    assert_eq!(json["balance"], "500.50");
    assert_eq!(json["plan"], "basic");
    assert_eq!(json["withdrawal_limit"], "1500");
    assert_eq!(json["transactions"], 2);
}

#[test]
fn settled_references_are_counted() {
    let engine = funded_engine(dec!(100));
    engine
        .settle_deposit(&DepositReference::new("second"), dec!(100), AccountId(1))
        .unwrap();
    let account = engine.get_account(AccountId(1)).unwrap();
    assert_eq!(account.settled_deposit_count(), 2);
}

// === Concurrency ===

#[test]
fn concurrent_reads_see_consistent_snapshots() {
    let engine = Arc::new(funded_engine(dec!(0.01)));
    let account = engine.get_account(AccountId(1)).unwrap();

    let writer = {
        let engine = Arc::clone(&engine);
        thread::spawn(move || {
            for n in 0..200 {
                engine
                    .settle_deposit(&DepositReference::new(format!("D{n}")), dec!(1), AccountId(1))
                    .unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let account = Arc::clone(&account);
            thread::spawn(move || {
                for _ in 0..200 {
                    let report = account.audit();
                    assert!(report.consistent);
                    let snapshot = account.snapshot();
                    assert_eq!(
                        Decimal::from(snapshot.transactions as u64 - 1) + dec!(0.01),
                        snapshot.balance
                    );
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(account.balance(), dec!(200.01));
}
