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

//! Engine public API integration tests.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiered_ledger_rs::{
    AccountId, AccountSnapshot, BankDetails, DepositReference, DepositStatus, Direction, Engine,
    EngineConfig, EntryKind, Journal, LedgerError, ManualClock, MemoryJournal, PaymentConfirmation,
    PlanId, Role, SettlementOutcome, TaskState, TaskTemplate, TaskTemplateId, Transaction,
    WithdrawalStatus,
};

const ADMIN: AccountId = AccountId(100);

fn start_time() -> DateTime<Utc> {
    "2025-03-10T09:00:00Z".parse().unwrap()
}

fn today() -> NaiveDate {
    start_time().date_naive()
}

fn engine_with_clock(config: EngineConfig) -> (Engine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let engine = Engine::builder().config(config).clock(clock.clone()).build();
    engine.roles().grant(ADMIN, Role::Admin);
    (engine, clock)
}

fn register(engine: &Engine, id: u32) -> AccountId {
    engine.register_account(AccountId(id), None).unwrap();
    AccountId(id)
}

fn deposit(engine: &Engine, account: AccountId, reference: &str, amount: Decimal) {
    let outcome = engine
        .settle_deposit(&DepositReference::new(reference), amount, account)
        .unwrap();
    assert!(matches!(outcome, SettlementOutcome::Settled { .. }));
}

fn template(id: u32, plan: &str, reward: Decimal, duration_seconds: u32) -> TaskTemplate {
    TaskTemplate {
        id: TaskTemplateId(id),
        title: format!("Task {id}"),
        reward,
        plan_id: PlanId::new(plan),
        duration_seconds,
        active_date: today(),
        is_active: true,
    }
}

fn bank() -> BankDetails {
    BankDetails {
        bank_name: "Access Bank".into(),
        account_number: "0001112223".into(),
        account_name: "Tolu Ade".into(),
    }
}

fn snapshot(engine: &Engine, id: AccountId) -> AccountSnapshot {
    engine.get_account(id).unwrap().snapshot()
}

fn assert_consistent(engine: &Engine, id: AccountId) {
    let report = engine.audit(id).unwrap();
    assert!(report.consistent, "ledger diverged: {report:?}");
    assert!(report.balance >= Decimal::ZERO);
}

// === Plan lifecycle ===

#[test]
fn purchase_debits_price_and_sets_plan() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(6000));

    let change = engine.purchase_or_upgrade(id, &PlanId::new("premium")).unwrap();
    assert_eq!(change.charged, dec!(5000));

    let account = engine.get_account(id).unwrap();
    assert_eq!(account.balance(), dec!(1000));
    assert_eq!(account.active_plan().unwrap().id, PlanId::new("premium"));

    let debits: Vec<_> = account
        .transactions()
        .into_iter()
        .filter(|tx| tx.direction == Direction::Debit)
        .collect();
    assert_eq!(debits.len(), 1);
    assert_eq!(debits[0].amount, dec!(5000));
    assert_eq!(debits[0].kind, EntryKind::PlanPurchase);
    assert_consistent(&engine, id);
}

#[test]
fn upgrade_without_funds_keeps_current_plan() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(6000));
    engine.purchase_or_upgrade(id, &PlanId::new("premium")).unwrap();

    let before = snapshot(&engine, id);
    let result = engine.purchase_or_upgrade(id, &PlanId::new("pro"));
    assert_eq!(result, Err(LedgerError::InsufficientBalance));
    assert_eq!(snapshot(&engine, id), before);
    assert_eq!(before.plan, Some(PlanId::new("premium")));
}

#[test]
fn upgrade_charges_delta_and_resets_withdrawn() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(12000));
    engine.purchase_or_upgrade(id, &PlanId::new("premium")).unwrap();

    let request = engine.request_withdrawal(id, dec!(1000), bank()).unwrap();
    engine.approve_withdrawal(ADMIN, request.id).unwrap();
    assert_eq!(engine.get_account(id).unwrap().total_withdrawn(), dec!(1000));

    // 12000 - 5000 - 1000 = 6000, upgrade delta is 5000
    let change = engine.purchase_or_upgrade(id, &PlanId::new("pro")).unwrap();
    assert_eq!(change.charged, dec!(5000));
    assert_eq!(change.previous, Some(PlanId::new("premium")));

    let account = engine.get_account(id).unwrap();
    assert_eq!(account.balance(), dec!(1000));
    assert_eq!(account.withdrawal_limit(), dec!(20000));
    assert_eq!(account.total_withdrawn(), dec!(0));
    let last = account.transactions().pop().unwrap();
    assert_eq!(last.kind, EntryKind::PlanUpgrade);
    assert_eq!(last.description, "Investment plan upgrade - Premium to Pro");
    assert_consistent(&engine, id);
}

#[test]
fn downgrade_and_repurchase_are_rejected_without_mutation() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(20000));
    engine.purchase_or_upgrade(id, &PlanId::new("pro")).unwrap();
    let before = snapshot(&engine, id);

    assert_eq!(
        engine.purchase_or_upgrade(id, &PlanId::new("pro")),
        Err(LedgerError::AlreadyOwned)
    );
    assert_eq!(
        engine.purchase_or_upgrade(id, &PlanId::new("basic")),
        Err(LedgerError::UpgradeOnly)
    );
    assert_eq!(
        engine.purchase_or_upgrade(id, &PlanId::new("premium")),
        Err(LedgerError::UpgradeOnly)
    );
    assert_eq!(snapshot(&engine, id), before);
}

#[test]
fn purchase_for_unknown_account_or_plan() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    assert_eq!(
        engine.purchase_or_upgrade(AccountId(9), &PlanId::new("basic")),
        Err(LedgerError::AccountNotFound)
    );
    assert_eq!(
        engine.purchase_or_upgrade(id, &PlanId::new("gold")),
        Err(LedgerError::PlanNotFound)
    );
}

// === Task rewards ===

#[test]
fn task_reward_credited_once_after_duration() {
    let (engine, clock) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1000));
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(200), 30))
        .unwrap();

    engine.start_task(id, TaskTemplateId(1)).unwrap();
    clock.advance(Duration::seconds(10));
    assert_eq!(
        engine.complete_task(id, TaskTemplateId(1)),
        Err(LedgerError::TooEarly)
    );
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(0));

    clock.advance(Duration::seconds(21));
    let completion = engine.complete_task(id, TaskTemplateId(1)).unwrap();
    assert_eq!(completion.reward, dec!(200));
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(200));

    assert_eq!(
        engine.complete_task(id, TaskTemplateId(1)),
        Err(LedgerError::AlreadyCompleted)
    );
    assert_eq!(
        engine.start_task(id, TaskTemplateId(1)),
        Err(LedgerError::AlreadyCompleted)
    );
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(200));
    assert_consistent(&engine, id);
}

#[test]
fn task_start_requires_matching_plan_and_day() {
    let (engine, clock) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1000));
    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(50), 0))
        .unwrap();
    engine
        .upsert_template(ADMIN, template(2, "premium", dec!(50), 0))
        .unwrap();

    // No plan yet
    assert_eq!(
        engine.start_task(id, TaskTemplateId(1)),
        Err(LedgerError::NotEligible)
    );

    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    assert_eq!(
        engine.start_task(id, TaskTemplateId(2)),
        Err(LedgerError::NotEligible)
    );
    engine.start_task(id, TaskTemplateId(1)).unwrap();
    assert_eq!(
        engine.start_task(id, TaskTemplateId(1)),
        Err(LedgerError::AlreadyStarted)
    );

    // Next day the template is no longer offered
    clock.advance(Duration::days(1));
    assert!(engine.available_tasks(id).unwrap().is_empty());
}

#[test]
fn complete_without_start_is_rejected() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(50), 0))
        .unwrap();
    assert_eq!(
        engine.complete_task(id, TaskTemplateId(1)),
        Err(LedgerError::NotStarted)
    );
    assert_eq!(
        engine.complete_task(id, TaskTemplateId(2)),
        Err(LedgerError::TaskNotFound)
    );
}

#[test]
fn available_tasks_report_progress() {
    let (engine, clock) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1000));
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    for task in 1..=3 {
        engine
            .upsert_template(ADMIN, template(task, "basic", dec!(10), 5))
            .unwrap();
    }

    engine.start_task(id, TaskTemplateId(1)).unwrap();
    engine.start_task(id, TaskTemplateId(2)).unwrap();
    clock.advance(Duration::seconds(5));
    engine.complete_task(id, TaskTemplateId(2)).unwrap();

    let states: Vec<_> = engine
        .available_tasks(id)
        .unwrap()
        .into_iter()
        .map(|view| (view.template.id.0, view.state))
        .collect();
    assert_eq!(
        states,
        [
            (1, TaskState::Started),
            (2, TaskState::Completed),
            (3, TaskState::NotStarted),
        ]
    );
}

#[test]
fn expired_start_must_be_restarted() {
    let config = EngineConfig {
        task_start_expiry_factor: Some(2),
        ..EngineConfig::default()
    };
    let (engine, clock) = engine_with_clock(config);
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1000));
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(40), 60))
        .unwrap();

    let first = engine.start_task(id, TaskTemplateId(1)).unwrap();
    clock.advance(Duration::seconds(121));
    assert_eq!(
        engine.complete_task(id, TaskTemplateId(1)),
        Err(LedgerError::StartExpired)
    );

    let second = engine.start_task(id, TaskTemplateId(1)).unwrap();
    assert!(second.started_at > first.started_at);
    clock.advance(Duration::seconds(60));
    engine.complete_task(id, TaskTemplateId(1)).unwrap();
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(40));
}

#[test]
fn extreme_expiry_factors_still_allow_completion() {
    for factor in [0, 3, i32::MAX as u32 + 1, u32::MAX] {
        let config = EngineConfig {
            task_start_expiry_factor: Some(factor),
            ..EngineConfig::default()
        };
        let (engine, clock) = engine_with_clock(config);
        let id = register(&engine, 1);
        deposit(&engine, id, "R0", dec!(1000));
        engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
        engine
            .upsert_template(ADMIN, template(1, "basic", dec!(15), 30))
            .unwrap();

        engine.start_task(id, TaskTemplateId(1)).unwrap();
        clock.advance(Duration::seconds(31));
        let completion = engine.complete_task(id, TaskTemplateId(1));
        assert!(completion.is_ok(), "factor {factor}: {completion:?}");
    }
}

#[test]
fn template_management_requires_admin() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let member = register(&engine, 1);
    assert_eq!(
        engine.upsert_template(member, template(1, "basic", dec!(10), 0)),
        Err(LedgerError::Forbidden)
    );
    assert_eq!(
        engine.upsert_template(ADMIN, template(1, "basic", dec!(0), 0)),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.upsert_template(ADMIN, template(1, "gold", dec!(10), 0)),
        Err(LedgerError::PlanNotFound)
    );

    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(10), 0))
        .unwrap();
    assert_eq!(engine.tasks().len(), 1);
    engine.remove_template(ADMIN, TaskTemplateId(1)).unwrap();
    assert_eq!(
        engine.remove_template(ADMIN, TaskTemplateId(1)),
        Err(LedgerError::TaskNotFound)
    );
}

// === Deposits and referrals ===

#[test]
fn redelivered_confirmation_credits_once() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    let confirmation = PaymentConfirmation {
        reference: DepositReference::new("R1"),
        amount: dec!(5000),
        payer_account_id: id,
        status: "success".into(),
    };

    let first = engine.confirm_payment(&confirmation).unwrap();
    assert!(matches!(first, SettlementOutcome::Settled { .. }));
    let second = engine.confirm_payment(&confirmation).unwrap();
    assert_eq!(second, SettlementOutcome::AlreadySettled);

    let account = engine.get_account(id).unwrap();
    assert_eq!(account.balance(), dec!(5000));
    assert_eq!(account.transactions().len(), 1);
    assert_eq!(
        engine.settle_deposit(&DepositReference::new("R1"), dec!(5000), id),
        Err(LedgerError::DuplicateSettlement)
    );
}

#[test]
fn unsuccessful_confirmation_is_ignored() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    let confirmation = PaymentConfirmation::from_minor_units(
        DepositReference::new("R1"),
        500_000,
        id,
        "abandoned",
    );
    assert_eq!(
        engine.confirm_payment(&confirmation).unwrap(),
        SettlementOutcome::Ignored
    );
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(0));
}

#[test]
fn first_deposit_pays_referral_bonuses_once() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let referrer = register(&engine, 1);
    let code = engine.get_account(referrer).unwrap().referral_code();
    let referred = engine.register_account(AccountId(2), Some(&code)).unwrap().id();

    let outcome = engine
        .settle_deposit(&DepositReference::new("R1"), dec!(5000), referred)
        .unwrap();
    assert!(matches!(
        outcome,
        SettlementOutcome::Settled {
            referral_bonus_awarded: true,
            ..
        }
    ));
    assert_eq!(engine.get_account(referrer).unwrap().balance(), dec!(500));
    assert_eq!(engine.get_account(referred).unwrap().balance(), dec!(5250));

    let referral = engine.referral(referred).unwrap();
    assert!(referral.first_deposit_bonus_awarded);
    assert_eq!(referral.first_deposit_amount, Some(dec!(5000)));

    deposit(&engine, referred, "R2", dec!(5000));
    assert_eq!(engine.get_account(referrer).unwrap().balance(), dec!(500));
    assert_eq!(engine.get_account(referred).unwrap().balance(), dec!(10250));

    let summary = engine.referral_summary(referrer).unwrap();
    assert_eq!(summary.referrals, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.bonus_earned, dec!(500));
    assert_consistent(&engine, referrer);
    assert_consistent(&engine, referred);
}

#[test]
fn bonus_rates_come_from_config() {
    let config = EngineConfig {
        referrer_bonus_rate: dec!(0.2),
        referred_bonus_rate: dec!(0),
        ..EngineConfig::default()
    };
    let (engine, _) = engine_with_clock(config);
    register(&engine, 1);
    let referred = engine
        .register_account(AccountId(2), Some("REF000001"))
        .unwrap()
        .id();

    deposit(&engine, referred, "R1", dec!(333.33));
    assert_eq!(engine.get_account(AccountId(1)).unwrap().balance(), dec!(66.67));
    // No zero-amount welcome entry
    assert_eq!(engine.transactions(referred).unwrap().len(), 1);
}

#[test]
fn initiated_deposit_settles_with_gateway_amount() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    let other = register(&engine, 2);
    let reference = DepositReference::new("R1");

    assert_eq!(
        engine.initiate_deposit(id, reference.clone(), dec!(50)),
        Err(LedgerError::BelowMinimumDeposit)
    );
    engine.initiate_deposit(id, reference.clone(), dec!(1000)).unwrap();
    assert_eq!(
        engine.initiate_deposit(id, reference.clone(), dec!(1000)),
        Err(LedgerError::DuplicateDeposit)
    );
    assert_eq!(
        engine.settle_deposit(&reference, dec!(1000), other),
        Err(LedgerError::DepositMismatch)
    );

    engine.settle_deposit(&reference, dec!(999.50), id).unwrap();
    let record = engine.deposit(&reference).unwrap();
    assert_eq!(record.amount, dec!(999.50));
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(999.50));
    assert_eq!(engine.get_account(other).unwrap().balance(), dec!(0));
}

#[test]
fn registration_rejects_bad_referral_codes() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    register(&engine, 1);
    assert_eq!(
        engine.register_account(AccountId(2), Some("NOPE")).err(),
        Some(LedgerError::UnknownReferralCode)
    );
    assert_eq!(
        engine.register_account(AccountId(1), Some("REF000001")).err(),
        Some(LedgerError::UnknownReferralCode)
    );
    assert_eq!(engine.account_count(), 1);
}

// === Withdrawals ===

#[test]
fn withdrawal_debits_only_on_approval() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(6000));
    engine.purchase_or_upgrade(id, &PlanId::new("premium")).unwrap();

    let request = engine.request_withdrawal(id, dec!(600), bank()).unwrap();
    assert_eq!(engine.get_account(id).unwrap().balance(), dec!(1000));
    assert_eq!(engine.pending_withdrawals().len(), 1);

    let approved = engine.approve_withdrawal(ADMIN, request.id).unwrap();
    assert_eq!(approved.status, WithdrawalStatus::Approved);
    assert!(approved.decided_at.is_some());

    // Re-approval is a no-op
    engine.approve_withdrawal(ADMIN, request.id).unwrap();
    let account = engine.get_account(id).unwrap();
    assert_eq!(account.balance(), dec!(400));
    assert_eq!(account.total_withdrawn(), dec!(600));
    assert!(engine.pending_withdrawals().is_empty());
    assert_eq!(
        engine.reject_withdrawal(ADMIN, request.id),
        Err(LedgerError::WithdrawalFinalized)
    );
    assert_consistent(&engine, id);
}

#[test]
fn withdrawal_validation_order() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1500));
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();

    assert_eq!(
        engine.request_withdrawal(id, dec!(0), bank()),
        Err(LedgerError::InvalidAmount)
    );
    assert_eq!(
        engine.request_withdrawal(id, dec!(99.99), bank()),
        Err(LedgerError::BelowMinimumWithdrawal)
    );
    assert_eq!(
        engine.request_withdrawal(id, dec!(501), bank()),
        Err(LedgerError::InsufficientBalance)
    );
    assert!(engine.withdrawals(id).unwrap().is_empty());
    engine.request_withdrawal(id, dec!(500), bank()).unwrap();
}

#[test]
fn unknown_withdrawal_is_reported() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    assert_eq!(
        engine.approve_withdrawal(ADMIN, tiered_ledger_rs::WithdrawalId(42)),
        Err(LedgerError::WithdrawalNotFound)
    );
}

// === Ledger invariants ===

#[test]
fn rejected_operations_leave_state_unchanged() {
    let (engine, clock) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    deposit(&engine, id, "R0", dec!(1200));
    engine.purchase_or_upgrade(id, &PlanId::new("basic")).unwrap();
    engine
        .upsert_template(ADMIN, template(1, "basic", dec!(25), 60))
        .unwrap();
    engine.start_task(id, TaskTemplateId(1)).unwrap();
    clock.advance(Duration::seconds(1));

    let before = snapshot(&engine, id);
    let history = engine.transactions(id).unwrap();

    let rejections = [
        engine.purchase_or_upgrade(id, &PlanId::new("basic")).err(),
        engine.purchase_or_upgrade(id, &PlanId::new("royal")).err(),
        engine.complete_task(id, TaskTemplateId(1)).err(),
        engine.request_withdrawal(id, dec!(5000), bank()).err(),
        engine.settle_deposit(&DepositReference::new("R0"), dec!(1200), id).err(),
    ];
    assert!(rejections.iter().all(Option::is_some));

    assert_eq!(snapshot(&engine, id), before);
    assert_eq!(engine.transactions(id).unwrap(), history);
}

#[test]
fn transaction_ids_are_unique_and_ordered() {
    let (engine, _) = engine_with_clock(EngineConfig::default());
    let id = register(&engine, 1);
    for n in 0..5 {
        deposit(&engine, id, &format!("R{n}"), dec!(100));
    }
    let ids: Vec<_> = engine
        .transactions(id)
        .unwrap()
        .iter()
        .map(|tx| tx.id.0)
        .collect();
    assert_eq!(ids, [1, 2, 3, 4, 5]);
}

/// Journal that fails every append while `down` is set.
#[derive(Default)]
struct FlakyJournal {
    down: AtomicBool,
    inner: MemoryJournal,
}

impl Journal for FlakyJournal {
    fn append(&self, batch: &[Transaction]) -> Result<(), LedgerError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(LedgerError::StoreUnavailable("journal offline".into()));
        }
        self.inner.append(batch)
    }
}

#[test]
fn store_failure_applies_nothing_and_is_retryable() {
    let journal = Arc::new(FlakyJournal::default());
    let engine = Engine::builder().journal(journal.clone()).build();
    let referrer = register(&engine, 1);
    let code = engine.get_account(referrer).unwrap().referral_code();
    let referred = engine.register_account(AccountId(2), Some(&code)).unwrap().id();

    journal.down.store(true, Ordering::SeqCst);
    let err = engine
        .settle_deposit(&DepositReference::new("R1"), dec!(1000), referred)
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(engine.get_account(referred).unwrap().balance(), dec!(0));
    assert_eq!(engine.get_account(referrer).unwrap().balance(), dec!(0));
    assert!(!engine.referral(referred).unwrap().first_deposit_bonus_awarded);
    assert!(engine.deposit(&DepositReference::new("R1")).is_none());

    let initiated = DepositReference::new("R2");
    engine
        .initiate_deposit(referrer, initiated.clone(), dec!(300))
        .unwrap();
    assert!(engine.settle_deposit(&initiated, dec!(300), referrer).is_err());
    assert_eq!(
        engine.deposit(&initiated).unwrap().status,
        DepositStatus::Pending
    );

    journal.down.store(false, Ordering::SeqCst);
    deposit(&engine, referred, "R1", dec!(1000));
    assert_eq!(engine.get_account(referred).unwrap().balance(), dec!(1050));
    assert_eq!(engine.get_account(referrer).unwrap().balance(), dec!(100));
    deposit(&engine, referrer, "R2", dec!(300));
    assert_eq!(engine.get_account(referrer).unwrap().balance(), dec!(400));
}
