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

//! Account state.
//!
//! Each account owns its balance, plan, task progress, withdrawal requests and
//! settled deposit references behind one mutex. Every mutation of those fields
//! happens while that mutex is held, so concurrent triggers on the same
//! account are serialized while different accounts proceed in parallel.
//!
//! Balances only move through [`AccountData::apply`], which takes a committed
//! [`Transaction`]; the balance is therefore always the signed sum of the
//! account's history.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use tiered_ledger_rs::{Account, AccountId};
//!
//! let account = Account::new(AccountId(1), None);
//! assert_eq!(account.balance(), dec!(0));
//! assert!(account.active_plan().is_none());
//! ```

use crate::base::{AccountId, DepositReference, PlanId, TaskTemplateId, WithdrawalId};
use crate::referral::referral_code;
use crate::task::UserTaskStatus;
use crate::transaction::{Direction, Transaction};
use crate::withdrawal::{Withdrawal, WithdrawalStatus};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Plan currently held by an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePlan {
    pub id: PlanId,
    pub name: String,
    /// Catalog price at purchase time; upgrades charge the difference.
    pub price: Decimal,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(crate) struct AccountData {
    pub id: AccountId,
    pub balance: Decimal,
    pub plan: Option<ActivePlan>,
    pub withdrawal_limit: Decimal,
    /// Approved withdrawals since the last plan change.
    pub total_withdrawn: Decimal,
    pub referred_by: Option<AccountId>,
    pub history: Vec<Transaction>,
    pub tasks: HashMap<TaskTemplateId, UserTaskStatus>,
    pub withdrawals: BTreeMap<WithdrawalId, Withdrawal>,
    pub settled_deposits: HashSet<DepositReference>,
}

impl AccountData {
    fn new(id: AccountId, referred_by: Option<AccountId>) -> Self {
        Self {
            id,
            balance: Decimal::ZERO,
            plan: None,
            withdrawal_limit: Decimal::ZERO,
            total_withdrawn: Decimal::ZERO,
            referred_by,
            history: Vec::new(),
            tasks: HashMap::new(),
            withdrawals: BTreeMap::new(),
            settled_deposits: HashSet::new(),
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.balance >= Decimal::ZERO,
            "Invariant violated: balance went negative: {}",
            self.balance
        );
        debug_assert_eq!(
            self.balance,
            self.ledger_sum(),
            "Invariant violated: balance diverged from transaction history"
        );
    }

    pub fn active_plan_id(&self) -> Option<&PlanId> {
        self.plan.as_ref().map(|plan| &plan.id)
    }

    pub fn active_plan_price(&self) -> Decimal {
        self.plan.as_ref().map_or(Decimal::ZERO, |plan| plan.price)
    }

    /// Signed sum of the transaction history.
    pub fn ledger_sum(&self) -> Decimal {
        self.history.iter().map(Transaction::signed_amount).sum()
    }

    /// Applies a committed transaction to the balance and records it.
    ///
    /// Callers validate before committing, so a debit never exceeds the balance.
    pub fn apply(&mut self, transaction: Transaction) {
        debug_assert_eq!(transaction.account_id, self.id);
        match transaction.direction {
            Direction::Credit => self.balance += transaction.amount,
            Direction::Debit => self.balance -= transaction.amount,
        }
        self.history.push(transaction);
        self.assert_invariants();
    }
}

/// Ledger account.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    inner: Mutex<AccountData>,
}

impl Account {
    const DECIMAL_PRECISION: u32 = 2;

    pub fn new(id: AccountId, referred_by: Option<AccountId>) -> Self {
        Self {
            id,
            inner: Mutex::new(AccountData::new(id, referred_by)),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> Decimal {
        self.inner.lock().balance
    }

    pub fn active_plan(&self) -> Option<ActivePlan> {
        self.inner.lock().plan.clone()
    }

    pub fn withdrawal_limit(&self) -> Decimal {
        self.inner.lock().withdrawal_limit
    }

    pub fn total_withdrawn(&self) -> Decimal {
        self.inner.lock().total_withdrawn
    }

    pub fn referred_by(&self) -> Option<AccountId> {
        self.inner.lock().referred_by
    }

    pub fn referral_code(&self) -> String {
        referral_code(self.id)
    }

    /// Committed transactions in commit order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.inner.lock().history.clone()
    }

    pub fn task_status(&self, template: TaskTemplateId) -> Option<UserTaskStatus> {
        self.inner.lock().tasks.get(&template).cloned()
    }

    pub fn withdrawals(&self) -> Vec<Withdrawal> {
        self.inner.lock().withdrawals.values().cloned().collect()
    }

    /// Sum of withdrawal requests awaiting a decision.
    pub fn pending_withdrawals_total(&self) -> Decimal {
        self.inner
            .lock()
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Pending)
            .map(|w| w.amount)
            .sum()
    }

    pub fn settled_deposit_count(&self) -> usize {
        self.inner.lock().settled_deposits.len()
    }

    /// Consistent view of the account at one instant, with the balance
    /// fixed to two decimal places.
    pub fn snapshot(&self) -> AccountSnapshot {
        let data = self.inner.lock();
        let mut balance = data.balance;
        balance.rescale(Self::DECIMAL_PRECISION);
        AccountSnapshot {
            account: data.id,
            balance,
            plan: data.plan.as_ref().map(|plan| plan.id.clone()),
            plan_price: data.plan.as_ref().map(|plan| plan.price),
            withdrawal_limit: data.withdrawal_limit,
            total_withdrawn: data.total_withdrawn,
            referred_by: data.referred_by,
            transactions: data.history.len(),
        }
    }

    /// Compares the balance against the signed sum of the history.
    pub fn audit(&self) -> AuditReport {
        let data = self.inner.lock();
        let (credits, debits) =
            data.history
                .iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(credits, debits), tx| {
                    match tx.direction {
                        Direction::Credit => (credits + tx.amount, debits),
                        Direction::Debit => (credits, debits + tx.amount),
                    }
                });
        AuditReport {
            account: data.id,
            balance: data.balance,
            credits,
            debits,
            consistent: data.balance == credits - debits,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, AccountData> {
        self.inner.lock()
    }
}

/// Serializable account summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSnapshot {
    pub account: AccountId,
    pub balance: Decimal,
    pub plan: Option<PlanId>,
    pub plan_price: Option<Decimal>,
    pub withdrawal_limit: Decimal,
    pub total_withdrawn: Decimal,
    pub referred_by: Option<AccountId>,
    pub transactions: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub account: AccountId,
    pub balance: Decimal,
    pub credits: Decimal,
    pub debits: Decimal,
    pub consistent: bool,
}
