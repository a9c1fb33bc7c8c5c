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

//! Withdrawal requests and admin decisions.
//!
//! A request reserves nothing; the balance is debited when an admin
//! approves it, after the balance and the plan's withdrawal limit are checked
//! again against the state at that moment.

use super::Engine;
use crate::LedgerError;
use crate::account::AccountData;
use crate::base::{AccountId, WithdrawalId};
use crate::roles::Role;
use crate::transaction::{EntryKind, Posting};
use crate::withdrawal::{BankDetails, Withdrawal, WithdrawalStatus};
use rust_decimal::Decimal;
use std::sync::atomic::Ordering;
use tracing::{debug, info};

impl Engine {
    /// Files a pending withdrawal request.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Unknown account.
    /// - [`LedgerError::InvalidAmount`] - Amount not positive.
    /// - [`LedgerError::BelowMinimumWithdrawal`] - Amount under the configured minimum.
    /// - [`LedgerError::InsufficientBalance`] - Balance below the amount.
    /// - [`LedgerError::WithdrawalLimitExceeded`] - Plan limit would be exceeded.
    pub fn request_withdrawal(
        &self,
        account_id: AccountId,
        amount: Decimal,
        bank: BankDetails,
    ) -> Result<Withdrawal, LedgerError> {
        let result = self.file_withdrawal(account_id, amount, bank);
        if let Err(err) = &result {
            debug!(account = %account_id, %amount, %err, "withdrawal request rejected");
        }
        result
    }

    fn file_withdrawal(
        &self,
        account_id: AccountId,
        amount: Decimal,
        bank: BankDetails,
    ) -> Result<Withdrawal, LedgerError> {
        let account = self.account(account_id)?;
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if amount < self.config.minimum_withdrawal {
            return Err(LedgerError::BelowMinimumWithdrawal);
        }

        let mut data = account.lock();
        check_funds(&data, amount)?;

        let withdrawal = Withdrawal {
            id: WithdrawalId(self.next_withdrawal.fetch_add(1, Ordering::SeqCst)),
            account_id,
            amount,
            status: WithdrawalStatus::Pending,
            bank,
            created_at: self.now(),
            decided_at: None,
        };
        data.withdrawals.insert(withdrawal.id, withdrawal.clone());
        self.withdrawal_owners.insert(withdrawal.id, account_id);

        info!(account = %account_id, withdrawal = %withdrawal.id, %amount, "withdrawal requested");
        Ok(withdrawal)
    }

    /// Approves a pending request and debits the account. Requires
    /// [`Role::Admin`].
    ///
    /// Approving an already approved request returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Forbidden`] - Actor is not an admin.
    /// - [`LedgerError::WithdrawalNotFound`] - Unknown request.
    /// - [`LedgerError::WithdrawalFinalized`] - Request was rejected.
    /// - [`LedgerError::InsufficientBalance`] - Balance dropped below the amount.
    /// - [`LedgerError::WithdrawalLimitExceeded`] - Plan limit would be exceeded.
    /// - [`LedgerError::StoreUnavailable`] - Journal rejected the debit.
    pub fn approve_withdrawal(
        &self,
        actor: AccountId,
        id: WithdrawalId,
    ) -> Result<Withdrawal, LedgerError> {
        let result = self.decide(actor, id, WithdrawalStatus::Approved);
        if let Err(err) = &result {
            debug!(admin = %actor, withdrawal = %id, %err, "withdrawal approval rejected");
        }
        result
    }

    /// Rejects a pending request. No ledger entry is written. Requires
    /// [`Role::Admin`].
    ///
    /// Rejecting an already rejected request returns it unchanged.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Forbidden`] - Actor is not an admin.
    /// - [`LedgerError::WithdrawalNotFound`] - Unknown request.
    /// - [`LedgerError::WithdrawalFinalized`] - Request was approved.
    pub fn reject_withdrawal(
        &self,
        actor: AccountId,
        id: WithdrawalId,
    ) -> Result<Withdrawal, LedgerError> {
        let result = self.decide(actor, id, WithdrawalStatus::Rejected);
        if let Err(err) = &result {
            debug!(admin = %actor, withdrawal = %id, %err, "withdrawal rejection refused");
        }
        result
    }

    fn decide(
        &self,
        actor: AccountId,
        id: WithdrawalId,
        decision: WithdrawalStatus,
    ) -> Result<Withdrawal, LedgerError> {
        self.roles.require(actor, Role::Admin)?;
        let owner = self
            .withdrawal_owners
            .get(&id)
            .map(|entry| *entry.value())
            .ok_or(LedgerError::WithdrawalNotFound)?;
        let account = self.account(owner)?;
        let mut data = account.lock();

        let withdrawal = data
            .withdrawals
            .get(&id)
            .cloned()
            .ok_or(LedgerError::WithdrawalNotFound)?;
        if withdrawal.status == decision {
            return Ok(withdrawal);
        }
        if withdrawal.status.is_terminal() {
            return Err(LedgerError::WithdrawalFinalized);
        }

        let now = self.now();
        if decision == WithdrawalStatus::Approved {
            check_funds(&data, withdrawal.amount)?;
            let posting = Posting::debit(
                owner,
                EntryKind::Withdrawal,
                withdrawal.amount,
                format!("Withdrawal to {}", withdrawal.bank.bank_name),
            );
            for tx in self.commit(vec![posting], now)? {
                data.apply(tx);
            }
            data.total_withdrawn += withdrawal.amount;
        }

        let Some(entry) = data.withdrawals.get_mut(&id) else {
            return Err(LedgerError::WithdrawalNotFound);
        };
        entry.status = decision;
        entry.decided_at = Some(now);
        let decided = entry.clone();

        info!(
            admin = %actor,
            account = %owner,
            withdrawal = %id,
            amount = %decided.amount,
            status = ?decided.status,
            "withdrawal decided"
        );
        Ok(decided)
    }

    /// Withdrawal requests of an account, oldest first.
    pub fn withdrawals(&self, account_id: AccountId) -> Result<Vec<Withdrawal>, LedgerError> {
        Ok(self.account(account_id)?.withdrawals())
    }

    /// Every pending request across accounts, oldest first.
    pub fn pending_withdrawals(&self) -> Vec<Withdrawal> {
        let mut pending: Vec<Withdrawal> = self
            .accounts()
            .iter()
            .flat_map(|account| account.withdrawals())
            .filter(|withdrawal| withdrawal.status == WithdrawalStatus::Pending)
            .collect();
        pending.sort_by_key(|withdrawal| withdrawal.id);
        pending
    }
}

/// Balance and plan limit checks shared by request and approval.
fn check_funds(data: &AccountData, amount: Decimal) -> Result<(), LedgerError> {
    if data.balance < amount {
        return Err(LedgerError::InsufficientBalance);
    }
    if data.total_withdrawn + amount > data.withdrawal_limit {
        return Err(LedgerError::WithdrawalLimitExceeded);
    }
    Ok(())
}
