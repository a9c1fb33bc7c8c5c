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

//! Deposit initiation, settlement and referral bonuses.
//!
//! Settlement is idempotent per reference: with the payer locked, the
//! reference is claimed in the engine-wide deposit map (`Settling`) before
//! anything is committed, and the claim becomes `Settled` or is released in
//! the same critical section. When the payer was referred, the referrer is
//! locked too and the deposit credit plus both bonuses go to the journal as
//! one batch.

use super::{Engine, lock_pair};
use crate::LedgerError;
use crate::account::AccountData;
use crate::base::{AccountId, DepositReference};
use crate::deposit::{DepositRecord, DepositStatus, PaymentConfirmation, SettlementOutcome};
use crate::referral::ReferralSummary;
use crate::transaction::{EntryKind, Posting};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use rust_decimal::Decimal;
use tracing::{debug, info};

const BONUS_PRECISION: u32 = 2;

impl Engine {
    /// Records a pending deposit before the payer is sent to the gateway.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::AccountNotFound`] - Unknown account.
    /// - [`LedgerError::BelowMinimumDeposit`] - Amount under the configured minimum.
    /// - [`LedgerError::DuplicateDeposit`] - Reference already used.
    pub fn initiate_deposit(
        &self,
        account_id: AccountId,
        reference: DepositReference,
        amount: Decimal,
    ) -> Result<DepositRecord, LedgerError> {
        self.account(account_id)?;
        if amount < self.config.minimum_deposit {
            return Err(LedgerError::BelowMinimumDeposit);
        }
        match self.deposits.entry(reference.clone()) {
            Entry::Occupied(_) => Err(LedgerError::DuplicateDeposit),
            Entry::Vacant(entry) => {
                let record = DepositRecord {
                    reference,
                    account_id,
                    amount,
                    status: DepositStatus::Pending,
                    created_at: self.now(),
                    settled_at: None,
                };
                entry.insert(record.clone());
                debug!(
                    account = %account_id,
                    reference = %record.reference,
                    %amount,
                    "deposit initiated"
                );
                Ok(record)
            }
        }
    }

    /// Entry point for gateway confirmations.
    ///
    /// Only the `"success"` status settles; redeliveries of a settled
    /// reference report [`SettlementOutcome::AlreadySettled`].
    pub fn confirm_payment(
        &self,
        confirmation: &PaymentConfirmation,
    ) -> Result<SettlementOutcome, LedgerError> {
        if !confirmation.is_success() {
            debug!(
                reference = %confirmation.reference,
                status = %confirmation.status,
                "payment confirmation ignored"
            );
            return Ok(SettlementOutcome::Ignored);
        }
        match self.settle_deposit(
            &confirmation.reference,
            confirmation.amount,
            confirmation.payer_account_id,
        ) {
            Err(err) if err.is_noop() => Ok(SettlementOutcome::AlreadySettled),
            other => other,
        }
    }

    /// Credits a confirmed deposit and, on the payer's first settled deposit,
    /// the referral bonuses.
    ///
    /// The gateway's amount is authoritative; an initiated record is updated to
    /// it. Unknown references are recorded as they settle.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount not positive.
    /// - [`LedgerError::AccountNotFound`] - Unknown payer.
    /// - [`LedgerError::DepositMismatch`] - Reference initiated by another account.
    /// - [`LedgerError::DuplicateSettlement`] - Reference already settled (no-op).
    /// - [`LedgerError::StoreUnavailable`] - Journal rejected the batch; safe to retry.
    pub fn settle_deposit(
        &self,
        reference: &DepositReference,
        amount: Decimal,
        payer: AccountId,
    ) -> Result<SettlementOutcome, LedgerError> {
        let result = self.settle(reference, amount, payer);
        if let Err(err) = &result {
            debug!(account = %payer, %reference, %err, "deposit settlement rejected");
        }
        result
    }

    fn settle(
        &self,
        reference: &DepositReference,
        amount: Decimal,
        payer: AccountId,
    ) -> Result<SettlementOutcome, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }

        let account = self.account(payer)?;
        // `referred_by` is fixed at registration.
        let referrer = account.referred_by().and_then(|id| self.get_account(id));

        match referrer {
            Some(referrer) => {
                let (mut data, mut referrer_data) = lock_pair(&account, &referrer);
                self.settle_locked(reference, amount, &mut data, Some(&mut *referrer_data))
            }
            None => {
                let mut data = account.lock();
                self.settle_locked(reference, amount, &mut data, None)
            }
        }
    }

    fn settle_locked(
        &self,
        reference: &DepositReference,
        amount: Decimal,
        data: &mut AccountData,
        referrer: Option<&mut AccountData>,
    ) -> Result<SettlementOutcome, LedgerError> {
        let payer = data.id;
        let now = self.now();
        let pending = self.claim(reference, payer, amount, now)?;
        let first_deposit = data.settled_deposits.is_empty();

        let mut postings = vec![Posting::credit(
            payer,
            EntryKind::Deposit,
            amount,
            format!("Deposit via payment gateway - {reference}"),
        )];

        let bonus_due = first_deposit
            && referrer.is_some()
            && self
                .referrals
                .get(&payer)
                .is_some_and(|referral| !referral.first_deposit_bonus_awarded);

        if let (true, Some(referrer)) = (bonus_due, referrer.as_deref()) {
            let referrer_bonus =
                (amount * self.config.referrer_bonus_rate).round_dp(BONUS_PRECISION);
            let referred_bonus =
                (amount * self.config.referred_bonus_rate).round_dp(BONUS_PRECISION);
            if referrer_bonus > Decimal::ZERO {
                postings.push(Posting::credit(
                    referrer.id,
                    EntryKind::ReferrerBonus,
                    referrer_bonus,
                    format!("Referral bonus - first deposit of account {payer}"),
                ));
            }
            if referred_bonus > Decimal::ZERO {
                postings.push(Posting::credit(
                    payer,
                    EntryKind::ReferredBonus,
                    referred_bonus,
                    "Welcome bonus - first deposit".to_string(),
                ));
            }
        }

        let committed = match self.commit(postings, now) {
            Ok(committed) => committed,
            Err(err) => {
                self.release(reference, pending);
                return Err(err);
            }
        };
        let deposit_tx = committed[0].id;

        let mut referrer = referrer;
        for tx in committed {
            if tx.account_id == payer {
                data.apply(tx);
            } else if let Some(referrer) = referrer.as_deref_mut() {
                referrer.apply(tx);
            }
        }
        data.settled_deposits.insert(reference.clone());
        self.record_settlement(reference, amount, now);
        if bonus_due {
            if let Some(mut referral) = self.referrals.get_mut(&payer) {
                referral.first_deposit_bonus_awarded = true;
                referral.first_deposit_amount = Some(amount);
            }
        }

        info!(
            account = %payer,
            %reference,
            %amount,
            referral_bonus = bonus_due,
            "deposit settled"
        );
        Ok(SettlementOutcome::Settled {
            transaction_id: deposit_tx,
            referral_bonus_awarded: bonus_due,
        })
    }

    /// Marks `reference` as settling for `payer`. Returns the pending record
    /// the claim replaced, if any, so a failed commit can put it back.
    ///
    /// Must be called with the payer locked.
    fn claim(
        &self,
        reference: &DepositReference,
        payer: AccountId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Result<Option<DepositRecord>, LedgerError> {
        match self.deposits.entry(reference.clone()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if record.account_id != payer {
                    return Err(LedgerError::DepositMismatch);
                }
                match record.status {
                    DepositStatus::Pending => {
                        let pending = record.clone();
                        record.status = DepositStatus::Settling;
                        Ok(Some(pending))
                    }
                    // Claims by this payer resolve under its lock, so
                    // `Settling` is never observed here.
                    DepositStatus::Settling | DepositStatus::Settled => {
                        Err(LedgerError::DuplicateSettlement)
                    }
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(DepositRecord {
                    reference: reference.clone(),
                    account_id: payer,
                    amount,
                    status: DepositStatus::Settling,
                    created_at: at,
                    settled_at: None,
                });
                Ok(None)
            }
        }
    }

    fn release(&self, reference: &DepositReference, pending: Option<DepositRecord>) {
        match pending {
            Some(record) => {
                self.deposits.insert(reference.clone(), record);
            }
            None => {
                self.deposits.remove(reference);
            }
        }
    }

    fn record_settlement(&self, reference: &DepositReference, amount: Decimal, at: DateTime<Utc>) {
        if let Some(mut record) = self.deposits.get_mut(reference) {
            record.amount = amount;
            record.status = DepositStatus::Settled;
            record.settled_at = Some(at);
        }
    }

    /// Referral statistics of `referrer`.
    pub fn referral_summary(&self, referrer: AccountId) -> Result<ReferralSummary, LedgerError> {
        let account = self.account(referrer)?;
        let (referrals, successful) = self
            .referrals
            .iter()
            .filter(|entry| entry.referrer == referrer)
            .fold((0, 0), |(total, successful), entry| {
                (total + 1, successful + usize::from(entry.first_deposit_bonus_awarded))
            });
        let bonus_earned = account
            .transactions()
            .iter()
            .filter(|tx| tx.kind == EntryKind::ReferrerBonus)
            .map(|tx| tx.amount)
            .sum();
        Ok(ReferralSummary {
            referrals,
            successful,
            bonus_earned,
        })
    }
}
