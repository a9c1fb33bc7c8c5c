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

//! Plan purchase and upgrade.
//!
//! Upgrades charge only the difference between the target plan's price and
//! the price recorded for the active plan; the remaining balance is kept.

use super::Engine;
use crate::LedgerError;
use crate::account::ActivePlan;
use crate::base::{AccountId, PlanId, TransactionId};
use crate::transaction::{EntryKind, Posting};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};

/// Result of a successful purchase or upgrade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanChange {
    pub previous: Option<PlanId>,
    pub plan: PlanId,
    pub charged: Decimal,
    /// Debit entry, absent when nothing was charged.
    pub transaction: Option<TransactionId>,
}

impl Engine {
    /// Buys `target` for an account without a plan, or upgrades to it.
    ///
    /// The debit, the plan swap, the new withdrawal limit and the reset of
    /// `total_withdrawn` are applied together under the account lock.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::PlanNotFound`] - Target not in the catalog.
    /// - [`LedgerError::AccountNotFound`] - Unknown account.
    /// - [`LedgerError::AlreadyOwned`] - Target is the active plan.
    /// - [`LedgerError::UpgradeOnly`] - Target is not priced above the active plan.
    /// - [`LedgerError::InsufficientBalance`] - Balance below the charge.
    /// - [`LedgerError::StoreUnavailable`] - Journal rejected the debit.
    pub fn purchase_or_upgrade(
        &self,
        account_id: AccountId,
        target: &PlanId,
    ) -> Result<PlanChange, LedgerError> {
        let result = self.change_plan(account_id, target);
        if let Err(err) = &result {
            debug!(account = %account_id, plan = %target, %err, "plan purchase rejected");
        }
        result
    }

    fn change_plan(
        &self,
        account_id: AccountId,
        target: &PlanId,
    ) -> Result<PlanChange, LedgerError> {
        let plan = self.catalog.get(target).ok_or(LedgerError::PlanNotFound)?;
        let account = self.account(account_id)?;
        let mut data = account.lock();

        let previous = data.plan.clone();
        if let Some(current) = &previous {
            if current.id == plan.id {
                return Err(LedgerError::AlreadyOwned);
            }
            if plan.price <= current.price {
                return Err(LedgerError::UpgradeOnly);
            }
        }

        let charge = (plan.price - data.active_plan_price()).max(Decimal::ZERO);
        if data.balance < charge {
            return Err(LedgerError::InsufficientBalance);
        }

        let mut postings = Vec::new();
        if charge > Decimal::ZERO {
            postings.push(match &previous {
                None => Posting::debit(
                    account_id,
                    EntryKind::PlanPurchase,
                    charge,
                    format!("Investment plan purchase - {}", plan.name),
                ),
                Some(current) => Posting::debit(
                    account_id,
                    EntryKind::PlanUpgrade,
                    charge,
                    format!("Investment plan upgrade - {} to {}", current.name, plan.name),
                ),
            });
        }

        let now = self.now();
        let committed = self.commit(postings, now)?;
        let transaction = committed.first().map(|tx| tx.id);
        for tx in committed {
            data.apply(tx);
        }
        data.plan = Some(ActivePlan {
            id: plan.id.clone(),
            name: plan.name.clone(),
            price: plan.price,
            purchased_at: now,
        });
        data.withdrawal_limit = plan.withdrawal_limit;
        data.total_withdrawn = Decimal::ZERO;

        info!(
            account = %account_id,
            plan = %plan.id,
            previous = ?previous.as_ref().map(|p| p.id.as_str()),
            charged = %charge,
            "plan activated"
        );

        Ok(PlanChange {
            previous: previous.map(|p| p.id),
            plan: plan.id.clone(),
            charged: charge,
            transaction,
        })
    }
}
