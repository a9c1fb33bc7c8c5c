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

//! Ledger transactions.
//!
//! Transactions are immutable once committed. An account's balance is the
//! signed sum of its transactions: credits add, debits subtract.

use crate::base::{AccountId, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Credit,
    Debit,
}

/// What caused a ledger entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    PlanPurchase,
    PlanUpgrade,
    TaskReward,
    Deposit,
    /// Paid to the referrer on the referred account's first deposit
    ReferrerBonus,
    /// Paid to the referred account on its first deposit
    ReferredBonus,
    Withdrawal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub id: TransactionId,
    pub account_id: AccountId,
    pub direction: Direction,
    pub kind: EntryKind,
    /// Always positive; the sign comes from `direction`.
    pub amount: Decimal,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    /// Amount with the direction applied.
    pub fn signed_amount(&self) -> Decimal {
        match self.direction {
            Direction::Credit => self.amount,
            Direction::Debit => -self.amount,
        }
    }
}

/// Uncommitted ledger entry; becomes a [`Transaction`] once the engine
/// assigns an ID and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Posting {
    pub account_id: AccountId,
    pub direction: Direction,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub description: String,
}

impl Posting {
    pub fn credit(
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        description: String,
    ) -> Self {
        Self {
            account_id,
            direction: Direction::Credit,
            kind,
            amount,
            description,
        }
    }

    pub fn debit(
        account_id: AccountId,
        kind: EntryKind,
        amount: Decimal,
        description: String,
    ) -> Self {
        Self {
            account_id,
            direction: Direction::Debit,
            kind,
            amount,
            description,
        }
    }

    pub fn into_transaction(self, id: TransactionId, created_at: DateTime<Utc>) -> Transaction {
        Transaction {
            id,
            account_id: self.account_id,
            direction: self.direction,
            kind: self.kind,
            amount: self.amount,
            description: self.description,
            created_at,
        }
    }
}
