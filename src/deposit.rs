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

//! Deposits and payment-provider confirmations.

use crate::base::{AccountId, DepositReference, TransactionId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Provider status that triggers settlement.
pub const PAYMENT_SUCCESS: &str = "success";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepositStatus {
    Pending,
    /// Claimed by a settlement that has not committed yet
    Settling,
    Settled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositRecord {
    pub reference: DepositReference,
    pub account_id: AccountId,
    pub amount: Decimal,
    pub status: DepositStatus,
    pub created_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

/// Confirmation event delivered by the payment gateway. May be redelivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub reference: DepositReference,
    /// Amount in major currency units.
    pub amount: Decimal,
    pub payer_account_id: AccountId,
    pub status: String,
}

impl PaymentConfirmation {
    /// Builds a confirmation from an amount in minor units (kobo, cents), the
    /// way the gateway reports it.
    pub fn from_minor_units(
        reference: DepositReference,
        minor_units: i64,
        payer_account_id: AccountId,
        status: impl Into<String>,
    ) -> Self {
        Self {
            reference,
            amount: Decimal::new(minor_units, 2),
            payer_account_id,
            status: status.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PAYMENT_SUCCESS
    }
}

/// Result of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// Credits committed.
    Settled {
        transaction_id: TransactionId,
        referral_bonus_awarded: bool,
    },
    /// Reference was settled by an earlier delivery; nothing changed.
    AlreadySettled,
    /// Provider status was not a success; nothing changed.
    Ignored,
}
