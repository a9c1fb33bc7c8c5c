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

//! Referral links between accounts.

use crate::base::AccountId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

const CODE_PREFIX: &str = "REF";

/// Link created at signup when the new account used a referral code.
///
/// The bonus fields are written once, by deposit settlement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Referral {
    pub referrer: AccountId,
    pub referred: AccountId,
    pub first_deposit_bonus_awarded: bool,
    pub first_deposit_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

/// Referral statistics for one referrer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReferralSummary {
    pub referrals: usize,
    /// Referred accounts whose first deposit has settled.
    pub successful: usize,
    pub bonus_earned: Decimal,
}

/// Shareable code of an account.
pub fn referral_code(account: AccountId) -> String {
    format!("{CODE_PREFIX}{:06}", account.0)
}
