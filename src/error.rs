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

//! Error types for ledger operations.
//!
//! Every variant except [`LedgerError::StoreUnavailable`] is a validation or
//! state-machine rejection: terminal for the triggering request and returned
//! with the ledger left exactly as it was before the call.

use thiserror::Error;

/// Ledger operation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Account ID is unknown to the ledger
    #[error("account not found")]
    AccountNotFound,

    /// Account ID is already registered
    #[error("account already exists")]
    DuplicateAccount,

    /// Referral code does not resolve to another account
    #[error("unknown referral code")]
    UnknownReferralCode,

    /// Plan ID is not in the catalog
    #[error("plan not found")]
    PlanNotFound,

    /// Account already holds the requested plan
    #[error("plan already owned")]
    AlreadyOwned,

    /// Requested plan is not strictly more expensive than the active one
    #[error("only upgrades to a higher plan are allowed")]
    UpgradeOnly,

    /// Balance does not cover the charge or withdrawal
    #[error("insufficient balance")]
    InsufficientBalance,

    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Task template is unknown
    #[error("task not found")]
    TaskNotFound,

    /// Task is inactive, scheduled for another day, or gated to another plan
    #[error("task not available for this account")]
    NotEligible,

    /// Task was already started and not yet completed
    #[error("task already started")]
    AlreadyStarted,

    /// Task completion requested without a prior start
    #[error("task not started")]
    NotStarted,

    /// Minimum engagement time has not elapsed
    #[error("task duration not yet elapsed")]
    TooEarly,

    /// Task was started too long ago and must be started again
    #[error("task start expired")]
    StartExpired,

    /// Task reward was already credited
    #[error("task already completed")]
    AlreadyCompleted,

    /// Withdrawal amount is below the platform minimum
    #[error("amount below minimum withdrawal")]
    BelowMinimumWithdrawal,

    /// Withdrawal would exceed the active plan's cap
    #[error("withdrawal limit exceeded")]
    WithdrawalLimitExceeded,

    /// Withdrawal ID is unknown
    #[error("withdrawal not found")]
    WithdrawalNotFound,

    /// Withdrawal already reached the opposite terminal state
    #[error("withdrawal already finalized")]
    WithdrawalFinalized,

    /// Deposit amount is below the platform minimum
    #[error("amount below minimum deposit")]
    BelowMinimumDeposit,

    /// Deposit reference was already initiated
    #[error("duplicate deposit reference")]
    DuplicateDeposit,

    /// Confirmation does not match the initiated deposit
    #[error("deposit confirmation does not match the recorded payer")]
    DepositMismatch,

    /// Deposit reference was already settled; redelivery is a no-op
    #[error("deposit already settled")]
    DuplicateSettlement,

    /// Caller lacks the capability required for the operation
    #[error("operation not permitted")]
    Forbidden,

    /// Backing store rejected the write; nothing was applied
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl LedgerError {
    /// Transient failures the caller may retry with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// Rejections that signal an already-applied event rather than a failure.
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::DuplicateSettlement)
    }
}
