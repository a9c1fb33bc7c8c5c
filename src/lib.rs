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

//! # Tiered Ledger
//!
//! This library provides the account ledger behind a tiered investment plan
//! platform: plan purchases and upgrades, timed task rewards, payment gateway
//! deposits with referral bonuses, and withdrawals under plan limits.
//!
//! ## Core Components
//!
//! - [`Engine`]: Owns every account and executes each operation atomically
//! - [`Account`]: Balance, active plan and transaction history of one user
//! - [`PlanCatalog`]: Ordered plan tiers with prices and withdrawal limits
//! - [`Journal`]: Durable sink that accepts each committed batch of transactions
//! - [`LedgerError`]: Rejections and store failures returned by the engine
//!
//! ## Example
//!
//! ```
//! use tiered_ledger_rs::{AccountId, DepositReference, Engine, PaymentConfirmation, PlanId};
//! use rust_decimal_macros::dec;
//!
//! let engine = Engine::new();
//! engine.register_account(AccountId(1), None).unwrap();
//!
//! // Gateway confirms a deposit of 6 000 (reported in minor units)
//! let confirmation = PaymentConfirmation::from_minor_units(
//!     DepositReference::new("ps_001"),
//!     600_000,
//!     AccountId(1),
//!     "success",
//! );
//! engine.confirm_payment(&confirmation).unwrap();
//!
//! // Buy the premium plan
//! engine.purchase_or_upgrade(AccountId(1), &PlanId::new("premium")).unwrap();
//!
//! let account = engine.get_account(AccountId(1)).unwrap();
//! assert_eq!(account.balance(), dec!(1000));
//! assert!(engine.audit(AccountId(1)).unwrap().consistent);
//! ```
//!
//! ## Thread Safety
//!
//! Operations on one account are serialized by that account's lock, while
//! operations on different accounts run in parallel. Settlements that pay a
//! referral bonus lock both accounts in ID order.

pub mod account;
mod base;
pub mod clock;
pub mod config;
mod deposit;
mod engine;
pub mod error;
pub mod journal;
pub mod plan;
mod referral;
pub mod roles;
pub mod task;
mod transaction;
mod withdrawal;

pub use account::{Account, AccountSnapshot, ActivePlan, AuditReport};
pub use base::{AccountId, DepositReference, PlanId, TaskTemplateId, TransactionId, WithdrawalId};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use deposit::{DepositRecord, DepositStatus, PaymentConfirmation, SettlementOutcome};
pub use engine::{Engine, EngineBuilder, PlanChange, TaskCompletion};
pub use error::LedgerError;
pub use journal::{CsvJournal, Journal, MemoryJournal};
pub use plan::{CatalogError, Plan, PlanCatalog};
pub use referral::{Referral, ReferralSummary, referral_code};
pub use roles::{Role, RoleRegistry};
pub use task::{TaskBoard, TaskState, TaskTemplate, TaskView, UserTaskStatus};
pub use transaction::{Direction, EntryKind, Transaction};
pub use withdrawal::{BankDetails, Withdrawal, WithdrawalStatus};
