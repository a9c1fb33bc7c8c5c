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

//! Ledger engine.
//!
//! The [`Engine`] owns every account and is the only writer of ledger state.
//! Each public operation is one atomic unit:
//!
//! 1. look up the accounts involved and lock them (in ID order when more
//!    than one),
//! 2. validate against the locked state, rejecting without side effects,
//! 3. hand the resulting transactions to the [`Journal`],
//! 4. apply the transactions and field changes to the locked state.
//!
//! Step 4 cannot fail, so either every effect of an operation becomes visible
//! or none does.
//!
//! # Operations
//!
//! | Trigger | Method |
//! |---------|--------|
//! | Signup | [`Engine::register_account`] |
//! | Plan purchase / upgrade | [`Engine::purchase_or_upgrade`] |
//! | Task start / complete | [`Engine::start_task`], [`Engine::complete_task`] |
//! | Payment webhook | [`Engine::confirm_payment`], [`Engine::settle_deposit`] |
//! | Withdrawal request | [`Engine::request_withdrawal`] |
//! | Admin decision | [`Engine::approve_withdrawal`], [`Engine::reject_withdrawal`] |
//!
//! # Thread Safety
//!
//! Accounts live in a [`DashMap`] as `Arc<Account>`. Map guards are always
//! released before an account mutex is taken, and an account mutex may be
//! held while touching the secondary maps, never the other way round.

mod deposits;
mod plans;
mod tasks;
mod withdrawals;

pub use plans::PlanChange;
pub use tasks::TaskCompletion;

use crate::account::{Account, AccountData, AuditReport};
use crate::base::{AccountId, DepositReference, TransactionId, WithdrawalId};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::deposit::DepositRecord;
use crate::journal::{Journal, MemoryJournal};
use crate::plan::PlanCatalog;
use crate::referral::{Referral, referral_code};
use crate::roles::RoleRegistry;
use crate::task::TaskBoard;
use crate::transaction::{Posting, Transaction};
use crate::LedgerError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::MutexGuard;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{info, warn};

/// Account ledger and plan lifecycle engine.
pub struct Engine {
    config: EngineConfig,
    catalog: PlanCatalog,
    clock: Arc<dyn Clock>,
    journal: Arc<dyn Journal>,
    accounts: DashMap<AccountId, Arc<Account>>,
    referral_codes: DashMap<String, AccountId>,
    /// Referral rows keyed by the referred account.
    referrals: DashMap<AccountId, Referral>,
    deposits: DashMap<DepositReference, DepositRecord>,
    /// Owner of each withdrawal request.
    withdrawal_owners: DashMap<WithdrawalId, AccountId>,
    tasks: TaskBoard,
    roles: RoleRegistry,
    next_transaction: AtomicU64,
    next_withdrawal: AtomicU64,
}

/// Configures an [`Engine`]. Unset parts fall back to the defaults.
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<EngineConfig>,
    catalog: Option<PlanCatalog>,
    clock: Option<Arc<dyn Clock>>,
    journal: Option<Arc<dyn Journal>>,
}

impl EngineBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn catalog(mut self, catalog: PlanCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn build(self) -> Engine {
        Engine {
            config: self.config.unwrap_or_default(),
            catalog: self.catalog.unwrap_or_default(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            journal: self
                .journal
                .unwrap_or_else(|| Arc::new(MemoryJournal::new())),
            accounts: DashMap::new(),
            referral_codes: DashMap::new(),
            referrals: DashMap::new(),
            deposits: DashMap::new(),
            withdrawal_owners: DashMap::new(),
            tasks: TaskBoard::new(),
            roles: RoleRegistry::new(),
            next_transaction: AtomicU64::new(1),
            next_withdrawal: AtomicU64::new(1),
        }
    }
}

impl Engine {
    /// Creates an engine with the default catalog, configuration, wall clock
    /// and in-memory journal.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &PlanCatalog {
        &self.catalog
    }

    pub fn roles(&self) -> &RoleRegistry {
        &self.roles
    }

    pub fn tasks(&self) -> &TaskBoard {
        &self.tasks
    }

    /// Registers a new zero-balance account.
    ///
    /// `code` is the referrer's referral code; the link is what
    /// later makes the first settled deposit earn referral bonuses.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::DuplicateAccount`] - ID already registered.
    /// - [`LedgerError::UnknownReferralCode`] - Code unknown or the account's own.
    pub fn register_account(
        &self,
        id: AccountId,
        code: Option<&str>,
    ) -> Result<Arc<Account>, LedgerError> {
        let referrer = match code {
            Some(code) => {
                let referrer = self
                    .referral_codes
                    .get(code.trim())
                    .map(|entry| *entry.value())
                    .ok_or(LedgerError::UnknownReferralCode)?;
                if referrer == id {
                    return Err(LedgerError::UnknownReferralCode);
                }
                Some(referrer)
            }
            None => None,
        };

        let account = match self.accounts.entry(id) {
            Entry::Occupied(_) => return Err(LedgerError::DuplicateAccount),
            Entry::Vacant(entry) => {
                let account = Arc::new(Account::new(id, referrer));
                entry.insert(Arc::clone(&account));
                account
            }
        };

        self.referral_codes.insert(referral_code(id), id);
        if let Some(referrer) = referrer {
            self.referrals.insert(
                id,
                Referral {
                    referrer,
                    referred: id,
                    first_deposit_bonus_awarded: false,
                    first_deposit_amount: None,
                    created_at: self.clock.now(),
                },
            );
        }

        info!(account = %id, referred_by = ?referrer, "account registered");
        Ok(account)
    }

    pub fn get_account(&self, id: AccountId) -> Option<Arc<Account>> {
        self.accounts.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// All accounts, ordered by ID.
    pub fn accounts(&self) -> Vec<Arc<Account>> {
        let mut accounts: Vec<_> = self
            .accounts
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        accounts.sort_by_key(|account| account.id());
        accounts
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    /// Committed transactions of `id` in commit order.
    pub fn transactions(&self, id: AccountId) -> Result<Vec<Transaction>, LedgerError> {
        Ok(self.account(id)?.transactions())
    }

    pub fn audit(&self, id: AccountId) -> Result<AuditReport, LedgerError> {
        Ok(self.account(id)?.audit())
    }

    pub fn referral(&self, referred: AccountId) -> Option<Referral> {
        self.referrals.get(&referred).map(|entry| entry.value().clone())
    }

    pub fn deposit(&self, reference: &DepositReference) -> Option<DepositRecord> {
        self.deposits.get(reference).map(|entry| entry.value().clone())
    }

    fn account(&self, id: AccountId) -> Result<Arc<Account>, LedgerError> {
        self.get_account(id).ok_or(LedgerError::AccountNotFound)
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Assigns IDs to `postings` and hands them to the journal as one batch.
    ///
    /// Must be called with every affected account locked. On error nothing
    /// may be applied.
    fn commit(
        &self,
        postings: Vec<Posting>,
        at: DateTime<Utc>,
    ) -> Result<Vec<Transaction>, LedgerError> {
        if postings.is_empty() {
            return Ok(Vec::new());
        }
        let batch: Vec<Transaction> = postings
            .into_iter()
            .map(|posting| {
                let id = TransactionId(self.next_transaction.fetch_add(1, Ordering::SeqCst));
                posting.into_transaction(id, at)
            })
            .collect();

        if let Err(err) = self.journal.append(&batch) {
            warn!(entries = batch.len(), %err, "journal append failed; operation aborted");
            return Err(err);
        }
        Ok(batch)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Locks two distinct accounts in ID order and returns the guards in
/// argument order.
fn lock_pair<'a>(
    a: &'a Account,
    b: &'a Account,
) -> (MutexGuard<'a, AccountData>, MutexGuard<'a, AccountData>) {
    debug_assert_ne!(a.id(), b.id());
    if a.id() < b.id() {
        let first = a.lock();
        let second = b.lock();
        (first, second)
    } else {
        let second = b.lock();
        let first = a.lock();
        (first, second)
    }
}
