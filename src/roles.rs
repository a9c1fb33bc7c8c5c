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

//! Role assignments and capability checks.
//!
//! Roles are explicit `account → role` records. Privileged operations ask
//! for a minimum role and never compare identities.

use crate::LedgerError;
use crate::base::AccountId;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered from least to most privileged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular account
    #[default]
    Member,
    /// Approves withdrawals and manages task templates
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Member => write!(f, "member"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoleRegistry {
    roles: DashMap<AccountId, Role>,
}

impl RoleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn grant(&self, account: AccountId, role: Role) {
        self.roles.insert(account, role);
    }

    pub fn revoke(&self, account: AccountId) {
        self.roles.remove(&account);
    }

    /// Accounts without an assignment are members.
    pub fn role_of(&self, account: AccountId) -> Role {
        self.roles.get(&account).map(|r| *r).unwrap_or_default()
    }

    pub fn require(&self, account: AccountId, required: Role) -> Result<(), LedgerError> {
        if self.role_of(account) >= required {
            Ok(())
        } else {
            Err(LedgerError::Forbidden)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unassigned_accounts_are_members() {
        let registry = RoleRegistry::new();
        assert_eq!(registry.role_of(AccountId(1)), Role::Member);
        assert_eq!(registry.require(AccountId(1), Role::Member), Ok(()));
        assert_eq!(
            registry.require(AccountId(1), Role::Admin),
            Err(LedgerError::Forbidden)
        );
    }

    #[test]
    fn grant_and_revoke_admin() {
        let registry = RoleRegistry::new();
        registry.grant(AccountId(9), Role::Admin);
        assert_eq!(registry.require(AccountId(9), Role::Admin), Ok(()));

        registry.revoke(AccountId(9));
        assert_eq!(
            registry.require(AccountId(9), Role::Admin),
            Err(LedgerError::Forbidden)
        );
    }

    #[test]
    fn roles_are_ordered() {
        assert!(Role::Admin > Role::Member);
        assert_eq!(Role::Admin.to_string(), "admin");
    }
}
