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

//! Plan catalog.
//!
//! Plans form a total order by rank. Rank is the position in the catalog and
//! prices must strictly increase with it, so "higher rank" and "more
//! expensive" always agree.

use crate::base::PlanId;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("catalog is empty")]
    Empty,

    #[error("duplicate plan id {0}")]
    DuplicatePlan(PlanId),

    #[error("plan {0} must be priced above the previous tier")]
    PriceNotIncreasing(PlanId),

    #[error("plan {0} has a non-positive price or withdrawal limit")]
    InvalidAmount(PlanId),

    #[error("malformed catalog: {0}")]
    Csv(#[from] csv::Error),
}

/// One tier of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub id: PlanId,
    pub name: String,
    pub price: Decimal,
    pub withdrawal_limit: Decimal,
    /// Zero-based position in the catalog; higher is better.
    pub rank: usize,
}

#[derive(Debug, Deserialize)]
struct PlanRecord {
    id: String,
    name: String,
    price: Decimal,
    withdrawal_limit: Decimal,
}

/// Immutable, rank-ordered table of plans.
#[derive(Debug, Clone)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    /// Builds a catalog from `(id, name, price, withdrawal_limit)` rows in
    /// ascending tier order.
    pub fn new<I, S>(rows: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (S, S, Decimal, Decimal)>,
        S: Into<String>,
    {
        let mut plans: Vec<Plan> = Vec::new();
        let mut seen = HashSet::new();

        for (rank, (id, name, price, withdrawal_limit)) in rows.into_iter().enumerate() {
            let id = PlanId(id.into());
            if !seen.insert(id.clone()) {
                return Err(CatalogError::DuplicatePlan(id));
            }
            if price <= Decimal::ZERO || withdrawal_limit <= Decimal::ZERO {
                return Err(CatalogError::InvalidAmount(id));
            }
            if plans.last().is_some_and(|prev| price <= prev.price) {
                return Err(CatalogError::PriceNotIncreasing(id));
            }
            plans.push(Plan {
                id,
                name: name.into(),
                price,
                withdrawal_limit,
                rank,
            });
        }

        if plans.is_empty() {
            return Err(CatalogError::Empty);
        }
        Ok(Self { plans })
    }

    /// Loads a catalog from CSV with header `id,name,price,withdrawal_limit`.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.deserialize::<PlanRecord>() {
            let record = record?;
            rows.push((record.id, record.name, record.price, record.withdrawal_limit));
        }
        Self::new(rows)
    }

    pub fn get(&self, id: &PlanId) -> Option<&Plan> {
        self.plans.iter().find(|plan| &plan.id == id)
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    /// Plans strictly above `current`; every plan when `current` is `None`.
    pub fn upgrades_from(&self, current: Option<&PlanId>) -> &[Plan] {
        match current.and_then(|id| self.get(id)) {
            Some(plan) => &self.plans[plan.rank + 1..],
            None => &self.plans,
        }
    }
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self {
            plans: vec![
                default_plan("basic", "Basic", dec!(1000), dec!(1500), 0),
                default_plan("premium", "Premium", dec!(5000), dec!(10000), 1),
                default_plan("pro", "Pro", dec!(10000), dec!(20000), 2),
                default_plan("diamond", "Diamond", dec!(50000), dec!(100000), 3),
                default_plan("royal", "Royal", dec!(100000), dec!(200000), 4),
            ],
        }
    }
}

fn default_plan(id: &str, name: &str, price: Decimal, limit: Decimal, rank: usize) -> Plan {
    Plan {
        id: PlanId::new(id),
        name: name.to_string(),
        price,
        withdrawal_limit: limit,
        rank,
    }
}
