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

//! Engine configuration loaded from environment variables.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Platform-wide constants applied by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Smallest amount a withdrawal request may ask for
    pub minimum_withdrawal: Decimal,
    /// Smallest amount a deposit may be initiated with
    pub minimum_deposit: Decimal,
    /// Share of the first deposit credited to the referrer
    pub referrer_bonus_rate: Decimal,
    /// Share of the first deposit credited to the referred account
    pub referred_bonus_rate: Decimal,
    /// A started task expires after this many multiples of its duration.
    /// `None` keeps started tasks open indefinitely; `Some(0)` is treated
    /// the same way and rejected by [`EngineConfig::from_env`].
    pub task_start_expiry_factor: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minimum_withdrawal: dec!(100),
            minimum_deposit: dec!(100),
            referrer_bonus_rate: dec!(0.10),
            referred_bonus_rate: dec!(0.05),
            task_start_expiry_factor: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            minimum_withdrawal: env_or("LEDGER_MIN_WITHDRAWAL", defaults.minimum_withdrawal)?,
            minimum_deposit: env_or("LEDGER_MIN_DEPOSIT", defaults.minimum_deposit)?,
            referrer_bonus_rate: env_or(
                "LEDGER_REFERRER_BONUS_RATE",
                defaults.referrer_bonus_rate,
            )?,
            referred_bonus_rate: env_or(
                "LEDGER_REFERRED_BONUS_RATE",
                defaults.referred_bonus_rate,
            )?,
            task_start_expiry_factor: match std::env::var("LEDGER_TASK_EXPIRY_FACTOR") {
                Ok(raw) => Some(parse_expiry_factor(&raw)?),
                Err(_) => defaults.task_start_expiry_factor,
            },
        })
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => parse(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse<T: FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError {
        key,
        value: raw.to_string(),
    })
}

/// Expiry factors must be at least 1 or no started task could ever complete.
fn parse_expiry_factor(raw: &str) -> Result<u32, ConfigError> {
    const KEY: &str = "LEDGER_TASK_EXPIRY_FACTOR";
    match parse(KEY, raw)? {
        0 => Err(ConfigError {
            key: KEY,
            value: raw.to_string(),
        }),
        factor => Ok(factor),
    }
}
