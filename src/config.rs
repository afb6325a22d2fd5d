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

//! Server configuration from flags or environment variables.

use chrono::TimeDelta;
use clap::Parser;
use std::net::SocketAddr;
use thiserror::Error;

const MIN_SECRET_LEN: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("token secret must be at least {} bytes", MIN_SECRET_LEN)]
    WeakSecret,

    #[error("token lifetime must be at least one hour")]
    ZeroTokenLifetime,
}

/// Reserve Ledger - Personal finance API
///
/// Serves credits, debits, monthly closing balances and reserves over HTTP.
/// Reserve balances only move through the ledger, which records every use
/// and add.
#[derive(Parser, Debug, Clone)]
#[command(name = "reserve-ledger")]
#[command(about = "Personal finance API with a reserve balance ledger", long_about = None)]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, env = "RESERVE_LEDGER_BIND", default_value = "127.0.0.1:3000")]
    pub bind: SocketAddr,

    /// Secret bearer tokens are signed with
    #[arg(long, env = "RESERVE_LEDGER_TOKEN_SECRET", hide_env_values = true)]
    pub token_secret: String,

    /// Hours a login token stays valid
    #[arg(long, env = "RESERVE_LEDGER_TOKEN_TTL_HOURS", default_value_t = 168)]
    pub token_ttl_hours: u32,

    /// Require a bearer token on every /api route except register and login
    #[arg(long, env = "RESERVE_LEDGER_REQUIRE_AUTH")]
    pub require_auth: bool,

    /// Emit logs as JSON lines
    #[arg(long, env = "RESERVE_LEDGER_LOG_JSON")]
    pub log_json: bool,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.token_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::WeakSecret);
        }
        if self.token_ttl_hours == 0 {
            return Err(ConfigError::ZeroTokenLifetime);
        }
        Ok(())
    }

    pub fn token_lifetime(&self) -> TimeDelta {
        TimeDelta::hours(i64::from(self.token_ttl_hours))
    }
}
