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

//! Error types for ledger, record and store operations.

use crate::base::RecordId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Failures raised by a [`Collection`](crate::store::Collection) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store cannot be reached or rejected the operation
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A record with the same ID already exists in the collection
    #[error("duplicate record ID {id} in collection {collection}")]
    DuplicateKey {
        collection: &'static str,
        id: RecordId,
    },
}

/// Ledger and record processing errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount is zero or negative
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Identifier is not a 24 character hex string
    #[error("malformed identifier: {0:?}")]
    MalformedId(String),

    /// Month outside 1-12 or year without four digits
    #[error("invalid period: month {month}, year {year}")]
    InvalidPeriod { month: u32, year: i32 },

    /// A record field failed validation
    #[error("invalid {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// Referenced record does not exist
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Use would take the reserve balance below zero
    #[error("insufficient reserve balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Decimal,
        available: Decimal,
    },

    /// Email and password do not match a registered user
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Bearer token is malformed, forged or expired
    #[error("invalid or expired token")]
    InvalidToken,

    /// Email is already registered
    #[error("email already registered")]
    EmailTaken,

    /// Password hashing or token signing failed
    #[error("credential processing failed: {0}")]
    Credential(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// True for caller mistakes that must never be retried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount
                | Self::MalformedId(_)
                | Self::InvalidPeriod { .. }
                | Self::InvalidField { .. }
        )
    }
}
