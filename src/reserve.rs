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

//! Reserves and their transaction ledger entries.
//!
//! A [`Reserve`] carries a running balance that never goes negative. Every
//! change made through the ledger is recorded as an immutable
//! [`ReserveTransaction`]; transactions point back at their reserve by ID
//! and are never embedded in it.
//!
//! # Example
//!
//! ```
//! use reserve_ledger_rs::{Period, RecordId, Reserve};
//! use rust_decimal_macros::dec;
//!
//! let reserve = Reserve::new(
//!     RecordId::new(),
//!     "emergency fund",
//!     dec!(1000),
//!     dec!(1000),
//!     Period::new(3, 2025).unwrap(),
//! );
//! assert_eq!(reserve.current_balance(), dec!(1000));
//! ```

use crate::base::{Period, RecordId};
use crate::repository::Validate;
use crate::store::Document;
use crate::LedgerError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named pool of money with a running balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    #[serde(default)]
    id: RecordId,
    user_id: RecordId,
    #[serde(default)]
    description: String,
    current_balance: Decimal,
    initial_value: Decimal,
    #[serde(flatten)]
    period: Period,
}

impl Reserve {
    pub fn new(
        user_id: RecordId,
        description: impl Into<String>,
        initial_value: Decimal,
        current_balance: Decimal,
        period: Period,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            description: description.into(),
            current_balance,
            initial_value,
            period,
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn user_id(&self) -> RecordId {
        self.user_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn current_balance(&self) -> Decimal {
        self.current_balance
    }

    pub fn initial_value(&self) -> Decimal {
        self.initial_value
    }

    pub fn period(&self) -> Period {
        self.period
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.current_balance >= Decimal::ZERO,
            "Invariant violated: reserve balance went negative: {}",
            self.current_balance
        );
    }

    /// Decreases the balance (use).
    pub(crate) fn debit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        if amount > self.current_balance {
            return Err(LedgerError::InsufficientBalance {
                requested: amount,
                available: self.current_balance,
            });
        }
        self.current_balance -= amount;
        self.assert_invariants();
        Ok(())
    }

    /// Increases the balance (add).
    pub(crate) fn credit(&mut self, amount: Decimal) -> Result<(), LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount);
        }
        self.current_balance += amount;
        self.assert_invariants();
        Ok(())
    }
}

impl Document for Reserve {
    const COLLECTION: &'static str = "reserve";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Validate for Reserve {
    fn validate(&self) -> Result<(), LedgerError> {
        self.period.validate()?;
        if self.current_balance < Decimal::ZERO {
            return Err(LedgerError::InvalidField {
                field: "current_balance",
                reason: "must not be negative",
            });
        }
        if self.initial_value < Decimal::ZERO {
            return Err(LedgerError::InvalidField {
                field: "initial_value",
                reason: "must not be negative",
            });
        }
        Ok(())
    }
}

/// Direction of a ledger entry. The amount itself is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Money taken out of the reserve
    Use,
    /// Money put into the reserve
    Add,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Use => f.write_str("Use"),
            Self::Add => f.write_str("Add"),
        }
    }
}

/// Immutable, append-only record of one balance change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveTransaction {
    id: RecordId,
    reserve_id: RecordId,
    amount: Decimal,
    timestamp: DateTime<Utc>,
    kind: TransactionKind,
    description: String,
}

impl ReserveTransaction {
    /// Creates an entry stamped with the current time.
    pub(crate) fn new(
        reserve_id: RecordId,
        kind: TransactionKind,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Self {
        debug_assert!(amount > Decimal::ZERO, "ledger amounts are always positive");
        Self {
            id: RecordId::new(),
            reserve_id,
            amount,
            timestamp: Utc::now(),
            kind,
            description: description.into(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn reserve_id(&self) -> RecordId {
        self.reserve_id
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Amount with the direction applied: negative for [`TransactionKind::Use`].
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            TransactionKind::Use => -self.amount,
            TransactionKind::Add => self.amount,
        }
    }
}

impl Document for ReserveTransaction {
    const COLLECTION: &'static str = "reserve_transaction";

    fn id(&self) -> RecordId {
        self.id
    }
}
