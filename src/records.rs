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

//! Monthly credit, debit and closing balance records.

use crate::base::{Period, RecordId};
use crate::repository::Validate;
use crate::store::Document;
use crate::LedgerError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

fn non_negative(field: &'static str, amount: Decimal) -> Result<(), LedgerError> {
    if amount < Decimal::ZERO {
        return Err(LedgerError::InvalidField {
            field,
            reason: "must not be negative",
        });
    }
    Ok(())
}

/// Money received in a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    #[serde(flatten)]
    pub period: Period,
}

impl Credit {
    pub fn new(
        user_id: RecordId,
        description: impl Into<String>,
        amount: Decimal,
        period: Period,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            description: description.into(),
            amount,
            period,
        }
    }
}

impl Document for Credit {
    const COLLECTION: &'static str = "credit";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Validate for Credit {
    fn validate(&self) -> Result<(), LedgerError> {
        self.period.validate()?;
        non_negative("amount", self.amount)
    }
}

/// Money owed or spent in a month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Debit {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    #[serde(default)]
    pub description: String,
    pub amount: Decimal,
    #[serde(flatten)]
    pub period: Period,
    #[serde(default)]
    pub paid: bool,
}

impl Debit {
    pub fn new(
        user_id: RecordId,
        description: impl Into<String>,
        amount: Decimal,
        period: Period,
    ) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            description: description.into(),
            amount,
            period,
            paid: false,
        }
    }
}

impl Document for Debit {
    const COLLECTION: &'static str = "debit";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Validate for Debit {
    fn validate(&self) -> Result<(), LedgerError> {
        self.period.validate()?;
        non_negative("amount", self.amount)
    }
}

/// What was left over at the close of a month.
///
/// The amount may be negative when the month ended in the red.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalBalance {
    #[serde(default)]
    pub id: RecordId,
    pub user_id: RecordId,
    pub amount: Decimal,
    #[serde(flatten)]
    pub period: Period,
}

impl FinalBalance {
    pub fn new(user_id: RecordId, amount: Decimal, period: Period) -> Self {
        Self {
            id: RecordId::new(),
            user_id,
            amount,
            period,
        }
    }
}

impl Document for FinalBalance {
    const COLLECTION: &'static str = "final_balance";

    fn id(&self) -> RecordId {
        self.id
    }
}

impl Validate for FinalBalance {
    fn validate(&self) -> Result<(), LedgerError> {
        self.period.validate()
    }
}
