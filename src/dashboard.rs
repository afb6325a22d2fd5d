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

//! Read-only dashboard projections.
//!
//! Monthly records (credits, debits, reserves, final balances) are grouped by
//! their own period. Ledger entries are grouped by the month of their
//! timestamp.

use crate::aggregate::{Group, Pipeline};
use crate::base::Period;
use crate::ledger::ReserveLedger;
use crate::records::{Credit, Debit, FinalBalance};
use crate::repository::Repository;
use crate::reserve::{Reserve, ReserveTransaction, TransactionKind};
use crate::LedgerError;
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Sum of one amount for one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTotal {
    #[serde(flatten)]
    pub period: Period,
    pub total: Decimal,
}

/// Money added to and used from reserves in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyFlow {
    #[serde(flatten)]
    pub period: Period,
    pub added: Decimal,
    pub used: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveSummary {
    /// Sum of every reserve's current balance.
    pub current_balance: Decimal,
    /// Sum of use entries in the ledger.
    pub total_used: Decimal,
}

/// Inclusive time range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRange {
    pub fn new(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self, LedgerError> {
        let range = Self { from, to };
        range.validate()?;
        Ok(range)
    }

    pub fn validate(&self) -> Result<(), LedgerError> {
        if self.from > self.to {
            return Err(LedgerError::InvalidField {
                field: "range",
                reason: "from must not be after to",
            });
        }
        Ok(())
    }

    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        self.from <= *instant && *instant <= self.to
    }

    /// True when the period overlaps the range's months.
    pub fn covers(&self, period: Period) -> bool {
        Period::of(&self.from) <= period && period <= Period::of(&self.to)
    }
}

fn monthly(groups: Vec<Group>) -> Vec<MonthlyTotal> {
    groups
        .into_iter()
        .filter_map(|group| {
            let total = group.total();
            group.period.map(|period| MonthlyTotal { period, total })
        })
        .collect()
}

fn single_total(groups: Vec<Group>) -> Decimal {
    groups.first().map(Group::total).unwrap_or(Decimal::ZERO)
}

fn transaction_month(transaction: &ReserveTransaction) -> Period {
    Period::of(&transaction.timestamp())
}

/// Dashboard queries over every record collection.
pub struct Dashboard {
    credits: Arc<Repository<Credit>>,
    debits: Arc<Repository<Debit>>,
    final_balances: Arc<Repository<FinalBalance>>,
    ledger: Arc<ReserveLedger>,
}

impl Dashboard {
    pub fn new(
        credits: Arc<Repository<Credit>>,
        debits: Arc<Repository<Debit>>,
        final_balances: Arc<Repository<FinalBalance>>,
        ledger: Arc<ReserveLedger>,
    ) -> Self {
        Self {
            credits,
            debits,
            final_balances,
            ledger,
        }
    }

    pub fn credits_by_month(&self, year: i32) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|credit: &Credit| credit.period.year == year)
            .group_by(|credit| credit.period)
            .sum(|credit| credit.amount);
        Ok(monthly(self.credits.aggregate(&pipeline)?))
    }

    pub fn debits_by_month(&self, year: i32) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|debit: &Debit| debit.period.year == year)
            .group_by(|debit| debit.period)
            .sum(|debit| debit.amount);
        Ok(monthly(self.debits.aggregate(&pipeline)?))
    }

    pub fn final_balances_by_month(&self, year: i32) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|balance: &FinalBalance| balance.period.year == year)
            .group_by(|balance| balance.period)
            .sum(|balance| balance.amount);
        Ok(monthly(self.final_balances.aggregate(&pipeline)?))
    }

    /// Initial value set aside in reserves, per month of `year`.
    pub fn reserves_by_month(&self, year: i32) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|reserve: &Reserve| reserve.period().year == year)
            .group_by(Reserve::period)
            .sum(Reserve::initial_value);
        Ok(monthly(self.ledger.aggregate_reserves(&pipeline)?))
    }

    /// Total taken out of reserves during `year`.
    pub fn total_reserve_usage(&self, year: i32) -> Result<Decimal, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|transaction: &ReserveTransaction| {
                transaction.kind() == TransactionKind::Use && transaction.timestamp().year() == year
            })
            .sum(ReserveTransaction::amount);
        Ok(single_total(self.ledger.aggregate_transactions(&pipeline)?))
    }

    /// Sum of current balances of reserves whose period falls in `range`,
    /// or of every reserve when there is no range.
    pub fn reserve_balance(&self, range: Option<DateRange>) -> Result<Decimal, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(move |reserve: &Reserve| {
                range.is_none_or(|range| range.covers(reserve.period()))
            })
            .sum(Reserve::current_balance);
        Ok(single_total(self.ledger.aggregate_reserves(&pipeline)?))
    }

    /// Every ledger entry, summed per month.
    pub fn transaction_history(&self) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .group_by(transaction_month)
            .sum(ReserveTransaction::amount);
        Ok(monthly(self.ledger.aggregate_transactions(&pipeline)?))
    }

    /// Use entries of `year`, summed per month.
    pub fn usage_evolution(&self, year: i32) -> Result<Vec<MonthlyTotal>, LedgerError> {
        let pipeline = Pipeline::new()
            .matching(|transaction: &ReserveTransaction| {
                transaction.kind() == TransactionKind::Use && transaction.timestamp().year() == year
            })
            .group_by(transaction_month)
            .sum(ReserveTransaction::amount);
        Ok(monthly(self.ledger.aggregate_transactions(&pipeline)?))
    }

    /// Added and used amounts per month for entries inside `range`.
    pub fn reserve_flows(&self, range: DateRange) -> Result<Vec<MonthlyFlow>, LedgerError> {
        range.validate()?;
        let pipeline = Pipeline::new()
            .matching(move |transaction: &ReserveTransaction| {
                range.contains(&transaction.timestamp())
            })
            .group_by(transaction_month)
            .sum(|transaction| match transaction.kind() {
                TransactionKind::Add => transaction.amount(),
                TransactionKind::Use => Decimal::ZERO,
            })
            .sum(|transaction| match transaction.kind() {
                TransactionKind::Use => transaction.amount(),
                TransactionKind::Add => Decimal::ZERO,
            });

        Ok(self
            .ledger
            .aggregate_transactions(&pipeline)?
            .into_iter()
            .filter_map(|group| {
                let period = group.period?;
                Some(MonthlyFlow {
                    period,
                    added: group.sums[0],
                    used: group.sums[1],
                })
            })
            .collect())
    }

    /// Current balance of every reserve, alongside usage recomputed from the
    /// ledger for `range` (or all time).
    pub fn reserve_summary(&self, range: Option<DateRange>) -> Result<ReserveSummary, LedgerError> {
        if let Some(range) = &range {
            range.validate()?;
        }
        let current_balance = self.reserve_balance(None)?;

        let usage = Pipeline::new()
            .matching(move |transaction: &ReserveTransaction| {
                transaction.kind() == TransactionKind::Use
                    && range.is_none_or(|range| range.contains(&transaction.timestamp()))
            })
            .sum(ReserveTransaction::amount);
        let total_used = single_total(self.ledger.aggregate_transactions(&usage)?);

        Ok(ReserveSummary {
            current_balance,
            total_used,
        })
    }
}
