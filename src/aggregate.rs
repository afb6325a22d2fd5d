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

//! Aggregation pipelines: match, group by period, sum.
//!
//! ```
//! use reserve_ledger_rs::aggregate::Pipeline;
//! use reserve_ledger_rs::Period;
//! use rust_decimal::Decimal;
//! use rust_decimal_macros::dec;
//!
//! let entries = [(3, dec!(10)), (1, dec!(5)), (3, dec!(2))];
//! let pipeline = Pipeline::new()
//!     .matching(|(_, amount): &(u32, Decimal)| *amount > dec!(1))
//!     .group_by(|(month, _)| Period { year: 2025, month: *month })
//!     .sum(|(_, amount)| *amount);
//!
//! let groups = pipeline.group(&entries);
//! assert_eq!(groups.len(), 2);
//! assert_eq!(groups[0].sums, vec![dec!(5)]);
//! assert_eq!(groups[1].sums, vec![dec!(12)]);
//! ```

use crate::base::Period;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

type Matcher<'a, T> = Box<dyn Fn(&T) -> bool + 'a>;
type GroupKey<'a, T> = Box<dyn Fn(&T) -> Period + 'a>;
type Measure<'a, T> = Box<dyn Fn(&T) -> Decimal + 'a>;

/// One output row of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    /// `None` when the pipeline groups every matched record together.
    pub period: Option<Period>,
    /// One sum per measure, in the order the measures were added.
    pub sums: Vec<Decimal>,
}

impl Group {
    /// First measure, or zero for a pipeline without measures.
    pub fn total(&self) -> Decimal {
        self.sums.first().copied().unwrap_or(Decimal::ZERO)
    }
}

/// Declarative aggregation over records of type `T`.
pub struct Pipeline<'a, T> {
    matchers: Vec<Matcher<'a, T>>,
    group_key: Option<GroupKey<'a, T>>,
    measures: Vec<Measure<'a, T>>,
}

impl<'a, T> Pipeline<'a, T> {
    pub fn new() -> Self {
        Self {
            matchers: Vec::new(),
            group_key: None,
            measures: Vec::new(),
        }
    }

    /// Adds a match stage. Records must satisfy every stage.
    pub fn matching(mut self, matcher: impl Fn(&T) -> bool + 'a) -> Self {
        self.matchers.push(Box::new(matcher));
        self
    }

    pub fn group_by(mut self, key: impl Fn(&T) -> Period + 'a) -> Self {
        self.group_key = Some(Box::new(key));
        self
    }

    pub fn sum(mut self, measure: impl Fn(&T) -> Decimal + 'a) -> Self {
        self.measures.push(Box::new(measure));
        self
    }

    pub fn matches(&self, record: &T) -> bool {
        self.matchers.iter().all(|matcher| matcher(record))
    }

    /// Groups and sums the records that pass the match stages.
    ///
    /// Groups come out ordered by period. An empty input yields no groups.
    pub fn group(&self, records: &[T]) -> Vec<Group> {
        let mut groups: BTreeMap<Option<Period>, Vec<Decimal>> = BTreeMap::new();

        for record in records.iter().filter(|record| self.matches(record)) {
            let key = self.group_key.as_ref().map(|key| key(record));
            let sums = groups
                .entry(key)
                .or_insert_with(|| vec![Decimal::ZERO; self.measures.len()]);
            for (sum, measure) in sums.iter_mut().zip(&self.measures) {
                *sum += measure(record);
            }
        }

        groups
            .into_iter()
            .map(|(period, sums)| Group { period, sums })
            .collect()
    }
}

impl<T> Default for Pipeline<'_, T> {
    fn default() -> Self {
        Self::new()
    }
}
