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

//! Document store adapter.
//!
//! Every record type lives in its own named collection and is addressed by
//! its [`RecordId`]. Services only see the [`Collection`] trait, so any
//! backend able to find, insert, replace and delete whole documents can sit
//! underneath. [`MemoryCollection`] is the in-process backend.

use crate::aggregate::{Group, Pipeline};
use crate::base::RecordId;
use crate::error::StoreError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::atomic::{AtomicU64, Ordering};

/// A record stored as a whole document in a named collection.
pub trait Document: Clone + Send + Sync + 'static {
    /// Collection name, one per record type.
    const COLLECTION: &'static str;

    fn id(&self) -> RecordId;
}

/// Key-addressed collection of documents of one type.
pub trait Collection<T: Document>: Send + Sync {
    fn find_all(&self) -> Result<Vec<T>, StoreError>;

    fn find_by_id(&self, id: RecordId) -> Result<Option<T>, StoreError>;

    fn find_by_filter(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, StoreError>;

    /// Inserts a new document. Fails with [`StoreError::DuplicateKey`] if the
    /// ID is taken.
    fn insert(&self, record: T) -> Result<(), StoreError>;

    /// Replaces the whole document stored under `id`.
    ///
    /// Returns `false` when no document matched.
    fn replace(&self, id: RecordId, record: T) -> Result<bool, StoreError>;

    /// Returns `false` when no document matched.
    fn delete(&self, id: RecordId) -> Result<bool, StoreError>;

    /// Runs an aggregation pipeline over the collection.
    fn aggregate(&self, pipeline: &Pipeline<'_, T>) -> Result<Vec<Group>, StoreError> {
        let matched = self.find_by_filter(&|record| pipeline.matches(record))?;
        Ok(pipeline.group(&matched))
    }
}

#[derive(Debug)]
struct Slot<T> {
    /// Insertion sequence, gives the collection its native order.
    sequence: u64,
    record: T,
}

/// In-memory collection backed by a [`DashMap`].
///
/// Reads return documents in insertion order; a replace keeps the original
/// position.
#[derive(Debug)]
pub struct MemoryCollection<T> {
    records: DashMap<RecordId, Slot<T>>,
    next_sequence: AtomicU64,
}

impl<T: Document> MemoryCollection<T> {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            next_sequence: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn collect(&self, filter: &dyn Fn(&T) -> bool) -> Vec<T> {
        let mut matched: Vec<(u64, T)> = self
            .records
            .iter()
            .filter(|slot| filter(&slot.record))
            .map(|slot| (slot.sequence, slot.record.clone()))
            .collect();
        matched.sort_unstable_by_key(|(sequence, _)| *sequence);
        matched.into_iter().map(|(_, record)| record).collect()
    }
}

impl<T: Document> Default for MemoryCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Document> Collection<T> for MemoryCollection<T> {
    fn find_all(&self) -> Result<Vec<T>, StoreError> {
        Ok(self.collect(&|_| true))
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<T>, StoreError> {
        Ok(self.records.get(&id).map(|slot| slot.record.clone()))
    }

    fn find_by_filter(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, StoreError> {
        Ok(self.collect(filter))
    }

    fn insert(&self, record: T) -> Result<(), StoreError> {
        let id = record.id();

        // Entry API keeps check-and-insert atomic per key
        match self.records.entry(id) {
            Entry::Occupied(_) => Err(StoreError::DuplicateKey {
                collection: T::COLLECTION,
                id,
            }),
            Entry::Vacant(entry) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                entry.insert(Slot { sequence, record });
                Ok(())
            }
        }
    }

    fn replace(&self, id: RecordId, record: T) -> Result<bool, StoreError> {
        match self.records.get_mut(&id) {
            Some(mut slot) => {
                slot.record = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        Ok(self.records.remove(&id).is_some())
    }
}
