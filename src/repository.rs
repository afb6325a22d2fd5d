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

//! Generic pass-through CRUD over one collection.

use crate::aggregate::{Group, Pipeline};
use crate::base::RecordId;
use crate::store::{Collection, Document, MemoryCollection};
use crate::LedgerError;
use std::sync::Arc;
use tracing::{debug, info};

/// Field-level checks run before a record is written.
pub trait Validate {
    fn validate(&self) -> Result<(), LedgerError>;
}

/// CRUD service for one record type.
///
/// Updates replace the whole record; the last write wins.
pub struct Repository<T: Document> {
    collection: Arc<dyn Collection<T>>,
}

impl<T: Document + Validate> Repository<T> {
    pub fn new(collection: Arc<dyn Collection<T>>) -> Self {
        Self { collection }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryCollection::<T>::new()))
    }

    pub fn all(&self) -> Result<Vec<T>, LedgerError> {
        Ok(self.collection.find_all()?)
    }

    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if no record has this ID.
    pub fn get(&self, id: RecordId) -> Result<T, LedgerError> {
        self.collection
            .find_by_id(id)?
            .ok_or(LedgerError::NotFound(T::COLLECTION))
    }

    pub fn find(&self, filter: &dyn Fn(&T) -> bool) -> Result<Vec<T>, LedgerError> {
        Ok(self.collection.find_by_filter(filter)?)
    }

    pub fn insert(&self, record: T) -> Result<T, LedgerError> {
        record.validate()?;
        self.collection.insert(record.clone())?;
        info!(collection = T::COLLECTION, id = %record.id(), "record created");
        Ok(record)
    }

    /// # Errors
    ///
    /// [`LedgerError::NotFound`] if no record has the record's ID.
    pub fn update(&self, record: T) -> Result<(), LedgerError> {
        record.validate()?;
        let id = record.id();
        if !self.collection.replace(id, record)? {
            return Err(LedgerError::NotFound(T::COLLECTION));
        }
        debug!(collection = T::COLLECTION, %id, "record replaced");
        Ok(())
    }

    pub fn delete(&self, id: RecordId) -> Result<(), LedgerError> {
        if !self.collection.delete(id)? {
            return Err(LedgerError::NotFound(T::COLLECTION));
        }
        info!(collection = T::COLLECTION, %id, "record deleted");
        Ok(())
    }

    pub fn aggregate(&self, pipeline: &Pipeline<'_, T>) -> Result<Vec<Group>, LedgerError> {
        Ok(self.collection.aggregate(pipeline)?)
    }
}
