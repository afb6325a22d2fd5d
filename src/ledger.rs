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

//! Reserve ledger service.
//!
//! The [`ReserveLedger`] is the only component allowed to move a reserve's
//! balance through the ledger. Each movement is two writes:
//!
//! 1. the reserve is replaced with its new balance,
//! 2. a [`ReserveTransaction`] describing the movement is appended.
//!
//! # Thread Safety
//!
//! Read-modify-write cycles are serialized per reserve with a
//! [`parking_lot::Mutex`] kept in a [`DashMap`], so concurrent uses and adds
//! on the same reserve never overwrite each other. Different reserves are
//! processed in parallel. A lock entry only exists while some caller holds
//! it, so the table never outgrows the number of in-flight operations.
//!
//! # Failure Handling
//!
//! If appending the transaction fails after the balance was written, the
//! previous reserve is written back and the store error is returned.

use crate::aggregate::{Group, Pipeline};
use crate::base::RecordId;
use crate::error::StoreError;
use crate::repository::Validate;
use crate::reserve::{Reserve, ReserveTransaction, TransactionKind};
use crate::store::{Collection, MemoryCollection};
use crate::LedgerError;
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of folding a reserve's ledger over its initial value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub reserve_id: RecordId,
    pub initial_value: Decimal,
    /// Sum of adds minus sum of uses.
    pub net_movement: Decimal,
    /// `initial_value + net_movement`
    pub expected_balance: Decimal,
    pub current_balance: Decimal,
    pub consistent: bool,
}

/// Reserve balance and transaction ledger service.
///
/// # Invariants
///
/// - A reserve balance never goes negative.
/// - Ledger entries are append-only; the service never updates or deletes them.
/// - Deleting a reserve leaves its ledger entries in place.
pub struct ReserveLedger {
    reserves: Arc<dyn Collection<Reserve>>,
    transactions: Arc<dyn Collection<ReserveTransaction>>,
    /// Per-reserve write locks, present only while in use.
    locks: DashMap<RecordId, Arc<Mutex<()>>>,
}

impl ReserveLedger {
    pub fn new(
        reserves: Arc<dyn Collection<Reserve>>,
        transactions: Arc<dyn Collection<ReserveTransaction>>,
    ) -> Self {
        Self {
            reserves,
            transactions,
            locks: DashMap::new(),
        }
    }

    /// Creates a ledger over fresh in-memory collections.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryCollection::<Reserve>::new()),
            Arc::new(MemoryCollection::<ReserveTransaction>::new()),
        )
    }

    /// Runs `f` while holding the reserve's write lock.
    ///
    /// The `Arc` is cloned out so the map shard is released before blocking
    /// on the mutex. Afterwards the entry is dropped unless another caller
    /// still holds it. Clones are only taken under the shard lock, so a
    /// strong count of one means nobody else can be waiting.
    fn with_lock<T>(
        &self,
        reserve_id: RecordId,
        f: impl FnOnce() -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let lock = self.locks.entry(reserve_id).or_default().clone();
        let result = {
            let _guard = lock.lock();
            f()
        };
        drop(lock);
        self.locks
            .remove_if(&reserve_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    /// Stores a new reserve as supplied.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidPeriod`] - Month or year out of range.
    /// - [`LedgerError::InvalidField`] - Negative balance or initial value.
    pub fn create_reserve(&self, reserve: Reserve) -> Result<Reserve, LedgerError> {
        reserve.validate()?;
        self.reserves.insert(reserve.clone())?;
        info!(
            reserve = %reserve.id(),
            balance = %reserve.current_balance(),
            "reserve created"
        );
        Ok(reserve)
    }

    pub fn reserves(&self) -> Result<Vec<Reserve>, LedgerError> {
        Ok(self.reserves.find_all()?)
    }

    pub fn reserves_for_user(&self, user_id: RecordId) -> Result<Vec<Reserve>, LedgerError> {
        Ok(self
            .reserves
            .find_by_filter(&|reserve| reserve.user_id() == user_id)?)
    }

    pub fn reserve(&self, reserve_id: RecordId) -> Result<Reserve, LedgerError> {
        self.reserves
            .find_by_id(reserve_id)?
            .ok_or(LedgerError::NotFound("reserve"))
    }

    /// Replaces the whole reserve record. The last write wins.
    pub fn update_reserve(&self, reserve: Reserve) -> Result<(), LedgerError> {
        reserve.validate()?;
        let reserve_id = reserve.id();
        self.with_lock(reserve_id, || {
            if !self.reserves.replace(reserve_id, reserve)? {
                return Err(LedgerError::NotFound("reserve"));
            }
            Ok(())
        })?;
        debug!(reserve = %reserve_id, "reserve replaced");
        Ok(())
    }

    /// Deletes the reserve only. Its ledger entries stay queryable.
    pub fn delete_reserve(&self, reserve_id: RecordId) -> Result<(), LedgerError> {
        self.with_lock(reserve_id, || {
            if !self.reserves.delete(reserve_id)? {
                return Err(LedgerError::NotFound("reserve"));
            }
            Ok(())
        })?;
        info!(reserve = %reserve_id, "reserve deleted");
        Ok(())
    }

    /// Takes money out of a reserve and records a [`TransactionKind::Use`] entry.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::NotFound`] - Reserve does not exist.
    /// - [`LedgerError::InsufficientBalance`] - Amount exceeds the current balance.
    /// - [`LedgerError::Store`] - The store failed; the balance is left unchanged.
    pub fn use_reserve(
        &self,
        reserve_id: RecordId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<ReserveTransaction, LedgerError> {
        self.apply(reserve_id, TransactionKind::Use, amount, description.into())
    }

    /// Puts money into a reserve and records a [`TransactionKind::Add`] entry.
    ///
    /// There is no upper bound on the balance.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] - Amount is zero or negative.
    /// - [`LedgerError::NotFound`] - Reserve does not exist.
    /// - [`LedgerError::Store`] - The store failed; the balance is left unchanged.
    pub fn add_to_reserve(
        &self,
        reserve_id: RecordId,
        amount: Decimal,
        description: impl Into<String>,
    ) -> Result<ReserveTransaction, LedgerError> {
        self.apply(reserve_id, TransactionKind::Add, amount, description.into())
    }

    fn apply(
        &self,
        reserve_id: RecordId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> Result<ReserveTransaction, LedgerError> {
        // Reject before touching the store
        if amount <= Decimal::ZERO {
            warn!(reserve = %reserve_id, %kind, %amount, "rejected non-positive amount");
            return Err(LedgerError::InvalidAmount);
        }

        self.with_lock(reserve_id, || {
            self.apply_locked(reserve_id, kind, amount, description)
        })
    }

    fn apply_locked(
        &self,
        reserve_id: RecordId,
        kind: TransactionKind,
        amount: Decimal,
        description: String,
    ) -> Result<ReserveTransaction, LedgerError> {
        let original = self.reserve(reserve_id)?;
        let mut updated = original.clone();
        let moved = match kind {
            TransactionKind::Use => updated.debit(amount),
            TransactionKind::Add => updated.credit(amount),
        };
        if let Err(e) = moved {
            warn!(reserve = %reserve_id, %kind, %amount, error = %e, "reserve movement rejected");
            return Err(e);
        }

        if !self.reserves.replace(reserve_id, updated.clone())? {
            return Err(LedgerError::NotFound("reserve"));
        }

        let transaction = ReserveTransaction::new(reserve_id, kind, amount, description);
        if let Err(e) = self.transactions.insert(transaction.clone()) {
            self.restore(&original, &e);
            return Err(e.into());
        }

        info!(
            reserve = %reserve_id,
            transaction = %transaction.id(),
            %kind,
            %amount,
            balance = %updated.current_balance(),
            "reserve movement recorded"
        );
        Ok(transaction)
    }

    /// Writes back the pre-movement reserve after a failed ledger append.
    fn restore(&self, original: &Reserve, cause: &StoreError) {
        match self.reserves.replace(original.id(), original.clone()) {
            Ok(_) => warn!(
                reserve = %original.id(),
                %cause,
                "ledger append failed, balance restored"
            ),
            Err(restore_error) => error!(
                reserve = %original.id(),
                %cause,
                %restore_error,
                "ledger append failed and balance could not be restored"
            ),
        }
    }

    /// Returns every ledger entry of a reserve in store order.
    ///
    /// Works for deleted reserves too.
    pub fn transactions_for(
        &self,
        reserve_id: RecordId,
    ) -> Result<Vec<ReserveTransaction>, LedgerError> {
        Ok(self
            .transactions
            .find_by_filter(&|transaction| transaction.reserve_id() == reserve_id)?)
    }

    pub fn aggregate_reserves(
        &self,
        pipeline: &Pipeline<'_, Reserve>,
    ) -> Result<Vec<Group>, LedgerError> {
        Ok(self.reserves.aggregate(pipeline)?)
    }

    pub fn aggregate_transactions(
        &self,
        pipeline: &Pipeline<'_, ReserveTransaction>,
    ) -> Result<Vec<Group>, LedgerError> {
        Ok(self.transactions.aggregate(pipeline)?)
    }

    /// Checks `initial_value + adds - uses == current_balance` for a reserve.
    pub fn reconcile(&self, reserve_id: RecordId) -> Result<Reconciliation, LedgerError> {
        self.with_lock(reserve_id, || self.reconcile_locked(reserve_id))
    }

    fn reconcile_locked(&self, reserve_id: RecordId) -> Result<Reconciliation, LedgerError> {
        let reserve = self.reserve(reserve_id)?;
        let net_movement: Decimal = self
            .transactions_for(reserve_id)?
            .iter()
            .map(ReserveTransaction::signed_amount)
            .sum();
        let expected_balance = reserve.initial_value() + net_movement;

        Ok(Reconciliation {
            reserve_id,
            initial_value: reserve.initial_value(),
            net_movement,
            expected_balance,
            current_balance: reserve.current_balance(),
            consistent: expected_balance == reserve.current_balance(),
        })
    }
}

impl Default for ReserveLedger {
    fn default() -> Self {
        Self::in_memory()
    }
}
