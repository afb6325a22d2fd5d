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

//! Integration tests for the reserve ledger service.

use reserve_ledger_rs::{
    Collection, LedgerError, MemoryCollection, Period, RecordId, Reserve, ReserveLedger,
    ReserveTransaction, StoreError, TransactionKind,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

fn reserve(balance: Decimal) -> Reserve {
    Reserve::new(
        RecordId::new(),
        "emergency fund",
        balance,
        balance,
        Period::new(3, 2025).unwrap(),
    )
}

fn ledger_with(balance: Decimal) -> (ReserveLedger, RecordId) {
    let ledger = ReserveLedger::in_memory();
    let id = ledger.create_reserve(reserve(balance)).unwrap().id();
    (ledger, id)
}

fn balance(ledger: &ReserveLedger, id: RecordId) -> Decimal {
    ledger.reserve(id).unwrap().current_balance()
}

// === Use ===

#[test]
fn use_within_balance_debits_and_records_one_entry() {
    let (ledger, id) = ledger_with(dec!(100));

    let entry = ledger.use_reserve(id, dec!(40), "groceries").unwrap();

    assert_eq!(balance(&ledger, id), dec!(60));
    assert_eq!(entry.kind(), TransactionKind::Use);
    assert_eq!(entry.amount(), dec!(40));
    assert_eq!(entry.reserve_id(), id);
    assert_eq!(entry.description(), "groceries");
    assert_eq!(ledger.transactions_for(id).unwrap(), vec![entry]);
}

#[test]
fn use_of_entire_balance_reaches_zero() {
    let (ledger, id) = ledger_with(dec!(25.50));
    ledger.use_reserve(id, dec!(25.50), "all of it").unwrap();
    assert_eq!(balance(&ledger, id), Decimal::ZERO);
}

#[test]
fn use_above_balance_changes_nothing() {
    let (ledger, id) = ledger_with(dec!(50));

    let result = ledger.use_reserve(id, dec!(100), "too much");

    assert_eq!(
        result,
        Err(LedgerError::InsufficientBalance {
            requested: dec!(100),
            available: dec!(50),
        })
    );
    assert_eq!(balance(&ledger, id), dec!(50));
    assert!(ledger.transactions_for(id).unwrap().is_empty());
}

// === Add ===

#[test]
fn add_credits_and_records_one_entry() {
    let (ledger, id) = ledger_with(dec!(10));

    let entry = ledger.add_to_reserve(id, dec!(0.01), "").unwrap();

    assert_eq!(balance(&ledger, id), dec!(10.01));
    assert_eq!(entry.kind(), TransactionKind::Add);
    assert_eq!(entry.amount(), dec!(0.01));
    assert_eq!(ledger.transactions_for(id).unwrap().len(), 1);
}

#[test]
fn add_to_empty_reserve() {
    let (ledger, id) = ledger_with(Decimal::ZERO);
    ledger.add_to_reserve(id, dec!(500), "salary").unwrap();
    assert_eq!(balance(&ledger, id), dec!(500));
}

// === Validation ===

#[test]
fn non_positive_amounts_are_rejected_without_mutation() {
    let (ledger, id) = ledger_with(dec!(100));

    for amount in [Decimal::ZERO, dec!(-1), dec!(-0.0001)] {
        assert_eq!(ledger.use_reserve(id, amount, "x"), Err(LedgerError::InvalidAmount));
        assert_eq!(ledger.add_to_reserve(id, amount, "x"), Err(LedgerError::InvalidAmount));
    }

    assert_eq!(balance(&ledger, id), dec!(100));
    assert!(ledger.transactions_for(id).unwrap().is_empty());
}

#[test]
fn invalid_amount_wins_over_missing_reserve() {
    let ledger = ReserveLedger::in_memory();
    assert_eq!(
        ledger.use_reserve(RecordId::new(), dec!(-5), "x"),
        Err(LedgerError::InvalidAmount)
    );
}

#[test]
fn movements_on_missing_reserve_are_not_found() {
    let ledger = ReserveLedger::in_memory();
    let missing = RecordId::new();
    assert_eq!(
        ledger.use_reserve(missing, dec!(1), "x"),
        Err(LedgerError::NotFound("reserve"))
    );
    assert_eq!(
        ledger.add_to_reserve(missing, dec!(1), "x"),
        Err(LedgerError::NotFound("reserve"))
    );
}

#[test]
fn malformed_ids_are_validation_errors() {
    let err = "not-an-id".parse::<RecordId>().unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err, LedgerError::MalformedId("not-an-id".to_string()));
}

#[test]
fn reserve_with_negative_balance_is_not_created() {
    let ledger = ReserveLedger::in_memory();
    let result = ledger.create_reserve(reserve(dec!(-1)));
    assert!(matches!(result, Err(LedgerError::InvalidField { .. })));
    assert!(ledger.reserves().unwrap().is_empty());
}

// === Scenarios ===

#[test]
fn use_then_add_scenario() {
    let (ledger, id) = ledger_with(dec!(1000));

    ledger.use_reserve(id, dec!(300), "carro").unwrap();
    assert_eq!(balance(&ledger, id), dec!(700));

    ledger.add_to_reserve(id, dec!(150), "sobra").unwrap();
    assert_eq!(balance(&ledger, id), dec!(850));

    let entries = ledger.transactions_for(id).unwrap();
    let summary: Vec<_> = entries
        .iter()
        .map(|t| (t.kind(), t.amount(), t.description().to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (TransactionKind::Use, dec!(300), "carro".to_string()),
            (TransactionKind::Add, dec!(150), "sobra".to_string()),
        ]
    );
}

#[test]
fn transactions_are_scoped_to_their_reserve() {
    let ledger = ReserveLedger::in_memory();
    let first = ledger.create_reserve(reserve(dec!(100))).unwrap().id();
    let second = ledger.create_reserve(reserve(dec!(100))).unwrap().id();

    let a = ledger.use_reserve(first, dec!(1), "a").unwrap();
    ledger.use_reserve(second, dec!(2), "b").unwrap();
    let c = ledger.add_to_reserve(first, dec!(3), "c").unwrap();

    assert_eq!(ledger.transactions_for(first).unwrap(), vec![a, c]);
    assert_eq!(ledger.transactions_for(second).unwrap().len(), 1);
    assert!(ledger.transactions_for(RecordId::new()).unwrap().is_empty());
}

#[test]
fn deleting_a_reserve_keeps_its_history() {
    let (ledger, id) = ledger_with(dec!(100));
    ledger.use_reserve(id, dec!(10), "a").unwrap();
    ledger.add_to_reserve(id, dec!(5), "b").unwrap();

    ledger.delete_reserve(id).unwrap();

    assert_eq!(ledger.reserve(id), Err(LedgerError::NotFound("reserve")));
    assert_eq!(ledger.transactions_for(id).unwrap().len(), 2);
    assert_eq!(ledger.delete_reserve(id), Err(LedgerError::NotFound("reserve")));
}

#[test]
fn reserves_are_listed_per_user() {
    let ledger = ReserveLedger::in_memory();
    let owner = RecordId::new();
    let mine = Reserve::new(owner, "mine", dec!(1), dec!(1), Period::new(1, 2025).unwrap());
    ledger.create_reserve(mine.clone()).unwrap();
    ledger.create_reserve(reserve(dec!(2))).unwrap();

    assert_eq!(ledger.reserves_for_user(owner).unwrap(), vec![mine]);
    assert_eq!(ledger.reserves().unwrap().len(), 2);
}

#[test]
fn reconcile_is_consistent_after_ledger_movements() {
    let (ledger, id) = ledger_with(dec!(1000));
    ledger.use_reserve(id, dec!(300), "carro").unwrap();
    ledger.add_to_reserve(id, dec!(150), "sobra").unwrap();
    let _ = ledger.use_reserve(id, dec!(5000), "rejected");

    let report = ledger.reconcile(id).unwrap();
    assert!(report.consistent);
    assert_eq!(report.net_movement, dec!(-150));
    assert_eq!(report.expected_balance, dec!(850));
}

// === Store failures ===

/// Transaction collection whose inserts fail while `failing` is set.
struct FlakyCollection {
    inner: MemoryCollection<ReserveTransaction>,
    failing: AtomicBool,
}

impl FlakyCollection {
    fn new() -> Self {
        Self {
            inner: MemoryCollection::new(),
            failing: AtomicBool::new(false),
        }
    }
}

impl Collection<ReserveTransaction> for FlakyCollection {
    fn find_all(&self) -> Result<Vec<ReserveTransaction>, StoreError> {
        self.inner.find_all()
    }

    fn find_by_id(&self, id: RecordId) -> Result<Option<ReserveTransaction>, StoreError> {
        self.inner.find_by_id(id)
    }

    fn find_by_filter(
        &self,
        filter: &dyn Fn(&ReserveTransaction) -> bool,
    ) -> Result<Vec<ReserveTransaction>, StoreError> {
        self.inner.find_by_filter(filter)
    }

    fn insert(&self, record: ReserveTransaction) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".to_string()));
        }
        self.inner.insert(record)
    }

    fn replace(&self, id: RecordId, record: ReserveTransaction) -> Result<bool, StoreError> {
        self.inner.replace(id, record)
    }

    fn delete(&self, id: RecordId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }
}

#[test]
fn failed_ledger_append_restores_the_balance() {
    let transactions = Arc::new(FlakyCollection::new());
    let ledger = ReserveLedger::new(
        Arc::new(MemoryCollection::<Reserve>::new()),
        transactions.clone(),
    );
    let id = ledger.create_reserve(reserve(dec!(100))).unwrap().id();

    transactions.failing.store(true, Ordering::SeqCst);
    let result = ledger.use_reserve(id, dec!(30), "x");
    assert_eq!(
        result,
        Err(LedgerError::Store(StoreError::Unavailable(
            "connection reset".to_string()
        )))
    );
    assert_eq!(balance(&ledger, id), dec!(100));
    assert!(ledger.transactions_for(id).unwrap().is_empty());

    // Recovers once the store does
    transactions.failing.store(false, Ordering::SeqCst);
    ledger.add_to_reserve(id, dec!(5), "y").unwrap();
    assert_eq!(balance(&ledger, id), dec!(105));
    assert!(ledger.reconcile(id).unwrap().consistent);
}
