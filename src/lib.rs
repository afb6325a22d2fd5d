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

//! # Reserve Ledger
//!
//! This library provides the backend of a personal finance tracker: monthly
//! credits, debits and closing balances, plus reserves whose balance only
//! moves through an append-only transaction ledger.
//!
//! ## Core Components
//!
//! - [`ReserveLedger`]: Moves reserve balances and records every use and add
//! - [`Reserve`]: Named pool of money with a running balance
//! - [`ReserveTransaction`]: Immutable ledger entry
//! - [`Repository`]: Generic CRUD over credits, debits and final balances
//! - [`Dashboard`]: Monthly and range-based aggregations
//! - [`LedgerError`]: Error types for every service
//!
//! ## Example
//!
//! ```
//! use reserve_ledger_rs::{Period, RecordId, Reserve, ReserveLedger, TransactionKind};
//! use rust_decimal_macros::dec;
//!
//! let ledger = ReserveLedger::in_memory();
//! let reserve = ledger
//!     .create_reserve(Reserve::new(
//!         RecordId::new(),
//!         "car",
//!         dec!(1000),
//!         dec!(1000),
//!         Period::new(3, 2025).unwrap(),
//!     ))
//!     .unwrap();
//!
//! let entry = ledger.use_reserve(reserve.id(), dec!(300), "carro").unwrap();
//! assert_eq!(entry.kind(), TransactionKind::Use);
//! assert_eq!(ledger.reserve(reserve.id()).unwrap().current_balance(), dec!(700));
//! ```
//!
//! ## Thread Safety
//!
//! Services are `Send + Sync` and meant to be shared behind an `Arc`. The
//! ledger serializes balance changes per reserve, so concurrent uses and adds
//! never lose an update.

pub mod aggregate;
pub mod api;
pub mod auth;
mod base;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod export;
pub mod ledger;
pub mod records;
pub mod repository;
pub mod reserve;
pub mod store;

pub use auth::{User, UserService};
pub use base::{Period, RecordId};
pub use dashboard::Dashboard;
pub use error::{LedgerError, StoreError};
pub use ledger::{Reconciliation, ReserveLedger};
pub use records::{Credit, Debit, FinalBalance};
pub use repository::Repository;
pub use reserve::{Reserve, ReserveTransaction, TransactionKind};
pub use store::{Collection, Document, MemoryCollection};
