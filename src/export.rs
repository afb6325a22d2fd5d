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

use crate::reserve::ReserveTransaction;
use csv::Writer;
use serde::Serialize;
use std::io::Write;

/// One CSV row. Amounts are written with 4 decimal places.
#[derive(Debug, Serialize)]
struct TransactionRow<'a> {
    id: String,
    reserve_id: String,
    kind: String,
    amount: String,
    timestamp: String,
    description: &'a str,
}

impl<'a> From<&'a ReserveTransaction> for TransactionRow<'a> {
    fn from(transaction: &'a ReserveTransaction) -> Self {
        Self {
            id: transaction.id().to_string(),
            reserve_id: transaction.reserve_id().to_string(),
            kind: transaction.kind().to_string(),
            amount: format!("{:.4}", transaction.amount().round_dp(4)),
            timestamp: transaction.timestamp().to_rfc3339(),
            description: transaction.description(),
        }
    }
}

/// Write ledger entries to a CSV writer
///
/// # CSV Format
///
/// Columns: `id, reserve_id, kind, amount, timestamp, description`
///
/// ```csv
/// id,reserve_id,kind,amount,timestamp,description
/// 65f1a2b3c4d5e6f708192a3b,65f1a2b3c4d5e6f708192a3a,Use,300.0000,2025-03-02T10:15:00+00:00,carro
/// ```
///
/// # Errors
///
/// Returns a CSV error if writing fails.
pub fn write_transactions<W: Write>(
    transactions: &[ReserveTransaction],
    writer: W,
) -> Result<(), csv::Error> {
    let mut wtr = Writer::from_writer(writer);

    // The header comes from the first serialized row
    if transactions.is_empty() {
        wtr.write_record(["id", "reserve_id", "kind", "amount", "timestamp", "description"])?;
    }
    for transaction in transactions {
        wtr.serialize(TransactionRow::from(transaction))?;
    }

    wtr.flush()?;
    Ok(())
}
