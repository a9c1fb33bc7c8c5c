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

//! Append-only transaction journals.
//!
//! The engine hands every commit batch to a [`Journal`] before the new
//! account state becomes visible. A failed append aborts the whole
//! operation, so the journal never lags behind or runs ahead of balances.

use crate::LedgerError;
use crate::base::TransactionId;
use crate::transaction::Transaction;
use crossbeam::queue::SegQueue;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;

/// Durable sink for committed transactions.
///
/// `append` receives every transaction of one atomic operation at once and
/// must either accept all of them or report [`LedgerError::StoreUnavailable`].
pub trait Journal: Send + Sync {
    fn append(&self, batch: &[Transaction]) -> Result<(), LedgerError>;
}

/// In-memory journal with duplicate detection.
///
/// Combines a [`DashMap`] for O(1) lookup with a [`SegQueue`] of IDs that
/// have not yet been drained to another sink, preserving commit order.
#[derive(Debug, Default)]
pub struct MemoryJournal {
    entries: DashMap<TransactionId, Arc<Transaction>>,
    pending: SegQueue<TransactionId>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: TransactionId) -> Option<Arc<Transaction>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes and returns every entry appended since the last drain, in
    /// commit order. Entries stay available through [`MemoryJournal::get`].
    pub fn drain_pending(&self) -> Vec<Arc<Transaction>> {
        let mut drained = Vec::new();
        while let Some(id) = self.pending.pop() {
            if let Some(entry) = self.get(id) {
                drained.push(entry);
            }
        }
        drained
    }
}

impl Journal for MemoryJournal {
    fn append(&self, batch: &[Transaction]) -> Result<(), LedgerError> {
        let mut inserted = Vec::with_capacity(batch.len());

        for transaction in batch {
            match self.entries.entry(transaction.id) {
                Entry::Occupied(_) => {
                    for id in &inserted {
                        self.entries.remove(id);
                    }
                    return Err(LedgerError::StoreUnavailable(format!(
                        "duplicate transaction id {}",
                        transaction.id
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(transaction.clone()));
                    inserted.push(transaction.id);
                }
            }
        }

        for id in inserted {
            self.pending.push(id);
        }
        Ok(())
    }
}

/// Journal that appends CSV rows to a writer (file, socket, buffer).
pub struct CsvJournal<W: Write + Send> {
    inner: Mutex<W>,
}

impl<W: Write + Send> CsvJournal<W> {
    /// Wraps `writer`, emitting the header row first.
    pub fn new(mut writer: W) -> Result<Self, LedgerError> {
        writer
            .write_all(b"id,account_id,direction,kind,amount,description,created_at\n")
            .map_err(store_error)?;
        Ok(Self {
            inner: Mutex::new(writer),
        })
    }

    pub fn into_inner(self) -> W {
        self.inner.into_inner()
    }
}

impl<W: Write + Send> Journal for CsvJournal<W> {
    fn append(&self, batch: &[Transaction]) -> Result<(), LedgerError> {
        // Encode the whole batch first so a serialization error writes nothing.
        let mut rows = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        for transaction in batch {
            rows.serialize(transaction)
                .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;
        }
        let bytes = rows
            .into_inner()
            .map_err(|e| LedgerError::StoreUnavailable(e.to_string()))?;

        let mut writer = self.inner.lock();
        writer.write_all(&bytes).map_err(store_error)?;
        writer.flush().map_err(store_error)
    }
}

fn store_error(err: std::io::Error) -> LedgerError {
    LedgerError::StoreUnavailable(err.to_string())
}
