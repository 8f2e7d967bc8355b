// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Embedded single-file backend.
//!
//! Stores all pairs in one named table of a [`redb`] database. Write
//! transactions are serialized by the underlying engine, so the
//! closure runs exactly once per `run_tx`; read transactions observe
//! the state at their start. Watches are not supported.

use std::ops::Bound;
use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition, TableError};

use crate::store::{Ctx, Error, Pair, RangeQuery, Result, Store, Tx, Watch};

const TABLE: TableDefinition<&[u8], &[u8]> = TableDefinition::new("rubidium");

/// A store backed by a single database file, created on open if
/// necessary with permissions subject to the process umask.
pub struct FileStore {
    db: Database,
}

impl FileStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;
        Ok(Self { db })
    }
}

impl Store for FileStore {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        let write_tx = self.db.begin_write().map_err(redb::Error::from)?;
        let result = {
            let table = write_tx.open_table(TABLE).map_err(redb::Error::from)?;
            let mut ctx = FileWriteCtx { table };
            tx(&mut ctx)
        };
        match result {
            Ok(()) => {
                write_tx.commit().map_err(redb::Error::from)?;
                Ok(())
            }
            Err(err) => {
                // The closure's error is the interesting one.
                let _ = write_tx.abort();
                Err(err)
            }
        }
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        let read_tx = self.db.begin_read().map_err(redb::Error::from)?;
        // A database no write transaction has touched yet has no
        // table; it reads as empty.
        let table = match read_tx.open_table(TABLE) {
            Ok(table) => Some(table),
            Err(TableError::TableDoesNotExist(_)) => None,
            Err(err) => return Err(redb::Error::from(err).into()),
        };
        let mut ctx = FileReadCtx { table };
        tx(&mut ctx)
    }

    fn watch_tx(&self, _tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        Err(Error::WatchUnsupported)
    }

    fn close(&self) {
        // The file handle is released when the store drops.
    }
}

fn collect_range(
    table: &impl ReadableTable<&'static [u8], &'static [u8]>,
    query: &RangeQuery,
) -> Result<Vec<Pair>> {
    // An empty half-open interval; redb rejects inverted bounds.
    if !query.low.is_empty() && !query.high.is_empty() && query.low >= query.high {
        return Ok(Vec::new());
    }

    let lower = if query.low.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(query.low.as_slice())
    };
    let upper = if query.high.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(query.high.as_slice())
    };

    let iter = table
        .range::<&[u8]>((lower, upper))
        .map_err(redb::Error::from)?;

    let mut pairs = Vec::new();
    let limit = if query.limit > 0 {
        query.limit as usize
    } else {
        usize::MAX
    };

    if query.descending {
        for item in iter.rev() {
            let (key, value) = item.map_err(redb::Error::from)?;
            pairs.push(Pair {
                key: key.value().to_vec(),
                value: value.value().to_vec(),
            });
            if pairs.len() >= limit {
                break;
            }
        }
    } else {
        for item in iter {
            let (key, value) = item.map_err(redb::Error::from)?;
            pairs.push(Pair {
                key: key.value().to_vec(),
                value: value.value().to_vec(),
            });
            if pairs.len() >= limit {
                break;
            }
        }
    }

    Ok(pairs)
}

struct FileWriteCtx<'txn> {
    table: redb::Table<'txn, &'static [u8], &'static [u8]>,
}

impl Ctx for FileWriteCtx<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        match self.table.get(key).map_err(redb::Error::from)? {
            Some(value) => Ok(Pair {
                key: key.to_vec(),
                value: value.value().to_vec(),
            }),
            None => Err(Error::NotFound),
        }
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        collect_range(&self.table, &query)
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        self.table
            .insert(pair.key.as_slice(), pair.value.as_slice())
            .map_err(redb::Error::from)?;
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        match self.table.remove(key).map_err(redb::Error::from)? {
            Some(_) => Ok(()),
            None => Err(Error::NotFound),
        }
    }
}

struct FileReadCtx {
    table: Option<redb::ReadOnlyTable<&'static [u8], &'static [u8]>>,
}

impl Ctx for FileReadCtx {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        let table = match &self.table {
            Some(table) => table,
            None => return Err(Error::NotFound),
        };
        match table.get(key).map_err(redb::Error::from)? {
            Some(value) => Ok(Pair {
                key: key.to_vec(),
                value: value.value().to_vec(),
            }),
            None => Err(Error::NotFound),
        }
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        match &self.table {
            Some(table) => collect_range(table, &query),
            None => Ok(Vec::new()),
        }
    }

    fn set(&mut self, _pair: Pair) -> Result<()> {
        Err(Error::ReadOnlyTx)
    }

    fn delete(&mut self, _key: &[u8]) -> Result<()> {
        Err(Error::ReadOnlyTx)
    }
}
