// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Observational logging decorator.
//!
//! Wraps any store and emits one `tracing` line per transaction and
//! per context operation, including the operation's result. The
//! wrapped store's contract is otherwise unchanged.

use tracing::debug;

use super::{Ctx, Pair, RangeQuery, Result, Store, Tx, Watch};

/// A store decorator that logs every transaction and operation.
#[derive(Debug, Clone)]
pub struct LoggingStore<S> {
    inner: S,
}

impl<S: Store> LoggingStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Returns the wrapped store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for LoggingStore<S> {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        debug!("run_tx starting");
        let result = self.inner.run_tx(&mut |ctx| {
            let mut logged = LoggingCtx { inner: ctx };
            tx(&mut logged)
        });
        debug!(ok = result.is_ok(), "run_tx returning");
        result
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        debug!("run_read_tx starting");
        let result = self.inner.run_read_tx(&mut |ctx| {
            let mut logged = LoggingCtx { inner: ctx };
            tx(&mut logged)
        });
        debug!(ok = result.is_ok(), "run_read_tx returning");
        result
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        debug!("watch_tx starting");
        let result = self.inner.watch_tx(&mut |ctx| {
            let mut logged = LoggingCtx { inner: ctx };
            tx(&mut logged)
        });
        debug!(ok = result.is_ok(), "watch_tx returning");
        result
    }

    fn close(&self) {
        self.inner.close();
        debug!("close");
    }
}

struct LoggingCtx<'a> {
    inner: &'a mut dyn Ctx,
}

impl Ctx for LoggingCtx<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        let result = self.inner.get(key);
        match &result {
            Ok(pair) => debug!(key = ?String::from_utf8_lossy(key), %pair, "get"),
            Err(err) => debug!(key = ?String::from_utf8_lossy(key), %err, "get"),
        }
        result
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        let result = self.inner.range(query.clone());
        match &result {
            Ok(pairs) => debug!(?query, pairs = pairs.len(), "range"),
            Err(err) => debug!(?query, %err, "range"),
        }
        result
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        let shown = pair.to_string();
        let result = self.inner.set(pair);
        match &result {
            Ok(()) => debug!(pair = %shown, "set"),
            Err(err) => debug!(pair = %shown, %err, "set"),
        }
        result
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let result = self.inner.delete(key);
        match &result {
            Ok(()) => debug!(key = ?String::from_utf8_lossy(key), "delete"),
            Err(err) => debug!(key = ?String::from_utf8_lossy(key), %err, "delete"),
        }
        result
    }
}
