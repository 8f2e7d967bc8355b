// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The abstract transactional store contract.
//!
//! A [`Store`] runs closures as serializable transactions. The closure
//! receives a [`Ctx`] exposing `get`, `range`, `set`, and `delete`
//! over an ordered byte-key/byte-value mapping; if the closure returns
//! `Ok` and the backend detects no consistency conflict, the
//! transaction commits and its effects become visible to every later
//! transaction. On conflict the closure is discarded and run again
//! with a fresh context, so closures must be free of side effects
//! beyond their use of the context, and any captured output variables
//! must be reinitialized at the start of the closure.
//!
//! # Example
//!
//! ```
//! use rubidium::mem::MemStore;
//! use rubidium::{Ctx, Pair, RangeQuery, Store};
//!
//! let store = MemStore::new();
//!
//! store.run_tx(&mut |ctx| {
//!     ctx.set(Pair::new("counter", "1"))?;
//!     Ok(())
//! }).unwrap();
//!
//! let mut count = 0;
//! store.run_read_tx(&mut |ctx| {
//!     count = ctx.range(RangeQuery::all())?.len();
//!     Ok(())
//! }).unwrap();
//! assert_eq!(count, 1);
//! ```

mod error;
mod logging;
mod pair;
mod registry;
mod sub;
mod watch;

#[cfg(test)]
pub(crate) mod scenarios;

pub use error::{Error, Result};
pub use logging::LoggingStore;
pub use pair::{Pair, RangeQuery};
pub use registry::{open_backend, register_backend};
pub use sub::{SubCtx, SubStore};
pub use watch::WatchSignal;

use std::sync::Arc;

/// A transaction body.
///
/// The closure may be invoked multiple times before `run_tx`,
/// `run_read_tx`, or `watch_tx` return, regardless of whether any
/// operation on the context returned an error.
pub type Tx<'a> = &'a mut dyn FnMut(&mut dyn Ctx) -> Result<()>;

/// The per-transaction handle passed to transaction closures.
///
/// If the surrounding transaction commits, the operations performed
/// on a context appear to have executed atomically at a single
/// logical instant between the commit points of concurrent
/// transactions.
pub trait Ctx {
    /// Returns the pair stored under `key`, or [`Error::NotFound`].
    ///
    /// The returned pair is owned by the caller.
    fn get(&mut self, key: &[u8]) -> Result<Pair>;

    /// Returns all pairs in the half-open range described by `query`,
    /// sorted and truncated as requested.
    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>>;

    /// Upserts `pair`. Fails with [`Error::ReadOnlyTx`] in a read
    /// transaction.
    fn set(&mut self, pair: Pair) -> Result<()>;

    /// Removes the pair stored under `key`. Fails with
    /// [`Error::NotFound`] if no such key exists and with
    /// [`Error::ReadOnlyTx`] in a read transaction.
    fn delete(&mut self, key: &[u8]) -> Result<()>;
}

/// A handle onto a registered watch.
///
/// Returned by [`Store::watch_tx`]. The caller is responsible for
/// calling [`Watch::close`] when the watch is no longer needed.
pub trait Watch: Send + Sync {
    /// Returns the completion signal, fired after the keys and ranges
    /// read by the watch transaction change.
    ///
    /// Backends may occasionally fire the signal when the watched
    /// region has not actually changed.
    fn done(&self) -> WatchSignal;

    /// Returns the error observed while waiting, if any, once the
    /// completion signal has fired.
    fn error(&self) -> Option<Error>;

    /// Fires the completion signal if it has not fired yet and
    /// releases the resources held by the watch. Idempotent.
    fn close(&self);
}

/// A database of serializable transactions.
///
/// Implementations may retry a transaction closure any number of
/// times; even read-only transactions can be retried.
pub trait Store: Send + Sync {
    /// Runs `tx` as a read/write transaction, retrying on conflict.
    fn run_tx(&self, tx: Tx<'_>) -> Result<()>;

    /// Runs `tx` as a read-only transaction. Write operations on the
    /// context fail with [`Error::ReadOnlyTx`].
    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()>;

    /// Runs `tx` as a read-only transaction and additionally,
    /// atomically, registers a watch on the exact keys and ranges it
    /// read.
    ///
    /// Backends without watch support fail with
    /// [`Error::WatchUnsupported`] and do not run the transaction.
    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>>;

    /// Releases resources held by the store. The behavior of
    /// concurrently executing transactions and watches is undefined;
    /// the store must not be used afterwards.
    fn close(&self);
}

impl<S: Store + ?Sized> Store for &S {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_tx(tx)
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_read_tx(tx)
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        (**self).watch_tx(tx)
    }

    fn close(&self) {
        (**self).close()
    }
}

impl<S: Store + ?Sized> Store for Arc<S> {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_tx(tx)
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_read_tx(tx)
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        (**self).watch_tx(tx)
    }

    fn close(&self) {
        (**self).close()
    }
}

impl<S: Store + ?Sized> Store for Box<S> {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_tx(tx)
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        (**self).run_read_tx(tx)
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        (**self).watch_tx(tx)
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Value-returning convenience wrappers over [`Store`].
pub trait StoreExt: Store {
    /// Runs a read/write transaction whose closure returns a value.
    fn with_tx<T, F>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&mut dyn Ctx) -> Result<T>,
    {
        let mut out = None;
        self.run_tx(&mut |ctx| {
            out = Some(f(ctx)?);
            Ok(())
        })?;
        match out {
            Some(v) => Ok(v),
            None => unreachable!("committed transaction ran zero attempts"),
        }
    }

    /// Runs a read-only transaction whose closure returns a value.
    fn with_read_tx<T, F>(&self, mut f: F) -> Result<T>
    where
        F: FnMut(&mut dyn Ctx) -> Result<T>,
    {
        let mut out = None;
        self.run_read_tx(&mut |ctx| {
            out = Some(f(ctx)?);
            Ok(())
        })?;
        match out {
            Some(v) => Ok(v),
            None => unreachable!("committed transaction ran zero attempts"),
        }
    }
}

impl<S: Store + ?Sized> StoreExt for S {}
