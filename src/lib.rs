// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Rubidium: an embeddable transactional ordered key-value library
//! with serializable snapshot isolation.
//!
//! A [`Store`] runs closures as serializable transactions over an
//! ordered mapping from byte keys to byte values. The in-memory
//! reference engine ([`mem::MemStore`]) detects conflicts against
//! both point reads and range reads at commit time and is the
//! correctness baseline for the file-backed and SQL-backed
//! implementations in [`backend`]. Layered on top are a prefix-scoped
//! view ([`SubStore`]), a secondary-index maintainer
//! ([`index::Indexed`]) with bulk reconciliation
//! ([`index::reindex`]), and an order-preserving tuple codec
//! ([`tuple`]) for composing structured keys.

pub mod backend;
pub mod index;
pub mod keys;
pub mod mem;
pub mod store;
pub mod tuple;

pub use store::{
    open_backend, register_backend, Ctx, Error, LoggingStore, Pair, RangeQuery, Result, Store,
    StoreExt, SubCtx, SubStore, Tx, Watch, WatchSignal,
};
