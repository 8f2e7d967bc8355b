// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Storage backends beyond the reference engine.
//!
//! Both adapters satisfy the [`crate::Store`] contract; neither
//! supports watch transactions.

mod file;
mod sql;

pub use file::FileStore;
pub use sql::SqlStore;

use crate::mem::MemStore;
use crate::store::{register_backend, Store};

/// Registers the built-in backends ("mem", "file", "sql") with the
/// process-wide registry.
///
/// # Panics
///
/// Panics if called twice, like any duplicate registration.
pub fn register_builtin_backends() {
    register_backend("mem", |_dsn| {
        Ok(Box::new(MemStore::new()) as Box<dyn Store>)
    });
    register_backend("file", |dsn| {
        FileStore::open(dsn).map(|store| Box::new(store) as Box<dyn Store>)
    });
    register_backend("sql", |dsn| {
        SqlStore::open(dsn).map(|store| Box::new(store) as Box<dyn Store>)
    });
}
