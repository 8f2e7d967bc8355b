// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Process-wide backend registry.
//!
//! Maps short backend names to constructors so callers can open a
//! store from a `(name, dsn)` pair without linking against a
//! concrete backend type.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{Error, Result, Store};

type Constructor = fn(&str) -> Result<Box<dyn Store>>;

static REGISTRY: Mutex<BTreeMap<&'static str, Constructor>> = Mutex::new(BTreeMap::new());

/// Registers a backend constructor under `name`.
///
/// # Panics
///
/// Panics if `name` is already registered; registering the same
/// backend twice is a programming error.
pub fn register_backend(name: &'static str, constructor: Constructor) {
    let mut registry = REGISTRY.lock();
    if registry.contains_key(name) {
        panic!("store backend {name:?} already registered");
    }
    registry.insert(name, constructor);
}

/// Opens a store through the registered constructor for `name`.
pub fn open_backend(name: &str, dsn: &str) -> Result<Box<dyn Store>> {
    let constructor = {
        let registry = REGISTRY.lock();
        match registry.get(name) {
            Some(c) => *c,
            None => return Err(Error::UnknownBackend(name.to_string())),
        }
    };
    constructor(dsn)
}
