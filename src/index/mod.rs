// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Transactional secondary indexing.
//!
//! An indexer is a deterministic function from a data pair to the
//! list of index pairs that must exist while that data pair is
//! present; it must return an empty list for the zero pair. Wrapping
//! a transaction context in [`Indexed`] keeps the index in lock-step
//! with the data on every write, within the same transaction.
//!
//! Data and index pairs live under fixed tuple-encoded key prefixes
//! of the wrapped context, so an [`Indexed`] over a store's root
//! context and a [`reindex`] pass over the same store see the same
//! namespaces.
//!
//! # Example
//!
//! ```
//! use rubidium::index::Indexed;
//! use rubidium::mem::MemStore;
//! use rubidium::{Ctx, Pair, Store};
//!
//! let flip = |p: &Pair| {
//!     if p.is_zero() {
//!         vec![]
//!     } else {
//!         vec![Pair::new(p.value.clone(), p.key.clone())]
//!     }
//! };
//!
//! let store = MemStore::new();
//! store.run_tx(&mut |ctx| {
//!     let mut indexed = Indexed::open(ctx, flip)?;
//!     indexed.set(Pair::new("hello", "world"))?;
//!     assert_eq!(indexed.index_get(b"world")?.value, b"hello");
//!     Ok(())
//! }).unwrap();
//! ```

mod bloom;
mod reindex;

pub use reindex::{reindex, ReindexOptions, ReindexStats};

use crate::store::{Ctx, Error, Pair, RangeQuery, Result, SubCtx};

/// Tuple encoding of `"data"`: the namespace prefix for data pairs.
pub(crate) const DATA_PREFIX: &[u8] = &[0x80, b'd', b'a', b't', b'a', 0x00];

/// Tuple encoding of `"index"`: the namespace prefix for index pairs.
pub(crate) const INDEX_PREFIX: &[u8] = &[0x80, b'i', b'n', b'd', b'e', b'x', 0x00];

/// A context wrapper that maintains derived index entries alongside
/// every data write.
///
/// The four [`Ctx`] operations address the data namespace;
/// [`Indexed::index_get`] and [`Indexed::index_range`] address the
/// index namespace.
pub struct Indexed<'a, F> {
    ctx: &'a mut dyn Ctx,
    indexer: F,
}

impl<'a, F: Fn(&Pair) -> Vec<Pair>> Indexed<'a, F> {
    /// Wraps `ctx` with the given indexer.
    ///
    /// Fails with [`Error::BadIndexer`] if the indexer returns
    /// entries for the zero pair.
    pub fn open(ctx: &'a mut dyn Ctx, indexer: F) -> Result<Self> {
        if !indexer(&Pair::ZERO).is_empty() {
            return Err(Error::BadIndexer);
        }
        Ok(Self { ctx, indexer })
    }

    fn data(&mut self) -> SubCtx<'_> {
        SubCtx::new(&mut *self.ctx, DATA_PREFIX)
    }

    fn index(&mut self) -> SubCtx<'_> {
        SubCtx::new(&mut *self.ctx, INDEX_PREFIX)
    }

    /// Returns the index pair stored under `key`.
    pub fn index_get(&mut self, key: &[u8]) -> Result<Pair> {
        self.index().get(key)
    }

    /// Ranges over the index namespace.
    pub fn index_range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        self.index().range(query)
    }

    /// Applies the index delta between `old` and `new` derivations.
    ///
    /// Removals match by key; additions match by full pair, so a
    /// changed value under an unchanged index key is replaced via
    /// delete-then-set. A foreign entry occupying a new key is a
    /// uniqueness violation.
    fn switch_index_values(&mut self, old: &Pair, new: &Pair) -> Result<()> {
        let old_entries = (self.indexer)(old);
        let new_entries = (self.indexer)(new);

        for removed in &old_entries {
            if new_entries.iter().any(|e| e.key == removed.key) {
                continue;
            }
            match self.index().delete(&removed.key) {
                Ok(()) => {}
                Err(Error::NotFound) => return Err(Error::UnexpectedlyMissingEntry),
                Err(err) => return Err(err),
            }
        }

        for added in &new_entries {
            if old_entries.iter().any(|e| e == added) {
                continue;
            }
            if old_entries.iter().any(|e| e.key == added.key) {
                match self.index().delete(&added.key) {
                    Ok(()) => {}
                    Err(Error::NotFound) => return Err(Error::UnexpectedlyMissingEntry),
                    Err(err) => return Err(err),
                }
            } else {
                match self.index().get(&added.key) {
                    Err(Error::NotFound) => {}
                    Ok(_) => return Err(Error::UnexpectedlyPresentEntry),
                    Err(err) => return Err(err),
                }
            }
            self.index().set(added.clone())?;
        }

        Ok(())
    }
}

impl<F: Fn(&Pair) -> Vec<Pair>> Ctx for Indexed<'_, F> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        self.data().get(key)
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        self.data().range(query)
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        let old = match self.data().get(&pair.key) {
            Ok(old) => old,
            Err(Error::NotFound) => Pair::ZERO,
            Err(err) => return Err(err),
        };
        self.switch_index_values(&old, &pair)?;
        self.data().set(pair)
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        let old = self.data().get(key)?;
        self.switch_index_values(&old, &Pair::ZERO)?;
        self.data().delete(key)
    }
}
