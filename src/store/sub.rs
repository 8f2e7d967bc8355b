// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Prefix-scoped store and context views.
//!
//! A sub view rebrands the contiguous key region starting with a
//! prefix as its own logical store: outbound keys get the prefix
//! prepended, inbound keys get it stripped, and an empty upper range
//! bound continues to mean "to the end of the sub view".

use crate::keys;

use super::{Ctx, Pair, RangeQuery, Result, Store, Tx, Watch};

fn prepend(prefix: &[u8], key: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(prefix.len() + key.len());
    out.extend_from_slice(prefix);
    out.extend_from_slice(key);
    out
}

/// A store whose transactions see only the keys under `prefix`,
/// with the prefix stripped.
///
/// `close` on a sub view is a no-op; the inner store's lifecycle is
/// managed by its owner.
#[derive(Debug, Clone)]
pub struct SubStore<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S: Store> SubStore<S> {
    /// Wraps `inner`, scoping every transaction context to `prefix`.
    pub fn new(inner: S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Narrows this view by a further prefix.
    ///
    /// The two prefixes collapse into a single concatenated one, so
    /// chained views cost no more key copies than a single view.
    pub fn sub(mut self, prefix: &[u8]) -> SubStore<S> {
        self.prefix.extend_from_slice(prefix);
        self
    }

    /// Returns the inner store.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: Store> Store for SubStore<S> {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        self.inner.run_tx(&mut |ctx| tx(&mut SubCtx::new(ctx, self.prefix.clone())))
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        self.inner
            .run_read_tx(&mut |ctx| tx(&mut SubCtx::new(ctx, self.prefix.clone())))
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        self.inner
            .watch_tx(&mut |ctx| tx(&mut SubCtx::new(ctx, self.prefix.clone())))
    }

    fn close(&self) {
        // The inner store is closed by its owner.
    }
}

/// A context view that prepends `prefix` to every outbound key and
/// strips it from every inbound key.
pub struct SubCtx<'a> {
    inner: &'a mut dyn Ctx,
    prefix: Vec<u8>,
}

impl<'a> SubCtx<'a> {
    /// Wraps `inner`, translating keys through `prefix`.
    pub fn new(inner: &'a mut dyn Ctx, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Narrows this context by a further prefix, collapsing the two
    /// prefixes into one.
    pub fn sub(mut self, prefix: &[u8]) -> SubCtx<'a> {
        self.prefix.extend_from_slice(prefix);
        self
    }

    fn strip(&self, mut key: Vec<u8>) -> Vec<u8> {
        if key.starts_with(&self.prefix) {
            key.split_off(self.prefix.len())
        } else {
            key
        }
    }
}

impl Ctx for SubCtx<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        let mut pair = self.inner.get(&prepend(&self.prefix, key))?;
        pair.key = self.strip(pair.key);
        Ok(pair)
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        let high = if query.high.is_empty() {
            keys::prefix_next(&self.prefix)
        } else {
            prepend(&self.prefix, &query.high)
        };

        let mut pairs = self.inner.range(RangeQuery {
            low: prepend(&self.prefix, &query.low),
            high,
            limit: query.limit,
            descending: query.descending,
        })?;
        for pair in &mut pairs {
            pair.key = self.strip(std::mem::take(&mut pair.key));
        }
        Ok(pairs)
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        self.inner.set(Pair {
            key: prepend(&self.prefix, &pair.key),
            value: pair.value,
        })
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        self.inner.delete(&prepend(&self.prefix, key))
    }
}
