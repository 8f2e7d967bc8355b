// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The reference engine's transaction context.

use crate::store::{Ctx, Error, Pair, RangeQuery, Result};

use super::chain::{Entries, LockSet};
use super::Shared;

/// Per-attempt transaction state: the pinned snapshot id, the private
/// mutation buffer, and the lock sets checked at commit time.
///
/// `get` records a key lock and `range` records a range lock so that
/// commit-time validation covers the full read set and watch
/// registrations capture the exact reads performed.
pub(super) struct MemCtx<'a> {
    shared: &'a Shared,
    pinned: u64,
    read_only: bool,
    buf: Entries,
    locks: LockSet,
}

impl<'a> MemCtx<'a> {
    pub fn new(shared: &'a Shared, pinned: u64, read_only: bool) -> Self {
        Self {
            shared,
            pinned,
            read_only,
            buf: Entries::default(),
            locks: LockSet::default(),
        }
    }

    /// Consumes the context, yielding the mutation buffer and lock
    /// set for commit validation.
    pub fn into_parts(self) -> (Entries, LockSet) {
        (self.buf, self.locks)
    }
}

impl Ctx for MemCtx<'_> {
    fn get(&mut self, key: &[u8]) -> Result<Pair> {
        self.locks.keys.push(key.to_vec());

        let value = match self.buf.get(key) {
            Some(entry) => entry.clone(),
            None => {
                let state = self.shared.state.read();
                state.chain.resolve(self.pinned, key)
            }
        };

        match value {
            Some(value) => Ok(Pair {
                key: key.to_vec(),
                value,
            }),
            None => Err(Error::NotFound),
        }
    }

    fn range(&mut self, query: RangeQuery) -> Result<Vec<Pair>> {
        self.locks
            .ranges
            .push((query.low.clone(), query.high.clone()));

        let mut merged = {
            let state = self.shared.state.read();
            state
                .chain
                .collect_range(self.pinned, &query.low, &query.high)
        };

        for (key, entry) in &self.buf {
            if !query.contains(key) {
                continue;
            }
            match entry {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        let mut pairs: Vec<Pair> = merged
            .into_iter()
            .map(|(key, value)| Pair { key, value })
            .collect();
        if query.descending {
            pairs.sort_unstable_by(|a, b| b.key.cmp(&a.key));
        } else {
            pairs.sort_unstable_by(|a, b| a.key.cmp(&b.key));
        }
        if query.limit > 0 && pairs.len() > query.limit as usize {
            pairs.truncate(query.limit as usize);
        }

        Ok(pairs)
    }

    fn set(&mut self, pair: Pair) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyTx);
        }

        self.locks.keys.push(pair.key.clone());
        self.buf.insert(pair.key, Some(pair.value));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> Result<()> {
        if self.read_only {
            return Err(Error::ReadOnlyTx);
        }

        let exists = match self.buf.get(key) {
            Some(entry) => entry.is_some(),
            None => {
                let state = self.shared.state.read();
                state.chain.resolve(self.pinned, key).is_some()
            }
        };
        if !exists {
            return Err(Error::NotFound);
        }

        self.locks.keys.push(key.to_vec());
        self.buf.insert(key.to_vec(), None);
        Ok(())
    }
}
