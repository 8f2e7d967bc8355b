// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Bulk index reconciliation.
//!
//! Recomputes the index against the current data across many small
//! transactions so writers are never blocked for long. Because the
//! passes span transactions, deletion of stale entries is
//! probabilistic: the Bloom filter's fullness bounds the fraction of
//! extraneous entries that survive a run, and callers re-run
//! [`reindex`] until the deleted count falls below their threshold.
//! A run never removes an entry a correctly reconstructed index
//! would contain, modulo a concurrent add-then-remove of the exact
//! same index key.

use std::collections::BTreeSet;
use std::fmt;

use crate::keys;
use crate::store::{Ctx, Error, Pair, RangeQuery, Result, Store, SubCtx};

use super::bloom::Bloom;
use super::{DATA_PREFIX, INDEX_PREFIX};

// 8 MiB of bits.
const BLOOM_SIZE_BITS: u64 = 1024 * 1024 * 8 * 8;
const DATA_CHUNK_SIZE: usize = 100;
const INDEX_CHUNK_SIZE: usize = 1000;
const DELETE_BATCH_SIZE: usize = 1000;

// Approximate per-candidate bookkeeping cost beyond the key bytes.
const CANDIDATE_OVERHEAD: usize = 32;

/// Options for [`reindex`].
#[derive(Debug, Clone)]
pub struct ReindexOptions {
    /// Also remove index entries the current data no longer derives.
    ///
    /// Deletion across many transactions can transiently remove
    /// entries a concurrent writer re-creates; when temporary
    /// inconsistency is unacceptable, run once with `delete` and then
    /// immediately again without it.
    pub delete: bool,

    /// Upper bound, in bytes, on the in-memory deletion candidate
    /// set. Candidate scanning stops once the budget is reached;
    /// entries past it survive until the next run.
    pub candidate_memory_budget: usize,
}

impl Default for ReindexOptions {
    fn default() -> Self {
        Self {
            delete: false,
            candidate_memory_budget: 16 * 1024 * 1024,
        }
    }
}

/// Running statistics for a [`reindex`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReindexStats {
    pub data_rows_checked: u64,
    pub index_rows_checked: u64,
    pub created: u64,
    pub edited: u64,
    pub deleted: u64,
    pub transactions: u64,

    /// The expected fraction of stale index entries that were missed.
    /// Zero unless deletion ran; equals the Bloom filter's fullness.
    pub deletion_miss_rate: f64,
}

impl ReindexStats {
    fn merge_into(&self, total: &mut ReindexStats) {
        total.data_rows_checked += self.data_rows_checked;
        total.index_rows_checked += self.index_rows_checked;
        total.created += self.created;
        total.edited += self.edited;
        total.deleted += self.deleted;
        total.transactions += self.transactions;
    }
}

impl fmt::Display for ReindexStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "checked {} data rows", self.data_rows_checked)?;
        if self.index_rows_checked != 0 {
            write!(f, " and {} index rows", self.index_rows_checked)?;
        }
        write!(f, ", created {}, edited {}", self.created, self.edited)?;
        if self.deletion_miss_rate != 0.0 || self.deleted != 0 {
            write!(
                f,
                ", deleted {} (miss rate {:.3}%)",
                self.deleted,
                self.deletion_miss_rate * 100.0
            )?;
        }
        write!(f, " index pairs in {} transactions", self.transactions)
    }
}

/// A sink for running statistics, invoked after every committed
/// pass-transaction.
pub type ProgressSink<'a> = &'a mut dyn FnMut(&ReindexStats);

/// Checks every data pair's derived index entries against the index
/// and repairs differences; with [`ReindexOptions::delete`], also
/// removes entries the data no longer derives.
pub fn reindex<S, F>(
    store: &S,
    indexer: F,
    options: ReindexOptions,
    mut progress: Option<ProgressSink<'_>>,
) -> Result<ReindexStats>
where
    S: Store + ?Sized,
    F: Fn(&Pair) -> Vec<Pair>,
{
    let mut stats = ReindexStats::default();
    let mut bloom = options.delete.then(|| Bloom::new(BLOOM_SIZE_BITS));

    // Pass 1: walk the data in chunks, creating or overwriting index
    // entries so every derived entry exists, and feed the Bloom
    // filter with every live index key.
    let mut from: Vec<u8> = Vec::new();
    loop {
        let mut tx_stats = ReindexStats::default();
        let mut next_from = Vec::new();
        let mut chunk_done = false;

        store.run_tx(&mut |ctx| {
            tx_stats = ReindexStats::default();

            let pairs = SubCtx::new(&mut *ctx, DATA_PREFIX).range(RangeQuery {
                low: from.clone(),
                limit: DATA_CHUNK_SIZE as i64,
                ..Default::default()
            })?;

            for pair in &pairs {
                tx_stats.data_rows_checked += 1;
                for entry in indexer(pair) {
                    let existing = match SubCtx::new(&mut *ctx, INDEX_PREFIX).get(&entry.key) {
                        Ok(found) => Some(found),
                        Err(Error::NotFound) => None,
                        Err(err) => return Err(err),
                    };
                    if existing.as_ref() != Some(&entry) {
                        if existing.is_none() {
                            tx_stats.created += 1;
                        } else {
                            tx_stats.edited += 1;
                        }
                        SubCtx::new(&mut *ctx, INDEX_PREFIX).set(entry.clone())?;
                    }
                    if let Some(bloom) = bloom.as_mut() {
                        bloom.set(&entry.key);
                    }
                }
            }

            chunk_done = pairs.len() < DATA_CHUNK_SIZE;
            if let Some(last) = pairs.last() {
                next_from = keys::lex_next(&last.key);
            }
            tx_stats.transactions = 1;
            Ok(())
        })?;

        tx_stats.merge_into(&mut stats);
        if let Some(sink) = progress.as_deref_mut() {
            sink(&stats);
        }

        if chunk_done {
            break;
        }
        from = next_from;
    }

    let bloom = match bloom {
        Some(bloom) => bloom,
        None => return Ok(stats),
    };
    stats.deletion_miss_rate = bloom.fullness();

    // Pass 2: walk the index in larger chunks; every key the filter
    // reports absent is a deletion candidate. Stop scanning once the
    // candidate set reaches its memory budget.
    let mut candidates: BTreeSet<Vec<u8>> = BTreeSet::new();
    let mut candidate_bytes = 0usize;
    let mut from: Vec<u8> = Vec::new();
    loop {
        let mut tx_stats = ReindexStats::default();
        let mut tx_candidates: Vec<Vec<u8>> = Vec::new();
        let mut next_from = Vec::new();
        let mut chunk_done = false;

        store.run_tx(&mut |ctx| {
            tx_stats = ReindexStats::default();
            tx_candidates.clear();

            let pairs = SubCtx::new(&mut *ctx, INDEX_PREFIX).range(RangeQuery {
                low: from.clone(),
                limit: INDEX_CHUNK_SIZE as i64,
                ..Default::default()
            })?;

            for pair in &pairs {
                tx_stats.index_rows_checked += 1;
                if !bloom.test(&pair.key) {
                    tx_candidates.push(pair.key.clone());
                }
            }

            chunk_done = pairs.len() < INDEX_CHUNK_SIZE;
            if let Some(last) = pairs.last() {
                next_from = keys::lex_next(&last.key);
            }
            tx_stats.transactions = 1;
            Ok(())
        })?;

        tx_stats.merge_into(&mut stats);
        for key in tx_candidates.drain(..) {
            candidate_bytes += key.len() + CANDIDATE_OVERHEAD;
            candidates.insert(key);
        }
        if let Some(sink) = progress.as_deref_mut() {
            sink(&stats);
        }

        if chunk_done || candidate_bytes > options.candidate_memory_budget {
            break;
        }
        from = next_from;
    }

    // Pass 3: walk the data again and drop every derived key from the
    // candidate set. A writer may have created such an entry after
    // pass 1 fed the filter; deleting it would corrupt the index.
    let mut from: Vec<u8> = Vec::new();
    while !candidates.is_empty() {
        let mut tx_stats = ReindexStats::default();
        let mut live_keys: Vec<Vec<u8>> = Vec::new();
        let mut next_from = Vec::new();
        let mut chunk_done = false;

        store.run_tx(&mut |ctx| {
            tx_stats = ReindexStats::default();
            live_keys.clear();

            let pairs = SubCtx::new(&mut *ctx, DATA_PREFIX).range(RangeQuery {
                low: from.clone(),
                limit: DATA_CHUNK_SIZE as i64,
                ..Default::default()
            })?;

            for pair in &pairs {
                tx_stats.data_rows_checked += 1;
                for entry in indexer(pair) {
                    live_keys.push(entry.key);
                }
            }

            chunk_done = pairs.len() < DATA_CHUNK_SIZE;
            if let Some(last) = pairs.last() {
                next_from = keys::lex_next(&last.key);
            }
            tx_stats.transactions = 1;
            Ok(())
        })?;

        tx_stats.merge_into(&mut stats);
        for key in live_keys.drain(..) {
            candidates.remove(&key);
        }
        if let Some(sink) = progress.as_deref_mut() {
            sink(&stats);
        }

        if chunk_done {
            break;
        }
        from = next_from;
    }

    // Pass 4: delete the surviving candidates in bounded batches.
    // A candidate already gone was removed by a concurrent writer;
    // that is the add-then-remove race the contract tolerates.
    while !candidates.is_empty() {
        let batch: Vec<Vec<u8>> = candidates.iter().take(DELETE_BATCH_SIZE).cloned().collect();
        let mut tx_stats = ReindexStats::default();

        store.run_tx(&mut |ctx| {
            tx_stats = ReindexStats::default();

            for key in &batch {
                match SubCtx::new(&mut *ctx, INDEX_PREFIX).delete(key) {
                    Ok(()) => tx_stats.deleted += 1,
                    Err(Error::NotFound) => {}
                    Err(err) => return Err(err),
                }
            }

            tx_stats.transactions = 1;
            Ok(())
        })?;

        tx_stats.merge_into(&mut stats);
        for key in &batch {
            candidates.remove(key);
        }
        if let Some(sink) = progress.as_deref_mut() {
            sink(&stats);
        }
    }

    Ok(stats)
}
