// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The in-memory reference engine.
//!
//! [`MemStore`] implements serializable snapshot isolation over a
//! chain of immutable version nodes. It is not fast, especially for
//! range queries, but it is correct, and it is the implementation
//! other backends are tested against for equivalence.
//!
//! # Commit protocol
//!
//! Every transaction pins the head node it observed. At commit time,
//! under the engine lock, the nodes newer than the pinned snapshot
//! are tested against the transaction's key and range locks; any
//! intersection aborts the attempt and the closure is retried with a
//! fresh context. A clean commit links the mutation buffer as the new
//! head, fires every watch whose lock set intersects the committed
//! entries, and compacts unpinned history.

mod chain;
mod counters;
mod ctx;
mod watch;

pub use counters::{counters, reset_counters, Counters};

use std::sync::Arc;

use parking_lot::RwLock;

use crate::store::{Result, Store, Tx, Watch, WatchSignal};

use chain::Chain;
use ctx::MemCtx;
use watch::{MemWatch, WatchEntry};

struct State {
    chain: Chain,
    watches: Vec<WatchEntry>,
    next_watch_id: u64,
}

pub(crate) struct Shared {
    state: RwLock<State>,
}

/// An in-memory store with serializable snapshot isolation.
///
/// Cloning returns another handle onto the same database.
#[derive(Clone)]
pub struct MemStore {
    shared: Arc<Shared>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(State {
                    chain: Chain::new(),
                    watches: Vec::new(),
                    next_watch_id: 0,
                }),
            }),
        }
    }

    /// Runs one attempt of `tx`. Returns the closure result, the
    /// watch handle when one was registered, and whether the attempt
    /// was aborted by conflict and should be retried.
    fn try_tx(
        &self,
        tx: Tx<'_>,
        read_only: bool,
        watch: bool,
    ) -> (Result<()>, Option<MemWatch>, bool) {
        let pinned = self.shared.state.write().chain.pin_head();

        let mut ctx = MemCtx::new(&self.shared, pinned, read_only);
        let result = tx(&mut ctx);
        let (buf, locks) = ctx.into_parts();

        let mut aborted = false;
        let mut handle = None;
        {
            let mut state = self.shared.state.write();
            if result.is_ok() {
                if state.chain.conflicts(pinned, &locks) {
                    aborted = true;
                } else {
                    let State {
                        chain,
                        watches,
                        next_watch_id,
                    } = &mut *state;

                    if !buf.is_empty() {
                        let committed = chain.push(buf);
                        // Fire and drop every watch the commit invalidates;
                        // waiters are parked on the signal, not on our lock.
                        watches.retain(|entry| {
                            if entry.locks.conflicts_with(&committed.entries) {
                                entry.signal.fire();
                                false
                            } else {
                                true
                            }
                        });
                    }

                    if watch {
                        let signal = WatchSignal::new();
                        let id = *next_watch_id;
                        *next_watch_id += 1;
                        watches.push(WatchEntry {
                            id,
                            locks,
                            signal: signal.clone(),
                        });
                        handle = Some(MemWatch {
                            shared: self.shared.clone(),
                            id,
                            signal,
                        });
                    }
                }
            }
            state.chain.unpin(pinned);
            state.chain.compact();
        }

        if aborted {
            counters::record_abort();
        } else if result.is_err() {
            counters::record_error();
        } else {
            counters::record_commit();
        }

        (result, handle, aborted)
    }

    fn run_until_clean(
        &self,
        tx: Tx<'_>,
        read_only: bool,
        watch: bool,
    ) -> Result<Option<MemWatch>> {
        loop {
            let (result, handle, again) = self.try_tx(tx, read_only, watch);
            if !again {
                return result.map(|()| handle);
            }
        }
    }
}

impl Store for MemStore {
    fn run_tx(&self, tx: Tx<'_>) -> Result<()> {
        self.run_until_clean(tx, false, false).map(|_| ())
    }

    fn run_read_tx(&self, tx: Tx<'_>) -> Result<()> {
        self.run_until_clean(tx, true, false).map(|_| ())
    }

    fn watch_tx(&self, tx: Tx<'_>) -> Result<Box<dyn Watch>> {
        match self.run_until_clean(tx, true, true)? {
            Some(handle) => Ok(Box::new(handle)),
            None => unreachable!("committed watch transaction left no registration"),
        }
    }

    fn close(&self) {
        // State is dropped with the last handle.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::scenarios;
    use crate::store::{Error, Pair, RangeQuery, StoreExt, SubStore};

    #[test]
    fn test_get_set_roundtrip() {
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("hello", "world")))
            .unwrap();
        let pair = store.with_read_tx(|ctx| ctx.get(b"hello")).unwrap();
        assert_eq!(pair, Pair::new("hello", "world"));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let store = MemStore::new();
        let err = store
            .run_read_tx(&mut |ctx| ctx.get(b"missing").map(|_| ()))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn test_read_tx_rejects_writes() {
        let store = MemStore::new();
        let err = store
            .run_read_tx(&mut |ctx| ctx.set(Pair::new("k", "v")))
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyTx));

        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("k", "v")))
            .unwrap();
        let err = store
            .run_read_tx(&mut |ctx| ctx.delete(b"k"))
            .unwrap_err();
        assert!(matches!(err, Error::ReadOnlyTx));
    }

    #[test]
    fn test_delete_missing_is_not_found() {
        let store = MemStore::new();
        let err = store.run_tx(&mut |ctx| ctx.delete(b"nope")).unwrap_err();
        assert!(matches!(err, Error::NotFound));
    }

    #[test]
    fn test_read_your_writes() {
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| {
                ctx.set(Pair::new("k", "v1"))?;
                assert_eq!(ctx.get(b"k")?, Pair::new("k", "v1"));
                ctx.set(Pair::new("k", "v2"))?;
                assert_eq!(ctx.get(b"k")?, Pair::new("k", "v2"));
                ctx.delete(b"k")?;
                assert!(ctx.get(b"k").unwrap_err().is_not_found());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_errored_tx_leaves_no_change() {
        let store = MemStore::new();
        let err = store
            .run_tx(&mut |ctx| {
                ctx.set(Pair::new("k", "v"))?;
                Err(Error::BadIndexer)
            })
            .unwrap_err();
        assert!(matches!(err, Error::BadIndexer));

        let err = store
            .run_read_tx(&mut |ctx| ctx.get(b"k").map(|_| ()))
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_range_merges_buffer_over_snapshot() {
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| {
                ctx.set(Pair::new("a", "1"))?;
                ctx.set(Pair::new("b", "2"))?;
                ctx.set(Pair::new("c", "3"))
            })
            .unwrap();

        store
            .run_tx(&mut |ctx| {
                ctx.delete(b"b")?;
                ctx.set(Pair::new("d", "4"))?;
                let pairs = ctx.range(RangeQuery::all())?;
                assert_eq!(
                    pairs,
                    vec![
                        Pair::new("a", "1"),
                        Pair::new("c", "3"),
                        Pair::new("d", "4"),
                    ]
                );
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_range_descending_and_limit() {
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| {
                for key in ["a", "b", "c", "d"] {
                    ctx.set(Pair::new(key, "v"))?;
                }
                Ok(())
            })
            .unwrap();

        let pairs = store
            .with_read_tx(|ctx| {
                ctx.range(RangeQuery {
                    limit: 2,
                    descending: true,
                    ..Default::default()
                })
            })
            .unwrap();
        assert_eq!(pairs, vec![Pair::new("d", "v"), Pair::new("c", "v")]);
    }

    #[test]
    fn test_range_malformed_is_empty() {
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("m", "v")))
            .unwrap();
        let pairs = store
            .with_read_tx(|ctx| {
                ctx.range(RangeQuery {
                    low: b"z".to_vec(),
                    high: b"a".to_vec(),
                    ..Default::default()
                })
            })
            .unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_counters_move() {
        reset_counters();
        let store = MemStore::new();
        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("k", "v")))
            .unwrap();
        let _ = store.run_tx(&mut |_ctx| Err(Error::BadIndexer));

        let counts = counters();
        assert!(counts.commits >= 1);
        assert!(counts.errors >= 1);
    }

    #[test]
    fn test_scenario_sharded_increment() {
        scenarios::sharded_increment(&MemStore::new());
    }

    #[test]
    fn test_scenario_range_max_replacement() {
        scenarios::range_max_replacement(&MemStore::new());
    }

    #[test]
    fn test_scenario_random_ops_self_consistent() {
        scenarios::random_op_equivalence(&MemStore::new());
    }

    #[test]
    fn test_scenario_watch_basic() {
        scenarios::watch_basic(&MemStore::new());
    }

    #[test]
    fn test_subdb_scenario_sharded_increment() {
        let sub = SubStore::new(MemStore::new(), b"some\x00prefix".to_vec());
        scenarios::sharded_increment(&sub);
    }

    #[test]
    fn test_subdb_scenario_range_max_replacement() {
        let sub = SubStore::new(MemStore::new(), b"some\x00prefix".to_vec());
        scenarios::range_max_replacement(&sub);
    }

    #[test]
    fn test_subdb_scenario_random_ops() {
        let sub = SubStore::new(MemStore::new(), b"some\x00prefix".to_vec());
        scenarios::random_op_equivalence(&sub);
    }

    #[test]
    fn test_subdb_scenario_watch_basic() {
        let sub = SubStore::new(MemStore::new(), b"some\x00prefix".to_vec());
        scenarios::watch_basic(&sub);
    }

    #[test]
    fn test_watch_fires_on_write_to_read_key() {
        let store = MemStore::new();
        let watch = store
            .watch_tx(&mut |ctx| match ctx.get(b"watched") {
                Ok(_) => Ok(()),
                Err(err) if err.is_not_found() => Ok(()),
                Err(err) => Err(err),
            })
            .unwrap();

        assert!(!watch.done().is_fired());
        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("watched", "v")))
            .unwrap();
        assert!(watch.done().is_fired());
        assert!(watch.error().is_none());
        watch.close();
    }

    #[test]
    fn test_watch_ignores_unrelated_write() {
        let store = MemStore::new();
        let watch = store
            .watch_tx(&mut |ctx| match ctx.get(b"watched") {
                Ok(_) => Ok(()),
                Err(err) if err.is_not_found() => Ok(()),
                Err(err) => Err(err),
            })
            .unwrap();

        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("unrelated", "v")))
            .unwrap();
        assert!(!watch.done().is_fired());
        watch.close();
        assert!(watch.done().is_fired());
    }

    #[test]
    fn test_watch_range_fires_on_insert() {
        let store = MemStore::new();
        let watch = store
            .watch_tx(&mut |ctx| {
                ctx.range(RangeQuery {
                    low: b"a".to_vec(),
                    high: b"m".to_vec(),
                    ..Default::default()
                })?;
                Ok(())
            })
            .unwrap();

        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("f", "v")))
            .unwrap();
        assert!(watch.done().is_fired());
        watch.close();
    }

    #[test]
    fn test_watch_close_is_idempotent() {
        let store = MemStore::new();
        let watch = store.watch_tx(&mut |_ctx| Ok(())).unwrap();
        watch.close();
        watch.close();
        assert!(watch.done().is_fired());
    }

    #[test]
    fn test_writes_visible_to_later_tx_across_handles() {
        let store = MemStore::new();
        let other = store.clone();
        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("shared", "v")))
            .unwrap();
        let pair = other.with_read_tx(|ctx| ctx.get(b"shared")).unwrap();
        assert_eq!(pair.value, b"v");
    }
}
