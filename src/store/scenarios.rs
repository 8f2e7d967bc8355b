// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Conformance scenarios shared by every backend's tests.
//!
//! Each scenario takes any [`Store`] and asserts the serializability
//! and contract behavior every implementation must provide. The
//! random-operation scenario replays the same trace against the
//! reference engine and compares results step by step.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mem::MemStore;
use crate::store::{Ctx, Error, Pair, RangeQuery, Store};

/// Deletes everything in the store.
pub fn clear(store: &impl Store) {
    store
        .run_tx(&mut |ctx| {
            loop {
                let pairs = ctx.range(RangeQuery {
                    limit: 1000,
                    ..Default::default()
                })?;
                if pairs.is_empty() {
                    return Ok(());
                }
                for pair in pairs {
                    ctx.delete(&pair.key)?;
                }
            }
        })
        .expect("couldn't clear store");
}

fn populate_rows(store: &impl Store, count: usize) {
    store
        .run_tx(&mut |ctx| {
            for i in 0..count {
                ctx.set(Pair::new(i.to_string(), "0"))?;
            }
            Ok(())
        })
        .expect("couldn't add testing rows");
}

fn parse_value(pair: &Pair) -> i64 {
    String::from_utf8_lossy(&pair.value)
        .parse()
        .expect("value is numeric")
}

/// Parallel workers increment random keys, occasionally swapping two
/// keys' values in the same transaction. Serializability means the
/// final sum equals the total number of increments.
pub fn sharded_increment<S: Store>(store: &S) {
    const TRANSACTIONS_PER_WORKER: usize = 100;
    const PARALLELISM: usize = 10;
    const ROW_COUNT: usize = 3000;

    clear(store);
    populate_rows(store, ROW_COUNT);

    std::thread::scope(|scope| {
        for worker in 0..PARALLELISM {
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(0x5eed + worker as u64);
                for _ in 0..TRANSACTIONS_PER_WORKER {
                    let id_a = rng.gen_range(0..ROW_COUNT);
                    let mut id_b = rng.gen_range(0..ROW_COUNT);
                    while id_a == id_b {
                        id_b = rng.gen_range(0..ROW_COUNT);
                    }
                    let swap = rng.gen_range(0..4) == 0;

                    store
                        .run_tx(&mut |ctx| {
                            let mut pair_a = ctx.get(id_a.to_string().as_bytes())?;
                            let mut pair_b = ctx.get(id_b.to_string().as_bytes())?;

                            if swap {
                                std::mem::swap(&mut pair_a, &mut pair_b);
                            }

                            let num = parse_value(&pair_a) + 1;
                            pair_a.value = num.to_string().into_bytes();

                            ctx.set(pair_a)?;
                            ctx.set(pair_b)?;
                            Ok(())
                        })
                        .expect("couldn't run incrementer transaction");
                }
            });
        }
    });

    let mut total = 0;
    store
        .run_read_tx(&mut |ctx| {
            total = 0;
            for pair in ctx.range(RangeQuery::all())? {
                total += parse_value(&pair);
            }
            Ok(())
        })
        .expect("couldn't run total transaction");

    clear(store);

    assert_eq!(
        total,
        (PARALLELISM * TRANSACTIONS_PER_WORKER) as i64,
        "sharded increment sum"
    );
}

/// Parallel workers scan the whole keyspace, find the maximum value,
/// and write max+1 to a random key. Serializability means the final
/// maximum equals the number of transactions run.
pub fn range_max_replacement<S: Store>(store: &S) {
    const TRANSACTIONS_PER_WORKER: usize = 20;
    const PARALLELISM: usize = 4;
    const ROW_COUNT: usize = 3000;

    clear(store);
    populate_rows(store, ROW_COUNT);

    std::thread::scope(|scope| {
        for worker in 0..PARALLELISM {
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(0xfeed + worker as u64);
                for _ in 0..TRANSACTIONS_PER_WORKER {
                    let target = rng.gen_range(0..ROW_COUNT);
                    store
                        .run_tx(&mut |ctx| {
                            let mut max = 0;
                            for pair in ctx.range(RangeQuery::all())? {
                                max = max.max(parse_value(&pair));
                            }
                            ctx.set(Pair::new(
                                target.to_string(),
                                (max + 1).to_string(),
                            ))
                        })
                        .expect("couldn't run replacement transaction");
                }
            });
        }
    });

    let mut max = 0;
    store
        .run_read_tx(&mut |ctx| {
            max = 0;
            for pair in ctx.range(RangeQuery::all())? {
                max = max.max(parse_value(&pair));
            }
            Ok(())
        })
        .expect("couldn't run max transaction");

    clear(store);

    assert_eq!(
        max,
        (PARALLELISM * TRANSACTIONS_PER_WORKER) as i64,
        "range max after replacements"
    );
}

#[derive(Debug, Clone)]
enum RandomOp {
    Get(Vec<u8>),
    Range(RangeQuery),
    Set(Pair),
    Delete(Vec<u8>),
}

/// A backend-independent rendering of one operation's outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OpResult {
    Pair(Pair),
    Pairs(Vec<Pair>),
    Unit,
    NotFound,
    ReadOnlyTx,
    Other(String),
}

fn random_bytes(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.gen_range(1..=2);
    (0..len).map(|_| rng.gen()).collect()
}

fn random_op(rng: &mut StdRng) -> RandomOp {
    if rng.gen_range(0..10) == 0 {
        if rng.gen_bool(0.5) {
            RandomOp::Set(Pair {
                key: random_bytes(rng),
                value: random_bytes(rng),
            })
        } else {
            RandomOp::Delete(random_bytes(rng))
        }
    } else if rng.gen_bool(0.5) {
        RandomOp::Get(random_bytes(rng))
    } else {
        // About half of these ranges are malformed (low > high); the
        // contract says they yield the empty sequence.
        RandomOp::Range(RangeQuery {
            low: if rng.gen_range(0..8) == 0 {
                Vec::new()
            } else {
                random_bytes(rng)
            },
            high: if rng.gen_range(0..8) == 0 {
                Vec::new()
            } else {
                random_bytes(rng)
            },
            limit: rng.gen_range(0..20) - 5,
            descending: rng.gen_bool(0.5),
        })
    }
}

fn apply_op(ctx: &mut dyn Ctx, op: &RandomOp) -> OpResult {
    let result = match op {
        RandomOp::Get(key) => ctx.get(key).map(OpResult::Pair),
        RandomOp::Range(query) => ctx.range(query.clone()).map(OpResult::Pairs),
        RandomOp::Set(pair) => ctx.set(pair.clone()).map(|()| OpResult::Unit),
        RandomOp::Delete(key) => ctx.delete(key).map(|()| OpResult::Unit),
    };
    match result {
        Ok(value) => value,
        Err(Error::NotFound) => OpResult::NotFound,
        Err(Error::ReadOnlyTx) => OpResult::ReadOnlyTx,
        Err(other) => OpResult::Other(other.to_string()),
    }
}

fn run_trace(store: &impl Store, ops: &[RandomOp]) -> Vec<OpResult> {
    let mut results = Vec::new();
    store
        .run_tx(&mut |ctx| {
            results.clear();
            for op in ops {
                results.push(apply_op(ctx, op));
            }
            Ok(())
        })
        .expect("couldn't run trace transaction");
    results
}

/// Replays random operation traces against `store` and a fresh
/// reference engine, requiring identical per-step results.
pub fn random_op_equivalence<S: Store>(store: &S) {
    for iteration in 0u64..150 {
        clear(store);
        let reference = MemStore::new();

        let mut rng = StdRng::seed_from_u64(0x0add + iteration);
        let ops: Vec<RandomOp> = (0..(10 + iteration as usize / 10))
            .map(|_| random_op(&mut rng))
            .collect();

        let expected = run_trace(&reference, &ops);
        let actual = run_trace(store, &ops);

        for (step, (want, got)) in expected.iter().zip(actual.iter()).enumerate() {
            assert_eq!(
                want, got,
                "iteration {iteration}, step {step} of {ops:?}: reference returned {want:?}, store returned {got:?}"
            );
        }
    }
    clear(store);
}

/// Watches an absent key, writes to it from another thread, and
/// requires the completion signal to fire within a second.
///
/// Backends without watch support are skipped.
pub fn watch_basic<S: Store>(store: &S) {
    match store.watch_tx(&mut |_ctx| Ok(())) {
        Err(Error::WatchUnsupported) => return,
        Err(err) => panic!("couldn't probe watch support: {err}"),
        Ok(probe) => probe.close(),
    }

    let watch = store
        .watch_tx(&mut |ctx| match ctx.get(b"asdf") {
            Ok(_) => Ok(()),
            Err(err) if err.is_not_found() => Ok(()),
            Err(err) => Err(err),
        })
        .expect("couldn't watch");

    let done = watch.done();
    std::thread::scope(|scope| {
        let waiter = scope.spawn(move || done.wait_timeout(Duration::from_secs(1)));

        store
            .run_tx(&mut |ctx| ctx.set(Pair::new("asdf", "value")))
            .expect("couldn't set value");

        assert!(waiter.join().unwrap(), "timed out waiting for watch");
    });

    assert!(watch.error().is_none(), "watch reported an error");
    watch.close();
    clear(store);
}
