// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Process-global transaction outcome counters.
//!
//! Updated with atomic operations, so the individual values are valid
//! in the face of parallel transactions, but [`counters`] and
//! [`reset_counters`] do not operate on the set atomically as a
//! group. The counts are diagnostic, not authoritative, and are
//! shared by every [`super::MemStore`] instance in the process.

use std::sync::atomic::{AtomicU64, Ordering};

static COMMITS: AtomicU64 = AtomicU64::new(0);
static ABORTS: AtomicU64 = AtomicU64::new(0);
static ERRORS: AtomicU64 = AtomicU64::new(0);

/// A snapshot of the global transaction counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub commits: u64,
    pub aborts: u64,
    pub errors: u64,
}

/// Returns a snapshot of the global counters.
pub fn counters() -> Counters {
    Counters {
        commits: COMMITS.load(Ordering::Relaxed),
        aborts: ABORTS.load(Ordering::Relaxed),
        errors: ERRORS.load(Ordering::Relaxed),
    }
}

/// Resets the global counters to zero.
pub fn reset_counters() {
    COMMITS.store(0, Ordering::Relaxed);
    ABORTS.store(0, Ordering::Relaxed);
    ERRORS.store(0, Ordering::Relaxed);
}

#[inline]
pub(super) fn record_commit() {
    COMMITS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(super) fn record_abort() {
    ABORTS.fetch_add(1, Ordering::Relaxed);
}

#[inline]
pub(super) fn record_error() {
    ERRORS.fetch_add(1, Ordering::Relaxed);
}
