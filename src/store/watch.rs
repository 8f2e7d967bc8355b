// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! One-shot completion signalling for watch transactions.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

struct SignalState {
    fired: Mutex<bool>,
    cond: Condvar,
}

/// A cloneable one-shot completion signal.
///
/// The signal starts unfired and fires at most once. Waiters park on
/// the signal without holding any store lock; firing wakes all of
/// them. Cloning produces another handle onto the same signal.
#[derive(Clone)]
pub struct WatchSignal {
    state: Arc<SignalState>,
}

impl WatchSignal {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(SignalState {
                fired: Mutex::new(false),
                cond: Condvar::new(),
            }),
        }
    }

    /// Fires the signal. Idempotent.
    pub(crate) fn fire(&self) {
        let mut fired = self.state.fired.lock();
        if !*fired {
            *fired = true;
            self.state.cond.notify_all();
        }
    }

    /// Returns true if the signal has fired.
    #[inline]
    pub fn is_fired(&self) -> bool {
        *self.state.fired.lock()
    }

    /// Blocks until the signal fires.
    pub fn wait(&self) {
        let mut fired = self.state.fired.lock();
        while !*fired {
            self.state.cond.wait(&mut fired);
        }
    }

    /// Blocks until the signal fires or `timeout` elapses.
    ///
    /// Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut fired = self.state.fired.lock();
        while !*fired {
            if self.state.cond.wait_until(&mut fired, deadline).timed_out() {
                return *fired;
            }
        }
        true
    }
}

impl std::fmt::Debug for WatchSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchSignal")
            .field("fired", &self.is_fired())
            .finish()
    }
}
