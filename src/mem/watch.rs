// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Watch registrations for the reference engine.

use std::sync::Arc;

use crate::store::{Error, Watch, WatchSignal};

use super::chain::LockSet;
use super::Shared;

/// A registered watch: the lock set snapshotted from the watch
/// transaction and the signal fired when a later commit intersects
/// it. Owned by the store and mutated only under the engine lock.
pub(super) struct WatchEntry {
    pub id: u64,
    pub locks: LockSet,
    pub signal: WatchSignal,
}

/// Handle returned by [`super::MemStore`] watch transactions.
pub(super) struct MemWatch {
    pub shared: Arc<Shared>,
    pub id: u64,
    pub signal: WatchSignal,
}

impl Watch for MemWatch {
    fn done(&self) -> WatchSignal {
        self.signal.clone()
    }

    fn error(&self) -> Option<Error> {
        // The reference engine never fails while waiting.
        None
    }

    fn close(&self) {
        self.signal.fire();
        let mut state = self.shared.state.write();
        state.watches.retain(|entry| entry.id != self.id);
    }
}
