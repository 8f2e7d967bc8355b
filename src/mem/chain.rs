// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! The version-node chain backing the reference engine.
//!
//! Database state is a sequence of immutable nodes ordered oldest to
//! newest; the newest node is the head. Each node maps keys to
//! `Some(value)` or to a tombstone (`None`) masking older entries.
//! Reads resolve a key by walking from a pinned node toward older
//! nodes; range reads accumulate layers oldest-to-newest with
//! tombstone masking. All structural mutation happens under the
//! engine's write lock.

use std::collections::HashMap;

/// Entries committed by one transaction.
pub(super) type Entries = HashMap<Vec<u8>, Option<Vec<u8>>>;

/// One immutable layer of database state.
pub(super) struct Node {
    pub id: u64,
    pub entries: Entries,
    /// Number of live transaction contexts pinning this node.
    pub refcount: usize,
}

/// The keys and ranges a transaction touched, checked against newer
/// nodes at commit time and snapshotted into watch registrations.
#[derive(Default)]
pub(super) struct LockSet {
    pub keys: Vec<Vec<u8>>,
    pub ranges: Vec<(Vec<u8>, Vec<u8>)>,
}

impl LockSet {
    /// Returns true if any locked key or range intersects `entries`.
    pub fn conflicts_with(&self, entries: &Entries) -> bool {
        for key in &self.keys {
            if entries.contains_key(key) {
                return true;
            }
        }
        for (low, high) in &self.ranges {
            for key in entries.keys() {
                if key.as_slice() >= low.as_slice()
                    && (high.is_empty() || key.as_slice() < high.as_slice())
                {
                    return true;
                }
            }
        }
        false
    }
}

/// The node chain plus its id allocator.
///
/// Invariant: the chain is never empty and node ids are strictly
/// increasing from oldest to newest.
pub(super) struct Chain {
    nodes: Vec<Node>,
    next_id: u64,
}

impl Chain {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                id: 0,
                entries: HashMap::new(),
                refcount: 0,
            }],
            next_id: 1,
        }
    }

    fn head_mut(&mut self) -> &mut Node {
        match self.nodes.last_mut() {
            Some(node) => node,
            None => unreachable!("version chain is never empty"),
        }
    }

    fn index_of(&self, id: u64) -> usize {
        match self.nodes.binary_search_by(|node| node.id.cmp(&id)) {
            Ok(index) => index,
            Err(_) => unreachable!("pinned node is never compacted away"),
        }
    }

    /// Pins the head node as a transaction snapshot and returns its id.
    pub fn pin_head(&mut self) -> u64 {
        let head = self.head_mut();
        head.refcount += 1;
        head.id
    }

    /// Releases a pin taken with [`Chain::pin_head`].
    pub fn unpin(&mut self, id: u64) {
        let index = self.index_of(id);
        self.nodes[index].refcount -= 1;
    }

    /// Resolves `key` as seen from the snapshot pinned at `id`.
    ///
    /// Returns `None` for both tombstoned and never-written keys.
    pub fn resolve(&self, id: u64, key: &[u8]) -> Option<Vec<u8>> {
        let pinned = self.index_of(id);
        for node in self.nodes[..=pinned].iter().rev() {
            if let Some(entry) = node.entries.get(key) {
                return entry.clone();
            }
        }
        None
    }

    /// Accumulates all live pairs within `[low, high)` as seen from
    /// the snapshot pinned at `id`, walking oldest to newest so that
    /// tombstones mask older layers.
    pub fn collect_range(&self, id: u64, low: &[u8], high: &[u8]) -> HashMap<Vec<u8>, Vec<u8>> {
        let pinned = self.index_of(id);
        let mut merged = HashMap::new();
        for node in &self.nodes[..=pinned] {
            for (key, entry) in &node.entries {
                if key.as_slice() < low || (!high.is_empty() && key.as_slice() >= high) {
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
        }
        merged
    }

    /// Returns true if any node newer than the snapshot pinned at `id`
    /// intersects `locks`.
    ///
    /// Older nodes cannot conflict: they are already part of what the
    /// transaction read.
    pub fn conflicts(&self, id: u64, locks: &LockSet) -> bool {
        let pinned = self.index_of(id);
        self.nodes[pinned + 1..]
            .iter()
            .any(|node| locks.conflicts_with(&node.entries))
    }

    /// Links a freshly committed mutation set as the new head and
    /// returns a reference to it.
    pub fn push(&mut self, entries: Entries) -> &Node {
        let id = self.next_id;
        self.next_id += 1;
        self.nodes.push(Node {
            id,
            entries,
            refcount: 0,
        });
        match self.nodes.last() {
            Some(node) => node,
            None => unreachable!("version chain is never empty"),
        }
    }

    /// Merges unpinned history to a fixed point.
    ///
    /// While the two oldest nodes both have refcount zero, the oldest
    /// is folded into its successor (entries already present in the
    /// successor win) and unlinked. Tombstones in the resulting
    /// oldest node mask nothing and are dropped. The head is never
    /// unlinked.
    pub fn compact(&mut self) {
        while self.nodes.len() >= 2 && self.nodes[0].refcount == 0 && self.nodes[1].refcount == 0 {
            let oldest = self.nodes.remove(0);
            let survivor = &mut self.nodes[0];
            for (key, entry) in oldest.entries {
                survivor.entries.entry(key).or_insert(entry);
            }
            survivor.entries.retain(|_, entry| entry.is_some());
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn oldest_entries(&self) -> &Entries {
        &self.nodes[0].entries
    }
}
