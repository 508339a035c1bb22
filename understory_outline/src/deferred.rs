// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bookkeeping for content that was rendered as a placeholder.

use core::fmt;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::registry::{Owner, RenderedId};
use crate::tree::NodeRef;

/// Which part of the stored node is still hidden.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeferredScope {
    /// The node is shown; its children from ordinal `skip` on are not.
    Children {
        /// Display-order index of the first hidden field.
        skip: usize,
    },
    /// The node itself is hidden along with everything below it.
    Subtree,
}

/// A subtree waiting to be materialized.
#[derive(Clone, Debug, PartialEq)]
pub struct DeferredEntry {
    /// The tree node the scope applies to.
    pub node: NodeRef,
    /// Owning property of `node`.
    pub owner: Owner,
    /// Depth of `node` below the tree root.
    pub depth: u32,
    /// Whether `node` is an array.
    pub is_array: bool,
    /// What is hidden.
    pub scope: DeferredScope,
    /// Registered node that materialized content hangs under.
    pub parent: Option<RenderedId>,
}

/// Deferred entries keyed by placeholder handle.
///
/// [`take`](Self::take) removes an entry, so each one is materialized at most once.
#[derive(Clone)]
pub struct DeferredStore<K> {
    entries: HashMap<K, DeferredEntry>,
}

impl<K> Default for DeferredStore<K> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K> fmt::Debug for DeferredStore<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredStore")
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl<K: Copy + Eq + Hash> DeferredStore<K> {
    /// Number of outstanding entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `key` is outstanding.
    pub fn contains(&self, key: K) -> bool {
        self.entries.contains_key(&key)
    }

    /// Peek at an entry.
    pub fn get(&self, key: K) -> Option<&DeferredEntry> {
        self.entries.get(&key)
    }

    /// Outstanding entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &DeferredEntry)> {
        self.entries.iter().map(|(k, e)| (*k, e))
    }

    pub(crate) fn insert(&mut self, key: K, entry: DeferredEntry) {
        self.entries.insert(key, entry);
    }

    pub(crate) fn take(&mut self, key: K) -> Option<DeferredEntry> {
        self.entries.remove(&key)
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
