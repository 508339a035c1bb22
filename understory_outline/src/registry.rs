// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-pass identifiers and the node registry.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;

use crate::tree::NodeRef;

/// Identifier of a rendered node (generational).
///
/// The first component is the render pass, the second a counter reset at the
/// start of every pass. Handles from an earlier pass never match anything.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct RenderedId(pub(crate) u32, pub(crate) u32);

impl RenderedId {
    /// The render pass that issued this id.
    pub const fn pass(self) -> u32 {
        self.0
    }

    /// Position in the pass's registration order.
    pub const fn seq(self) -> u32 {
        self.1
    }

    pub(crate) const fn idx(self) -> usize {
        self.1 as usize
    }
}

/// Identifier of a truncation placeholder (generational, see [`RenderedId`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PlaceholderId(pub(crate) u32, pub(crate) u32);

impl PlaceholderId {
    /// The render pass that issued this id.
    pub const fn pass(self) -> u32 {
        self.0
    }
}

/// The property under which a node hangs in its parent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum Owner {
    /// The tree root.
    Root,
    /// A named field.
    Field(String),
    /// An array element.
    Element(usize),
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => Ok(()),
            Self::Field(name) => f.write_str(name),
            Self::Element(i) => write!(f, "[{i}]"),
        }
    }
}

/// Render metadata for one registered node.
#[derive(Clone, Debug, PartialEq)]
pub struct RegistryEntry {
    /// The node's id.
    pub id: RenderedId,
    /// The tree node it wraps.
    pub node: NodeRef,
    /// Owning property.
    pub owner: Owner,
    /// Depth below the tree root.
    pub depth: u32,
    /// Whether the node is an array.
    pub is_array: bool,
    /// The nearest registered ancestor.
    pub parent: Option<RenderedId>,
}

/// Mapping from rendered ids to tree nodes for the current pass.
///
/// Cleared by [`begin_pass`](Self::begin_pass); resolvers only append.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    pass: u32,
    entries: Vec<RegistryEntry>,
    by_node: HashMap<NodeRef, RenderedId>,
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("pass", &self.pass)
            .field("entries", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The current pass.
    pub fn pass(&self) -> u32 {
        self.pass
    }

    /// Drop all entries and start a new pass. Returns the new pass number.
    pub fn begin_pass(&mut self) -> u32 {
        self.entries.clear();
        self.by_node.clear();
        self.pass = self.pass.wrapping_add(1);
        self.pass
    }

    /// Number of registered nodes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a node and return its fresh id.
    pub(crate) fn register(
        &mut self,
        node: NodeRef,
        owner: Owner,
        depth: u32,
        is_array: bool,
        parent: Option<RenderedId>,
    ) -> RenderedId {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "registries are capped far below u32::MAX"
        )]
        let id = RenderedId(self.pass, self.entries.len() as u32);
        self.entries.push(RegistryEntry {
            id,
            node,
            owner,
            depth,
            is_array,
            parent,
        });
        self.by_node.insert(node, id);
        id
    }

    /// Entry for `id`, or `None` if it is stale or unknown.
    pub fn get(&self, id: RenderedId) -> Option<&RegistryEntry> {
        if id.pass() != self.pass {
            return None;
        }
        self.entries.get(id.idx())
    }

    /// Whether `id` belongs to the current pass.
    pub fn is_live(&self, id: RenderedId) -> bool {
        self.get(id).is_some()
    }

    /// The id a tree node was registered under in this pass.
    pub fn id_of(&self, node: NodeRef) -> Option<RenderedId> {
        self.by_node.get(&node).copied()
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    /// Entries registered at or after position `from`.
    pub(crate) fn entries_from(&self, from: usize) -> &[RegistryEntry] {
        self.entries.get(from..).unwrap_or(&[])
    }

    /// Registered ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: RenderedId) -> impl Iterator<Item = RenderedId> + '_ {
        let first = self.get(id).and_then(|e| e.parent);
        core::iter::successors(first, |p| self.get(*p).and_then(|e| e.parent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_go_stale_on_new_pass() {
        let mut reg = NodeRegistry::new();
        reg.begin_pass();
        let root = reg.register(NodeRef(0), Owner::Root, 0, false, None);
        let child = reg.register(NodeRef(1), Owner::Field("body".into()), 1, true, Some(root));
        assert_eq!(reg.id_of(NodeRef(1)), Some(child));
        assert_eq!(reg.ancestors(child).collect::<Vec<_>>(), [root]);

        reg.begin_pass();
        assert!(!reg.is_live(root), "ids from the previous pass must be stale");
        assert_eq!(reg.id_of(NodeRef(1)), None);

        let again = reg.register(NodeRef(0), Owner::Root, 0, false, None);
        assert_eq!(again.seq(), root.seq(), "counter restarts each pass");
        assert_ne!(again, root, "but the generation differs");
    }

    #[test]
    fn owner_display() {
        assert_eq!(alloc::format!("{}", Owner::Element(3)), "[3]");
        assert_eq!(alloc::format!("{}", Owner::Field("init".into())), "init");
    }
}
