// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The bounded render walk.
//!
//! One explicit-stack walk serves full renders and placeholder resolution. It
//! decides per node whether to render it, stop at a lazy boundary or emit a
//! truncation placeholder, registering everything it renders.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashSet;

use crate::deferred::{DeferredEntry, DeferredScope, DeferredStore};
use crate::error::OutlineError;
use crate::registry::{NodeRegistry, Owner, PlaceholderId, RenderedId};
use crate::render::{
    BlockFlags, RenderItem, RenderedNode, ScalarLine, TruncatedPlaceholder, TruncationReason,
};
use crate::settings::RenderLimits;
use crate::tree::{FieldOrder, FieldValue, NodeKind, NodeRef, Scalar, SyntaxNode, SyntaxTree};

/// Tagged nodes shallower than this start expanded.
const EXPANDED_NODE_DEPTH: u32 = 1;
/// Arrays shallower than this start expanded.
const EXPANDED_ARRAY_DEPTH: u32 = 3;
/// Scalar fields used as an inline summary, in order of preference.
const SUMMARY_FIELDS: &[&str] = &["name", "operator", "value", "raw"];

/// Where a walk starts.
#[derive(Clone, Debug)]
pub(crate) enum WalkStart {
    /// Render `node` itself.
    Node {
        node: NodeRef,
        owner: Owner,
        depth: u32,
        parent: Option<RenderedId>,
    },
    /// Render the fields of an already displayed node, from ordinal `skip` on.
    Children {
        node: NodeRef,
        id: RenderedId,
        depth: u32,
        skip: usize,
    },
}

/// Counters for one walk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct WalkStats {
    pub(crate) lazy_boundaries: usize,
    pub(crate) placeholders: usize,
    pub(crate) hit_node_budget: bool,
    pub(crate) hit_depth_limit: bool,
}

enum Frame {
    Visit {
        node: NodeRef,
        owner: Owner,
        depth: u32,
        parent: Option<RenderedId>,
    },
    Fields {
        node: NodeRef,
        id: RenderedId,
        depth: u32,
        order: FieldOrder,
        next: usize,
        /// Whether this frame's node sits on the `building` stack.
        open: bool,
    },
}

/// Borrowed engine state for the duration of one walk.
pub(crate) struct Walker<'a> {
    pub(crate) tree: &'a SyntaxTree,
    pub(crate) limits: &'a RenderLimits,
    pub(crate) expanded: &'a HashSet<NodeRef>,
    pub(crate) registry: &'a mut NodeRegistry,
    pub(crate) lazy: &'a mut DeferredStore<RenderedId>,
    pub(crate) truncated: &'a mut DeferredStore<PlaceholderId>,
    pub(crate) next_placeholder: &'a mut u32,
    /// Stop registering once the registry holds this many nodes.
    pub(crate) budget: usize,
    pub(crate) lazy_active: bool,
    pub(crate) stats: WalkStats,
}

impl Walker<'_> {
    /// Run the walk and return the produced top-level items.
    pub(crate) fn walk(&mut self, start: WalkStart) -> Result<Vec<RenderItem>, OutlineError> {
        let tree = self.tree;
        let mut out: Vec<RenderItem> = Vec::new();
        // Open nodes, innermost last. Finished nodes are emitted into their parent.
        let mut building: Vec<RenderedNode> = Vec::new();
        let mut stack: Vec<Frame> = Vec::new();

        let base_depth = match start {
            WalkStart::Node {
                node,
                owner,
                depth,
                parent,
            } => {
                stack.push(Frame::Visit {
                    node,
                    owner,
                    depth,
                    parent,
                });
                depth
            }
            WalkStart::Children {
                node,
                id,
                depth,
                skip,
            } => {
                tree.get(node).ok_or(OutlineError::Detached(node))?;
                stack.push(Frame::Fields {
                    node,
                    id,
                    depth,
                    order: tree.ordered_fields(node),
                    next: skip,
                    open: false,
                });
                depth
            }
        };

        while let Some(frame) = stack.pop() {
            match frame {
                Frame::Visit {
                    node,
                    owner,
                    depth,
                    parent,
                } => match self.visit(node, owner, depth, parent, base_depth)? {
                    Visited::Leaf(item) => emit(&mut building, &mut out, item),
                    Visited::Open(rendered, fields) => {
                        building.push(rendered);
                        stack.push(fields);
                    }
                },
                Frame::Fields {
                    node,
                    id,
                    depth,
                    order,
                    next,
                    open,
                } => {
                    let Some(field_idx) = order.get(next).copied() else {
                        if open {
                            if let Some(done) = building.pop() {
                                emit(&mut building, &mut out, RenderItem::Node(done));
                            }
                        }
                        continue;
                    };
                    let n = tree.get(node).ok_or(OutlineError::Detached(node))?;
                    let field = &n.fields()[field_idx as usize];
                    let owner = match &field.name {
                        Some(name) => Owner::Field(name.clone()),
                        None => Owner::Element(field_idx as usize),
                    };
                    match &field.value {
                        FieldValue::Scalar(value) => {
                            let line = RenderItem::Scalar(ScalarLine {
                                owner,
                                value: value.clone(),
                            });
                            emit(&mut building, &mut out, line);
                            stack.push(Frame::Fields {
                                node,
                                id,
                                depth,
                                order,
                                next: next + 1,
                                open,
                            });
                        }
                        FieldValue::Node(_) if self.registry.len() >= self.budget => {
                            // One placeholder hides this field and every later one.
                            let entry = DeferredEntry {
                                node,
                                owner: self
                                    .registry
                                    .get(id)
                                    .map_or(Owner::Root, |e| e.owner.clone()),
                                depth,
                                is_array: n.is_array(),
                                scope: DeferredScope::Children { skip: next },
                                parent: Some(id),
                            };
                            self.stats.hit_node_budget = true;
                            let hidden = order.len() - next;
                            let item =
                                self.defer(entry, owner, TruncationReason::NodeBudget, hidden);
                            emit(&mut building, &mut out, item);
                            stack.push(Frame::Fields {
                                node,
                                id,
                                depth,
                                next: order.len(),
                                order,
                                open,
                            });
                        }
                        FieldValue::Node(child) => {
                            let child = *child;
                            stack.push(Frame::Fields {
                                node,
                                id,
                                depth,
                                order,
                                next: next + 1,
                                open,
                            });
                            stack.push(Frame::Visit {
                                node: child,
                                owner,
                                depth: depth + 1,
                                parent: Some(id),
                            });
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    fn visit(
        &mut self,
        node: NodeRef,
        owner: Owner,
        depth: u32,
        parent: Option<RenderedId>,
        base_depth: u32,
    ) -> Result<Visited, OutlineError> {
        let tree = self.tree;
        let n = tree.get(node).ok_or(OutlineError::Detached(node))?;
        let is_array = n.is_array();
        let relative = depth.saturating_sub(base_depth);

        let cut = if self.registry.len() >= self.budget {
            self.stats.hit_node_budget = true;
            Some(TruncationReason::NodeBudget)
        } else if relative >= self.limits.depth_limit() {
            self.stats.hit_depth_limit = true;
            Some(TruncationReason::DepthLimit)
        } else {
            None
        };
        if let Some(reason) = cut {
            let entry = DeferredEntry {
                node,
                owner: owner.clone(),
                depth,
                is_array,
                scope: DeferredScope::Subtree,
                parent,
            };
            return Ok(Visited::Leaf(self.defer(entry, owner, reason, 1)));
        }

        let order = tree.ordered_fields(node);
        let lazy = self.lazy_active
            && relative >= self.limits.lazy_pre_render_depth
            && n.has_child_nodes();

        let id = self.registry.register(node, owner.clone(), depth, is_array, parent);

        let default_open = if is_array {
            depth < EXPANDED_ARRAY_DEPTH
        } else {
            depth < EXPANDED_NODE_DEPTH
        };
        let mut flags = BlockFlags::empty();
        flags.set(BlockFlags::ARRAY, is_array);
        flags.set(BlockFlags::HAS_CHILDREN, !order.is_empty());
        flags.set(BlockFlags::LAZY, lazy);
        flags.set(
            BlockFlags::EXPANDED,
            !lazy && !order.is_empty() && (default_open || self.expanded.contains(&node)),
        );

        if lazy {
            self.lazy.insert(
                id,
                DeferredEntry {
                    node,
                    owner: owner.clone(),
                    depth,
                    is_array,
                    scope: DeferredScope::Children { skip: 0 },
                    parent: Some(id),
                },
            );
            self.stats.lazy_boundaries += 1;
        }

        let rendered = RenderedNode {
            id,
            owner,
            label: label_of(n),
            summary: summary_of(n),
            span: n.span(),
            flags,
            children: Vec::new(),
        };
        if lazy || order.is_empty() {
            return Ok(Visited::Leaf(RenderItem::Node(rendered)));
        }
        Ok(Visited::Open(
            rendered,
            Frame::Fields {
                node,
                id,
                depth,
                order,
                next: 0,
                open: true,
            },
        ))
    }

    fn defer(
        &mut self,
        entry: DeferredEntry,
        owner: Owner,
        reason: TruncationReason,
        hidden: usize,
    ) -> RenderItem {
        let id = PlaceholderId(self.registry.pass(), *self.next_placeholder);
        *self.next_placeholder = self.next_placeholder.wrapping_add(1);
        self.truncated.insert(id, entry);
        self.stats.placeholders += 1;
        RenderItem::Truncated(TruncatedPlaceholder {
            id,
            owner,
            reason,
            hidden,
        })
    }
}

enum Visited {
    Leaf(RenderItem),
    Open(RenderedNode, Frame),
}

fn emit(building: &mut [RenderedNode], out: &mut Vec<RenderItem>, item: RenderItem) {
    match building.last_mut() {
        Some(parent) => parent.children.push(item),
        None => out.push(item),
    }
}

fn label_of(n: &SyntaxNode) -> String {
    match n.kind() {
        NodeKind::Tagged(tag) => tag.clone(),
        NodeKind::Array => "Array".into(),
        NodeKind::Object => "Object".into(),
    }
}

fn summary_of(n: &SyntaxNode) -> Option<String> {
    if n.is_array() {
        let count = n.fields().len();
        return Some(if count == 1 {
            "1 element".into()
        } else {
            format!("{count} elements")
        });
    }
    SUMMARY_FIELDS.iter().find_map(|key| match n.scalar(key)? {
        Scalar::Null => None,
        // `value` keeps its quotes so string literals read as literals.
        Scalar::String(s) if *key != "value" => Some(s.clone()),
        other => Some(other.to_string()),
    })
}
