// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The rendering surface seam and a retained in-memory implementation.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use hashbrown::HashMap;
use understory_span_index::Span;

use crate::registry::{Owner, PlaceholderId, RenderedId};
use crate::render::{BlockFlags, OutlineView, RenderItem, TruncationReason};
use crate::tree::Scalar;

/// A placeholder that materialized content replaces or fills.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SpliceTarget {
    /// A lazy boundary; content becomes its children.
    Lazy(RenderedId),
    /// A truncation placeholder; content takes its place among its siblings.
    Truncated(PlaceholderId),
}

/// Notifications a surface reports back to its host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// A node was selected, whoever caused it.
    SelectionChanged(RenderedId),
}

/// Whatever displays the outline.
///
/// The engine never assumes a block still exists. Every mutator reports
/// whether its target was found, and `false` is treated as a no-op.
pub trait RenderSurface {
    /// Replace the whole display.
    fn show(&mut self, view: &OutlineView);

    /// Whether `target` is currently displayed.
    fn has_target(&self, target: SpliceTarget) -> bool;

    /// Insert materialized content at `target`.
    fn splice(&mut self, target: SpliceTarget, items: Vec<RenderItem>) -> bool;

    /// Expand or collapse a node.
    fn set_expanded(&mut self, id: RenderedId, expanded: bool) -> bool;

    /// Select a node.
    fn select(&mut self, id: RenderedId) -> bool;

    /// Scroll a node into view.
    fn scroll_into_view(&mut self, id: RenderedId) -> bool;
}

/// Content of one retained block.
#[derive(Clone, Debug, PartialEq)]
pub enum BlockContent {
    /// A node header.
    Node {
        /// Node id.
        id: RenderedId,
        /// Owning property.
        owner: Owner,
        /// Kind label.
        label: String,
        /// Inline summary.
        summary: Option<String>,
        /// Location badge.
        span: Option<Span>,
        /// Flags as rendered; `EXPANDED` tracks later toggles.
        flags: BlockFlags,
    },
    /// A truncation placeholder.
    Placeholder {
        /// Placeholder id.
        id: PlaceholderId,
        /// Property of the first hidden item.
        owner: Owner,
        /// Why it was truncated.
        reason: TruncationReason,
        /// Hidden direct items.
        hidden: usize,
    },
    /// A primitive field.
    Scalar {
        /// Owning property.
        owner: Owner,
        /// The value.
        value: Scalar,
    },
}

/// A retained block.
#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    /// What the block shows.
    pub content: BlockContent,
    /// Slot of the parent block.
    pub parent: Option<usize>,
    /// Child slots in display order.
    pub children: Vec<usize>,
}

/// Coarse state of a [`RetainedSurface`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// Nothing shown.
    #[default]
    Empty,
    /// Interim state before a forced render.
    Rendering,
    /// A tree is shown.
    Tree,
    /// A parse error is shown.
    ParseError {
        /// Parser message.
        message: String,
        /// Extra guidance.
        hint: Option<&'static str>,
    },
    /// A failed pass is shown.
    Failed {
        /// Failure message.
        message: String,
    },
}

/// An in-memory [`RenderSurface`] that keeps blocks in a flat arena.
///
/// Nothing here recurses over the displayed content. Like a real toolkit it
/// reports every selection, programmatic or not, through
/// [`take_events`](Self::take_events).
#[derive(Clone, Default)]
pub struct RetainedSurface {
    blocks: Vec<Option<Block>>,
    roots: Vec<usize>,
    by_id: HashMap<RenderedId, usize>,
    by_placeholder: HashMap<PlaceholderId, usize>,
    status: SurfaceStatus,
    selected: Option<RenderedId>,
    scrolled_to: Option<RenderedId>,
    events: Vec<SurfaceEvent>,
}

impl fmt::Debug for RetainedSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetainedSurface")
            .field("status", &self.status)
            .field("nodes", &self.by_id.len())
            .field("placeholders", &self.by_placeholder.len())
            .field("selected", &self.selected)
            .finish_non_exhaustive()
    }
}

impl RetainedSurface {
    /// Create an empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// What the surface is showing.
    pub fn status(&self) -> &SurfaceStatus {
        &self.status
    }

    /// Number of node blocks.
    pub fn node_count(&self) -> usize {
        self.by_id.len()
    }

    /// Ids of outstanding truncation placeholders.
    pub fn placeholders(&self) -> impl Iterator<Item = PlaceholderId> + '_ {
        self.by_placeholder.keys().copied()
    }

    /// The block showing node `id`.
    pub fn block(&self, id: RenderedId) -> Option<&Block> {
        self.by_id.get(&id).and_then(|s| self.slot(*s))
    }

    /// Content of the children of node `id`, in display order.
    pub fn children_of(&self, id: RenderedId) -> Vec<&BlockContent> {
        self.block(id)
            .map(|b| {
                b.children
                    .iter()
                    .filter_map(|s| self.slot(*s))
                    .map(|b| &b.content)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether node `id` is shown expanded.
    pub fn is_expanded(&self, id: RenderedId) -> bool {
        matches!(
            self.block(id).map(|b| &b.content),
            Some(BlockContent::Node { flags, .. }) if flags.contains(BlockFlags::EXPANDED)
        )
    }

    /// The selected node.
    pub fn selected(&self) -> Option<RenderedId> {
        self.selected
    }

    /// The node last scrolled into view.
    pub fn scrolled_to(&self) -> Option<RenderedId> {
        self.scrolled_to
    }

    /// Drain queued events.
    pub fn take_events(&mut self) -> Vec<SurfaceEvent> {
        core::mem::take(&mut self.events)
    }

    /// Visible lines as indented text; collapsed subtrees are skipped.
    pub fn lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|s| (*s, 0)).collect();
        while let Some((slot, indent)) = stack.pop() {
            let Some(block) = self.slot(slot) else {
                continue;
            };
            let pad = "  ".repeat(indent);
            let owner = |o: &Owner| match o {
                Owner::Root => String::new(),
                o => format!("{o}: "),
            };
            let line = match &block.content {
                BlockContent::Node {
                    owner: o,
                    label,
                    summary,
                    span,
                    flags,
                    ..
                } => {
                    let marker = if flags.contains(BlockFlags::LAZY) {
                        "+"
                    } else if flags.contains(BlockFlags::EXPANDED) {
                        "v"
                    } else if flags.contains(BlockFlags::HAS_CHILDREN) {
                        ">"
                    } else {
                        " "
                    };
                    let mut line = format!("{pad}{marker} {}{label}", owner(o));
                    if let Some(s) = summary {
                        line.push_str(&format!(" {s}"));
                    }
                    if let Some(s) = span {
                        line.push_str(&format!(
                            " ({}:{}-{}:{})",
                            s.start_line, s.start_column, s.end_line, s.end_column
                        ));
                    }
                    if flags.contains(BlockFlags::EXPANDED) {
                        stack.extend(block.children.iter().rev().map(|c| (*c, indent + 1)));
                    }
                    line
                }
                BlockContent::Placeholder { hidden, reason, .. } => {
                    let why = match reason {
                        TruncationReason::NodeBudget => "node limit",
                        TruncationReason::DepthLimit => "depth limit",
                    };
                    format!("{pad}… {hidden} more ({why})")
                }
                BlockContent::Scalar { owner: o, value } => format!("{pad}  {}{value}", owner(o)),
            };
            out.push(line);
        }
        out
    }

    fn slot(&self, slot: usize) -> Option<&Block> {
        self.blocks.get(slot).and_then(Option::as_ref)
    }

    fn clear(&mut self) {
        self.blocks.clear();
        self.roots.clear();
        self.by_id.clear();
        self.by_placeholder.clear();
        self.selected = None;
        self.scrolled_to = None;
    }

    fn child_list(&mut self, parent: Option<usize>) -> Option<&mut Vec<usize>> {
        match parent {
            None => Some(&mut self.roots),
            Some(p) => self.blocks.get_mut(p)?.as_mut().map(|b| &mut b.children),
        }
    }

    /// Append `items` under `parent`, flattening nested children.
    fn attach(&mut self, parent: Option<usize>, items: Vec<RenderItem>) {
        let mut work = alloc::vec![(parent, items)];
        while let Some((parent, items)) = work.pop() {
            for item in items {
                let slot = self.blocks.len();
                let (content, children) = match item {
                    RenderItem::Node(n) => {
                        self.by_id.insert(n.id, slot);
                        (
                            BlockContent::Node {
                                id: n.id,
                                owner: n.owner,
                                label: n.label,
                                summary: n.summary,
                                span: n.span,
                                flags: n.flags,
                            },
                            n.children,
                        )
                    }
                    RenderItem::Truncated(t) => {
                        self.by_placeholder.insert(t.id, slot);
                        (
                            BlockContent::Placeholder {
                                id: t.id,
                                owner: t.owner,
                                reason: t.reason,
                                hidden: t.hidden,
                            },
                            Vec::new(),
                        )
                    }
                    RenderItem::Scalar(s) => (
                        BlockContent::Scalar {
                            owner: s.owner,
                            value: s.value,
                        },
                        Vec::new(),
                    ),
                };
                self.blocks.push(Some(Block {
                    content,
                    parent,
                    children: Vec::new(),
                }));
                if let Some(list) = self.child_list(parent) {
                    list.push(slot);
                }
                if !children.is_empty() {
                    work.push((Some(slot), children));
                }
            }
        }
    }

    fn set_flag(&mut self, id: RenderedId, flag: BlockFlags, on: bool) -> bool {
        let Some(slot) = self.by_id.get(&id).copied() else {
            return false;
        };
        match self.blocks.get_mut(slot).and_then(Option::as_mut) {
            Some(Block {
                content: BlockContent::Node { flags, .. },
                ..
            }) => {
                flags.set(flag, on);
                true
            }
            _ => false,
        }
    }
}

impl RenderSurface for RetainedSurface {
    fn show(&mut self, view: &OutlineView) {
        self.clear();
        self.status = match view {
            OutlineView::Empty => SurfaceStatus::Empty,
            OutlineView::Rendering => SurfaceStatus::Rendering,
            OutlineView::Tree(plan) => {
                self.attach(None, plan.items.clone());
                SurfaceStatus::Tree
            }
            OutlineView::ParseError { message, hint } => SurfaceStatus::ParseError {
                message: message.clone(),
                hint: *hint,
            },
            OutlineView::Failed { message } => SurfaceStatus::Failed {
                message: message.clone(),
            },
        };
    }

    fn has_target(&self, target: SpliceTarget) -> bool {
        match target {
            SpliceTarget::Lazy(id) => matches!(
                self.block(id).map(|b| &b.content),
                Some(BlockContent::Node { flags, .. }) if flags.contains(BlockFlags::LAZY)
            ),
            SpliceTarget::Truncated(id) => self.by_placeholder.contains_key(&id),
        }
    }

    fn splice(&mut self, target: SpliceTarget, items: Vec<RenderItem>) -> bool {
        if !self.has_target(target) {
            return false;
        }
        match target {
            SpliceTarget::Lazy(id) => {
                let Some(slot) = self.by_id.get(&id).copied() else {
                    return false;
                };
                self.set_flag(id, BlockFlags::LAZY, false);
                self.set_flag(id, BlockFlags::EXPANDED, true);
                self.attach(Some(slot), items);
                true
            }
            SpliceTarget::Truncated(id) => {
                let Some(slot) = self.by_placeholder.remove(&id) else {
                    return false;
                };
                let parent = self.slot(slot).and_then(|b| b.parent);
                let before = self.child_list(parent).map_or(0, |l| l.len());
                self.attach(parent, items);
                let Some(list) = self.child_list(parent) else {
                    return false;
                };
                let added: Vec<usize> = list.drain(before..).collect();
                if let Some(pos) = list.iter().position(|s| *s == slot) {
                    drop(list.splice(pos..=pos, added));
                }
                self.blocks[slot] = None;
                true
            }
        }
    }

    fn set_expanded(&mut self, id: RenderedId, expanded: bool) -> bool {
        self.set_flag(id, BlockFlags::EXPANDED, expanded)
    }

    fn select(&mut self, id: RenderedId) -> bool {
        if !self.by_id.contains_key(&id) {
            return false;
        }
        self.selected = Some(id);
        self.events.push(SurfaceEvent::SelectionChanged(id));
        true
    }

    fn scroll_into_view(&mut self, id: RenderedId) -> bool {
        if !self.by_id.contains_key(&id) {
            return false;
        }
        self.scrolled_to = Some(id);
        true
    }
}
