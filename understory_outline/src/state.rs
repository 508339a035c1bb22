// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine state for one outline view.

use alloc::vec::Vec;
use core::fmt;

use hashbrown::{HashMap, HashSet};
use understory_span_index::{Lookup, SpanIndex};

use crate::deferred::{DeferredEntry, DeferredScope, DeferredStore};
use crate::error::OutlineError;
use crate::planner::{WalkStart, WalkStats, Walker};
use crate::registry::{NodeRegistry, Owner, PlaceholderId, RenderedId};
use crate::render::{OutlineView, RenderItem, RenderPlan};
use crate::settings::RenderLimits;
use crate::surface::{RenderSurface, SpliceTarget};
use crate::tree::{FieldValue, NodeRef, SyntaxTree};

/// Resolutions a single [`OutlineState::seek`] may perform.
pub const MAX_SEEK_ITERATIONS: usize = 128;

/// Statistics of the current pass, including later resolutions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PassStats {
    /// Pass number.
    pub pass: u32,
    /// Nodes registered so far.
    pub rendered: usize,
    /// Whether the pass renders with lazy boundaries.
    pub lazy_active: bool,
    /// Lazy boundaries emitted so far.
    pub lazy_boundaries: usize,
    /// Truncation placeholders emitted so far.
    pub placeholders: usize,
    /// Whether any walk ran out of node budget.
    pub hit_node_budget: bool,
    /// Whether any walk reached the depth limit.
    pub hit_depth_limit: bool,
    /// Placeholders resolved so far.
    pub resolutions: usize,
}

impl PassStats {
    fn absorb(&mut self, walk: WalkStats) {
        self.lazy_boundaries += walk.lazy_boundaries;
        self.placeholders += walk.placeholders;
        self.hit_node_budget |= walk.hit_node_budget;
        self.hit_depth_limit |= walk.hit_depth_limit;
    }
}

/// Result of [`OutlineState::seek`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The node containing the position is rendered.
    Found(RenderedId),
    /// Materialization stopped early; this is its deepest rendered ancestor.
    Ancestor(RenderedId),
    /// Nothing in the tree contains the position.
    NotFound,
}

impl SeekOutcome {
    /// The id to select, if any.
    pub fn id(self) -> Option<RenderedId> {
        match self {
            Self::Found(id) | Self::Ancestor(id) => Some(id),
            Self::NotFound => None,
        }
    }
}

/// Everything derived from the tree for one outline view: limits, registry,
/// deferred stores, span index and remembered expansions.
///
/// A full [`render`](Self::render) replaces all of it; resolvers only extend it.
/// Handles from an earlier pass are recognized as stale and ignored.
///
/// ```
/// use understory_outline::{OutlineState, RenderLimits, RetainedSurface, Span, SyntaxTreeBuilder};
///
/// let mut b = SyntaxTreeBuilder::new();
/// let program = b.tagged("Program", Some(Span::new(1, 0, 2, 20)));
/// let body = b.array();
/// let decl = b.tagged("VariableDeclaration", Some(Span::new(1, 0, 1, 10)));
/// b.push_element(body, decl).unwrap();
/// b.add_field(program, "body", body).unwrap();
/// let tree = b.finish(program).unwrap();
///
/// let mut state = OutlineState::new(RenderLimits::default());
/// let mut surface = RetainedSurface::new();
/// state.render(&tree, &mut surface).unwrap();
/// state.build_index();
///
/// let hit = state.node_at(1, 3).unwrap();
/// assert_eq!(state.registry().get(hit.payload).unwrap().node, decl);
/// ```
pub struct OutlineState {
    limits: RenderLimits,
    registry: NodeRegistry,
    lazy: DeferredStore<RenderedId>,
    truncated: DeferredStore<PlaceholderId>,
    next_placeholder: u32,
    index: SpanIndex<RenderedId>,
    /// Registry entries before this position are in `index`.
    indexed: usize,
    expanded: HashSet<NodeRef>,
    stats: PassStats,
}

impl fmt::Debug for OutlineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutlineState")
            .field("limits", &self.limits)
            .field("stats", &self.stats)
            .field("lazy", &self.lazy.len())
            .field("truncated", &self.truncated.len())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl Default for OutlineState {
    fn default() -> Self {
        Self::new(RenderLimits::default())
    }
}

impl OutlineState {
    /// Create an empty state with the given limits.
    pub fn new(limits: RenderLimits) -> Self {
        Self {
            limits,
            registry: NodeRegistry::new(),
            lazy: DeferredStore::default(),
            truncated: DeferredStore::default(),
            next_placeholder: 0,
            index: SpanIndex::new(),
            indexed: 0,
            expanded: HashSet::new(),
            stats: PassStats::default(),
        }
    }

    /// Current limits.
    pub fn limits(&self) -> &RenderLimits {
        &self.limits
    }

    /// Replace the limits. Takes effect on the next [`render`](Self::render).
    pub fn set_limits(&mut self, limits: RenderLimits) {
        self.limits = limits;
    }

    /// The node registry of the current pass.
    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    /// Outstanding lazy boundaries.
    pub fn lazy_store(&self) -> &DeferredStore<RenderedId> {
        &self.lazy
    }

    /// Outstanding truncation placeholders.
    pub fn truncated_store(&self) -> &DeferredStore<PlaceholderId> {
        &self.truncated
    }

    /// Statistics of the current pass.
    pub fn stats(&self) -> PassStats {
        PassStats {
            rendered: self.registry.len(),
            ..self.stats
        }
    }

    /// Whether the current pass renders with lazy boundaries.
    pub fn lazy_active(&self) -> bool {
        self.stats.lazy_active
    }

    /// Whether truncated content is still hidden somewhere.
    pub fn has_truncation(&self) -> bool {
        !self.truncated.is_empty()
    }

    /// Whether every rendered node is bucketed in the span index.
    pub fn index_ready(&self) -> bool {
        self.index.is_committed()
    }

    /// Forget remembered expansions, for when a different tree is loaded.
    pub fn forget_expanded(&mut self) {
        self.expanded.clear();
    }

    /// Drop everything derived from the tree.
    ///
    /// Outstanding handles become stale.
    pub fn clear(&mut self) {
        self.registry.begin_pass();
        self.lazy.clear();
        self.truncated.clear();
        self.next_placeholder = 0;
        self.index.clear();
        self.indexed = 0;
        self.expanded.clear();
        self.stats = PassStats {
            pass: self.registry.pass(),
            ..PassStats::default()
        };
    }

    fn begin_pass(&mut self) -> u32 {
        let pass = self.registry.begin_pass();
        self.lazy.clear();
        self.truncated.clear();
        self.next_placeholder = 0;
        self.index.clear();
        self.indexed = 0;
        self.stats = PassStats {
            pass,
            ..PassStats::default()
        };
        pass
    }

    /// Render `tree` from scratch and show it on `surface`.
    ///
    /// Every earlier handle becomes stale. The span index for the new pass is
    /// filled but not bucketed; lookups fall back to a linear scan until
    /// [`build_index`](Self::build_index) runs.
    ///
    /// On error the pass is discarded and nothing is shown; the caller should
    /// display a terminal error state.
    pub fn render<S: RenderSurface + ?Sized>(
        &mut self,
        tree: &SyntaxTree,
        surface: &mut S,
    ) -> Result<PassStats, OutlineError> {
        let pass = self.begin_pass();
        let Some(root) = tree.root() else {
            log::debug!("pass {pass}: empty tree");
            surface.show(&OutlineView::Empty);
            return Ok(self.stats());
        };

        let threshold = self.limits.lazy_threshold_nodes;
        self.stats.lazy_active =
            self.limits.lazy_enabled && tree.count_nodes_bounded(threshold) > threshold;

        let start = WalkStart::Node {
            node: root,
            owner: Owner::Root,
            depth: 0,
            parent: None,
        };
        let items = match self.walk(tree, start, self.limits.max_nodes) {
            Ok(items) => items,
            Err(e) => {
                log::warn!("pass {pass} aborted: {e}");
                self.begin_pass();
                return Err(e);
            }
        };
        self.index_new_entries(tree);

        let stats = self.stats();
        log::debug!(
            "pass {pass}: {} nodes, {} lazy boundaries, {} placeholders",
            stats.rendered,
            stats.lazy_boundaries,
            stats.placeholders
        );
        surface.show(&OutlineView::Tree(RenderPlan {
            items,
            rendered: stats.rendered,
            truncated: stats.placeholders > 0,
            lazy: stats.lazy_active,
        }));
        Ok(stats)
    }

    /// Bucket pending index entries. Returns how many were bucketed.
    pub fn build_index(&mut self) -> usize {
        let n = self.index.commit();
        if n > 0 {
            log::debug!("pass {}: indexed {n} spans", self.registry.pass());
        }
        n
    }

    /// The most specific rendered node containing `(line, column)`.
    ///
    /// Never fails; before [`build_index`](Self::build_index) or in gaps it
    /// degrades to slower or approximate lookups, see [`Lookup::source`].
    pub fn node_at(&self, line: u32, column: u32) -> Option<Lookup<RenderedId>> {
        let hit = self.index.query(line, column);
        if let Some(h) = &hit {
            log::trace!("{line}:{column} -> {:?} via {:?}", h.payload, h.source);
        }
        hit
    }

    /// Materialize the children of a lazy boundary.
    ///
    /// Returns `false` without touching anything when `id` is stale, already
    /// resolved, or no longer displayed.
    pub fn resolve_lazy<S: RenderSurface + ?Sized>(
        &mut self,
        tree: &SyntaxTree,
        id: RenderedId,
        surface: &mut S,
    ) -> Result<bool, OutlineError> {
        let target = SpliceTarget::Lazy(id);
        if !self.lazy.contains(id) || !surface.has_target(target) {
            log::trace!("lazy boundary {id:?} is gone; nothing to resolve");
            return Ok(false);
        }
        let Some(entry) = self.lazy.take(id) else {
            return Ok(false);
        };
        let start = WalkStart::Children {
            node: entry.node,
            id,
            depth: entry.depth,
            skip: 0,
        };
        let items = self.materialize(tree, start)?;
        surface.splice(target, items);
        self.expanded.insert(entry.node);
        Ok(true)
    }

    /// Materialize the content behind a truncation placeholder.
    ///
    /// The walk gets [`RenderLimits::resolve_budget`] more nodes. If that runs
    /// out again, a new placeholder covers the rest.
    pub fn resolve_truncated<S: RenderSurface + ?Sized>(
        &mut self,
        tree: &SyntaxTree,
        id: PlaceholderId,
        surface: &mut S,
    ) -> Result<bool, OutlineError> {
        let target = SpliceTarget::Truncated(id);
        if !self.truncated.contains(id) || !surface.has_target(target) {
            log::trace!("placeholder {id:?} is gone; nothing to resolve");
            return Ok(false);
        }
        let Some(entry) = self.truncated.take(id) else {
            return Ok(false);
        };
        let start = match (entry.scope, entry.parent) {
            (DeferredScope::Children { skip }, Some(parent)) => WalkStart::Children {
                node: entry.node,
                id: parent,
                depth: entry.depth,
                skip,
            },
            (DeferredScope::Children { .. }, None) => return Ok(false),
            (DeferredScope::Subtree, parent) => WalkStart::Node {
                node: entry.node,
                owner: entry.owner,
                depth: entry.depth,
                parent,
            },
        };
        let items = self.materialize(tree, start)?;
        surface.splice(target, items);
        Ok(true)
    }

    /// Resolve whichever kind of placeholder `target` names.
    pub fn resolve<S: RenderSurface + ?Sized>(
        &mut self,
        tree: &SyntaxTree,
        target: SpliceTarget,
        surface: &mut S,
    ) -> Result<bool, OutlineError> {
        match target {
            SpliceTarget::Lazy(id) => self.resolve_lazy(tree, id, surface),
            SpliceTarget::Truncated(id) => self.resolve_truncated(tree, id, surface),
        }
    }

    /// Expand or collapse a rendered node and remember the choice for later passes.
    ///
    /// Lazy boundaries are resolved by [`resolve_lazy`](Self::resolve_lazy), not here.
    pub fn set_expanded<S: RenderSurface + ?Sized>(
        &mut self,
        id: RenderedId,
        expanded: bool,
        surface: &mut S,
    ) -> bool {
        let Some(entry) = self.registry.get(id) else {
            return false;
        };
        if expanded {
            self.expanded.insert(entry.node);
        } else {
            self.expanded.remove(&entry.node);
        }
        surface.set_expanded(id, expanded)
    }

    /// Expand every ancestor of `id` and the node itself, then select it and
    /// scroll it into view.
    ///
    /// Returns `false` if `id` is stale or the surface lost the node.
    pub fn reveal<S: RenderSurface + ?Sized>(&mut self, id: RenderedId, surface: &mut S) -> bool {
        if !self.registry.is_live(id) {
            return false;
        }
        let mut chain: Vec<RenderedId> = self.registry.ancestors(id).collect();
        chain.reverse();
        chain.push(id);
        for a in chain {
            if self.lazy.contains(a) {
                continue;
            }
            if let Some(entry) = self.registry.get(a) {
                self.expanded.insert(entry.node);
            }
            surface.set_expanded(a, true);
        }
        surface.select(id) && surface.scroll_into_view(id)
    }

    /// Find the node containing `(line, column)` in the raw tree and
    /// materialize placeholders until it is rendered.
    ///
    /// Works regardless of what is currently rendered. At most
    /// [`MAX_SEEK_ITERATIONS`] placeholders are resolved; after that the
    /// deepest rendered ancestor is reported instead.
    pub fn seek<S: RenderSurface + ?Sized>(
        &mut self,
        tree: &SyntaxTree,
        line: u32,
        column: u32,
        surface: &mut S,
    ) -> Result<SeekOutcome, OutlineError> {
        let Some(target) = tree.deepest_containing(line, column) else {
            return Ok(SeekOutcome::NotFound);
        };
        let path = tree.path_to(target);
        for _ in 0..MAX_SEEK_ITERATIONS {
            if let Some(id) = self.registry.id_of(target) {
                return Ok(SeekOutcome::Found(id));
            }
            let Some(next) = self.deferred_on_path(tree, &path) else {
                break;
            };
            if !self.resolve(tree, next, surface)? {
                break;
            }
        }
        if let Some(id) = self.registry.id_of(target) {
            return Ok(SeekOutcome::Found(id));
        }
        log::warn!("seek to {line}:{column} stopped before reaching {target:?}");
        Ok(path
            .iter()
            .rev()
            .find_map(|n| self.registry.id_of(*n))
            .map_or(SeekOutcome::NotFound, SeekOutcome::Ancestor))
    }

    /// The deepest outstanding placeholder hiding part of `path`.
    fn deferred_on_path(&self, tree: &SyntaxTree, path: &[NodeRef]) -> Option<SpliceTarget> {
        let position: HashMap<NodeRef, usize> =
            path.iter().enumerate().map(|(i, n)| (*n, i)).collect();
        let hides = |entry: &DeferredEntry| -> Option<usize> {
            let at = *position.get(&entry.node)?;
            match entry.scope {
                DeferredScope::Subtree => Some(at),
                DeferredScope::Children { skip } => {
                    let next = *path.get(at + 1)?;
                    let ordinal = child_ordinal(tree, entry.node, next)?;
                    (ordinal >= skip).then_some(at)
                }
            }
        };
        let lazy = self
            .lazy
            .iter()
            .filter_map(|(id, e)| hides(e).map(|at| (at, SpliceTarget::Lazy(id))));
        let truncated = self
            .truncated
            .iter()
            .filter_map(|(id, e)| hides(e).map(|at| (at, SpliceTarget::Truncated(id))));
        lazy.chain(truncated)
            .max_by_key(|(at, _)| *at)
            .map(|(_, target)| target)
    }

    fn walk(
        &mut self,
        tree: &SyntaxTree,
        start: WalkStart,
        budget: usize,
    ) -> Result<Vec<RenderItem>, OutlineError> {
        let mut walker = Walker {
            tree,
            limits: &self.limits,
            expanded: &self.expanded,
            registry: &mut self.registry,
            lazy: &mut self.lazy,
            truncated: &mut self.truncated,
            next_placeholder: &mut self.next_placeholder,
            budget,
            lazy_active: self.stats.lazy_active,
            stats: WalkStats::default(),
        };
        let items = walker.walk(start);
        let walk_stats = walker.stats;
        self.stats.absorb(walk_stats);
        items
    }

    /// Walk a deferred entry with a relaxed budget and index what it registered.
    fn materialize(
        &mut self,
        tree: &SyntaxTree,
        start: WalkStart,
    ) -> Result<Vec<RenderItem>, OutlineError> {
        let before = self.registry.len();
        let budget = before + self.limits.resolve_budget;
        let items = self.walk(tree, start, budget)?;
        self.index_new_entries(tree);
        self.index.commit();
        self.stats.resolutions += 1;
        log::debug!(
            "pass {}: resolution added {} nodes",
            self.registry.pass(),
            self.registry.len() - before
        );
        Ok(items)
    }

    fn index_new_entries(&mut self, tree: &SyntaxTree) {
        for entry in self.registry.entries_from(self.indexed) {
            if let Some(span) = tree.get(entry.node).and_then(|n| n.span()) {
                self.index.insert(span, entry.depth, entry.id);
            }
        }
        self.indexed = self.registry.len();
    }
}

/// Display-order position of the field of `parent` holding `child`.
fn child_ordinal(tree: &SyntaxTree, parent: NodeRef, child: NodeRef) -> Option<usize> {
    let node = tree.get(parent)?;
    tree.ordered_fields(parent)
        .iter()
        .position(|i| node.fields()[*i as usize].value == FieldValue::Node(child))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::BlockFlags;
    use crate::surface::{BlockContent, RetainedSurface, SurfaceStatus};
    use crate::tree::SyntaxTreeBuilder;
    use understory_span_index::{LookupSource, Span};

    fn sp(l: u32, c: u32, el: u32, ec: u32) -> Option<Span> {
        Some(Span::new(l, c, el, ec))
    }

    fn id_of(state: &OutlineState, node: NodeRef) -> RenderedId {
        state.registry().id_of(node).expect("node should be rendered")
    }

    /// `Program { body: [VariableDeclaration, ExpressionStatement { expression: CallExpression }] }`
    fn scenario() -> (SyntaxTree, [NodeRef; 4]) {
        let mut b = SyntaxTreeBuilder::new();
        let program = b.tagged("Program", None);
        let body = b.array();
        let decl = b.tagged("VariableDeclaration", sp(1, 0, 1, 10));
        let stmt = b.tagged("ExpressionStatement", sp(2, 0, 2, 20));
        let call = b.tagged("CallExpression", sp(2, 0, 2, 20));
        b.add_field(stmt, "expression", call).unwrap();
        b.push_element(body, decl).unwrap();
        b.push_element(body, stmt).unwrap();
        b.add_field(program, "body", body).unwrap();
        (b.finish(program).unwrap(), [program, decl, stmt, call])
    }

    fn render(tree: &SyntaxTree, limits: RenderLimits) -> (OutlineState, RetainedSurface) {
        let mut state = OutlineState::new(limits);
        let mut surface = RetainedSurface::new();
        state.render(tree, &mut surface).unwrap();
        state.build_index();
        (state, surface)
    }

    #[test]
    fn concrete_scenario() {
        let (tree, [program, decl, stmt, call]) = scenario();
        let (state, _) = render(&tree, RenderLimits::default());

        let tagged: Vec<NodeRef> = state
            .registry()
            .iter()
            .map(|e| e.node)
            .filter(|n| tree.get(*n).unwrap().kind_tag().is_some())
            .collect();
        assert_eq!(tagged, [program, decl, stmt, call]);
        assert_eq!(state.registry().len(), 5, "the body array is registered as a container");

        let hit = state.node_at(2, 5).unwrap();
        assert_eq!(hit.payload, id_of(&state, call), "deeper node wins on equal spans");
        assert!(hit.source.is_exact());
        assert_eq!(state.node_at(1, 3).unwrap().payload, id_of(&state, decl));
    }

    #[test]
    fn every_node_finds_itself_at_its_start() {
        // Every node starts on its own line.
        let mut b = SyntaxTreeBuilder::new();
        let program = b.tagged("Program", sp(1, 0, 40, 0));
        let body = b.array();
        for k in 0..10 {
            let line = 2 + 3 * k;
            let func = b.tagged("FunctionDeclaration", sp(line, 0, line + 2, 14));
            let block = b.tagged("BlockStatement", sp(line + 1, 2, line + 2, 13));
            let ret = b.tagged("ReturnStatement", sp(line + 2, 4, line + 2, 12));
            let stmts = b.array();
            b.push_element(stmts, ret).unwrap();
            b.add_field(block, "body", stmts).unwrap();
            b.add_field(func, "body", block).unwrap();
            b.push_element(body, func).unwrap();
        }
        b.add_field(program, "body", body).unwrap();
        let tree = b.finish(program).unwrap();
        let (state, _) = render(&tree, RenderLimits::default());

        let mut checked = 0;
        for entry in state.registry().iter() {
            let Some(span) = tree.get(entry.node).unwrap().span() else {
                continue;
            };
            let hit = state.node_at(span.start_line, span.start_column).unwrap();
            assert_eq!(hit.payload, entry.id, "lookup at the start of {:?}", entry.node);
            checked += 1;
        }
        assert_eq!(checked, 31);
    }

    #[test]
    fn empty_tree_shows_empty_state() {
        let mut state = OutlineState::default();
        let mut surface = RetainedSurface::new();
        let stats = state.render(&SyntaxTree::empty(), &mut surface).unwrap();
        assert_eq!(stats.rendered, 0);
        assert_eq!(surface.status(), &SurfaceStatus::Empty);
        assert!(state.node_at(1, 0).is_none());
    }

    fn flat(leaves: u32) -> (SyntaxTree, Vec<NodeRef>) {
        let mut b = SyntaxTreeBuilder::new();
        let root = b.array();
        let mut out = Vec::new();
        for i in 0..leaves {
            let leaf = b.tagged("ExpressionStatement", sp(i + 1, 0, i + 1, 8));
            b.push_element(root, leaf).unwrap();
            out.push(leaf);
        }
        (b.finish(root).unwrap(), out)
    }

    #[test]
    fn node_budget_truncates_with_one_placeholder() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let (tree, leaves) = flat(11);
        let (mut state, mut surface) = render(&tree, limits);

        assert_eq!(state.registry().len(), 10, "exactly the budget is rendered");
        assert_eq!(state.truncated_store().len(), 1);
        let placeholders: Vec<_> = surface.placeholders().collect();
        assert_eq!(placeholders.len(), 1);
        assert!(state.stats().hit_node_budget);
        assert!(state.has_truncation());

        let last = leaves[10];
        let before = state.node_at(11, 2).unwrap();
        assert_eq!(before.source, LookupSource::Nearby, "hidden leaves are not indexed yet");

        assert!(state.resolve_truncated(&tree, placeholders[0], &mut surface).unwrap());
        assert_eq!(state.registry().len(), 12);
        assert!(!state.has_truncation());
        let after = state.node_at(11, 2).unwrap();
        assert_eq!(after.payload, id_of(&state, last));
        assert_eq!(after.source, LookupSource::StartingLine);

        // The materialized leaves take the placeholder's place, in order.
        let root = id_of(&state, tree.root().unwrap());
        let children = surface.children_of(root);
        assert_eq!(children.len(), 11);
        assert!(matches!(
            children[10],
            BlockContent::Node { id, .. } if *id == after.payload
        ));
    }

    #[test]
    fn resolving_twice_is_a_noop() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let (tree, _) = flat(30);
        let (mut state, mut surface) = render(&tree, limits);
        let placeholder = surface.placeholders().next().unwrap();

        assert!(state.resolve_truncated(&tree, placeholder, &mut surface).unwrap());
        let registered = state.registry().len();
        let outstanding = state.truncated_store().len();
        assert!(!state.resolve_truncated(&tree, placeholder, &mut surface).unwrap());
        assert_eq!(state.registry().len(), registered);
        assert_eq!(state.truncated_store().len(), outstanding);
    }

    #[test]
    fn relaxed_budget_loads_in_steps() {
        let limits = RenderLimits {
            max_nodes: 10,
            resolve_budget: 100,
            ..RenderLimits::default()
        };
        let (tree, leaves) = flat(500);
        let (mut state, mut surface) = render(&tree, limits);

        let mut rounds = 0;
        loop {
            let next = surface.placeholders().next();
            let Some(p) = next else {
                break;
            };
            assert!(state.resolve_truncated(&tree, p, &mut surface).unwrap());
            rounds += 1;
        }
        assert_eq!(rounds, 5, "ceil(491 / 100) resolutions");
        assert_eq!(state.registry().len(), 501);
        assert_eq!(state.node_at(500, 0).unwrap().payload, id_of(&state, leaves[499]));
    }

    #[test]
    fn stale_handles_are_ignored() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let (tree, _) = flat(20);
        let (mut state, mut surface) = render(&tree, limits);
        let old_placeholder = surface.placeholders().next().unwrap();
        let old_root = id_of(&state, tree.root().unwrap());

        state.render(&tree, &mut surface).unwrap();
        assert!(!state.resolve_truncated(&tree, old_placeholder, &mut surface).unwrap());
        assert!(!state.reveal(old_root, &mut surface));

        // A surface that lost the block makes resolution a no-op too.
        let live = surface.placeholders().next().unwrap();
        surface.show(&OutlineView::Empty);
        assert!(!state.resolve_truncated(&tree, live, &mut surface).unwrap());
        assert_eq!(state.truncated_store().len(), 1);
    }

    /// `count` wrappers, each the single child of the previous one.
    fn nested(count: u32) -> (SyntaxTree, Vec<NodeRef>) {
        let mut b = SyntaxTreeBuilder::with_capacity(count as usize);
        let nodes: Vec<NodeRef> = (0..count)
            .map(|i| b.tagged("ParenthesizedExpression", sp(1, i, 1, 3 * count - i)))
            .collect();
        for pair in nodes.windows(2) {
            b.add_field(pair[0], "expression", pair[1]).unwrap();
        }
        (b.finish(nodes[0]).unwrap(), nodes)
    }

    #[test]
    fn deep_nesting_stops_at_the_depth_limit() {
        let (tree, nodes) = nested(10_000);
        let limits = RenderLimits {
            lazy_enabled: false,
            ..RenderLimits::default()
        };
        let (state, surface) = render(&tree, limits);
        assert_eq!(state.registry().len(), 50);
        assert!(state.stats().hit_depth_limit);
        let (_, entry) = state.truncated_store().iter().next().unwrap();
        assert_eq!(entry.node, nodes[50]);
        assert_eq!(entry.scope, DeferredScope::Subtree);
        assert_eq!(surface.node_count(), 50);

        let hit = state.node_at(1, 9_000).unwrap();
        assert_eq!(hit.payload, id_of(&state, nodes[49]));
    }

    #[test]
    fn hard_ceiling_overrides_settings() {
        let (tree, _) = nested(10_000);
        let limits = RenderLimits {
            lazy_enabled: false,
            max_depth: 100_000,
            ..RenderLimits::default()
        };
        let mut state = OutlineState::new(limits);
        let mut surface = RetainedSurface::new();
        state.render(&tree, &mut surface).unwrap();
        assert_eq!(state.registry().len(), crate::settings::HARD_DEPTH_CEILING as usize);
        let placeholders: Vec<_> = state.truncated_store().iter().collect();
        assert_eq!(placeholders.len(), 1);

        let forced = state.limits().forced();
        state.set_limits(forced);
        state.render(&tree, &mut surface).unwrap();
        assert_eq!(
            state.registry().len(),
            crate::settings::HARD_DEPTH_CEILING as usize,
            "forcing a render does not lift the ceiling"
        );
    }

    #[test]
    fn seek_materializes_depth_placeholders() {
        let (tree, nodes) = nested(10_000);
        let limits = RenderLimits {
            lazy_enabled: false,
            ..RenderLimits::default()
        };
        let (mut state, mut surface) = render(&tree, limits.clone());

        let found = state.seek(&tree, 1, 120, &mut surface).unwrap();
        assert_eq!(found, SeekOutcome::Found(id_of(&state, nodes[120])));
        assert_eq!(state.stats().resolutions, 2);

        // Too deep to reach within the iteration budget.
        let (mut state, mut surface) = render(&tree, limits);
        let outcome = state.seek(&tree, 1, 9_999, &mut surface).unwrap();
        let reached = 50 * (MAX_SEEK_ITERATIONS + 1);
        assert_eq!(state.registry().len(), reached);
        assert_eq!(outcome, SeekOutcome::Ancestor(id_of(&state, nodes[reached - 1])));
        assert!(state.reveal(outcome.id().unwrap(), &mut surface));
    }

    /// Five functions, each with a block of three call statements.
    fn functions() -> (SyntaxTree, Vec<NodeRef>, Vec<NodeRef>) {
        let mut b = SyntaxTreeBuilder::new();
        let program = b.tagged("Program", sp(1, 0, 60, 0));
        let body = b.array();
        let mut blocks = Vec::new();
        let mut calls = Vec::new();
        for k in 0..5 {
            let line = 10 * k + 2;
            let func = b.tagged("FunctionDeclaration", sp(line, 0, line + 4, 1));
            let name = b.tagged("Identifier", sp(line, 9, line, 10));
            b.add_field(name, "name", crate::tree::Scalar::from("f")).unwrap();
            let block = b.tagged("BlockStatement", sp(line, 13, line + 4, 1));
            let stmts = b.array();
            for j in 0..3 {
                let l = line + 1 + j;
                let stmt = b.tagged("ExpressionStatement", sp(l, 4, l, 20));
                let call = b.tagged("CallExpression", sp(l, 4, l, 19));
                b.add_field(stmt, "expression", call).unwrap();
                b.push_element(stmts, stmt).unwrap();
                calls.push(call);
            }
            b.add_field(block, "body", stmts).unwrap();
            b.add_field(func, "id", name).unwrap();
            b.add_field(func, "body", block).unwrap();
            b.push_element(body, func).unwrap();
            blocks.push(block);
        }
        b.add_field(program, "body", body).unwrap();
        (b.finish(program).unwrap(), blocks, calls)
    }

    fn lazy_limits() -> RenderLimits {
        RenderLimits {
            lazy_threshold_nodes: 10,
            lazy_pre_render_depth: 3,
            ..RenderLimits::default()
        }
    }

    #[test]
    fn lazy_boundary_round_trip() {
        let (tree, blocks, calls) = functions();
        let (mut state, mut surface) = render(&tree, lazy_limits());
        assert!(state.lazy_active());
        assert_eq!(state.lazy_store().len(), 5);

        let block = id_of(&state, blocks[0]);
        assert!(state.registry().id_of(calls[0]).is_none(), "children stay unmaterialized");
        let flags = match &surface.block(block).unwrap().content {
            BlockContent::Node { flags, .. } => *flags,
            other => panic!("unexpected block {other:?}"),
        };
        assert!(flags.contains(BlockFlags::LAZY));
        assert!(surface.children_of(block).is_empty());
        assert_eq!(
            state.node_at(3, 10).unwrap().payload,
            block,
            "before resolution the boundary is the best match"
        );

        assert!(state.resolve_lazy(&tree, block, &mut surface).unwrap());
        assert!(!state.resolve_lazy(&tree, block, &mut surface).unwrap());
        assert_eq!(state.node_at(3, 10).unwrap().payload, id_of(&state, calls[0]));
        assert!(surface.is_expanded(block));
        assert_eq!(state.lazy_store().len(), 4);
    }

    #[test]
    fn seek_resolves_lazy_boundaries() {
        let (tree, _, calls) = functions();
        let (mut state, mut surface) = render(&tree, lazy_limits());
        // Line 45 holds the third call of the last function.
        let outcome = state.seek(&tree, 45, 6, &mut surface).unwrap();
        assert_eq!(outcome, SeekOutcome::Found(id_of(&state, calls[14])));
        assert_eq!(state.stats().resolutions, 1);
        assert!(state.reveal(outcome.id().unwrap(), &mut surface));
        assert_eq!(surface.scrolled_to(), outcome.id());
    }

    #[test]
    fn reveal_expands_ancestors_and_is_remembered() {
        let (tree, [_, _, stmt, call]) = scenario();
        let (mut state, mut surface) = render(&tree, RenderLimits::default());
        let stmt_id = id_of(&state, stmt);
        assert!(!surface.is_expanded(stmt_id), "depth-2 nodes start collapsed");

        assert!(state.reveal(id_of(&state, call), &mut surface));
        assert!(surface.is_expanded(stmt_id));
        assert_eq!(surface.selected(), Some(id_of(&state, call)));

        state.render(&tree, &mut surface).unwrap();
        assert!(
            surface.is_expanded(id_of(&state, stmt)),
            "expansion survives a re-render"
        );
    }

    #[test]
    fn placeholders_show_what_they_hide() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let (tree, _) = flat(20);
        let (state, surface) = render(&tree, limits);
        let (_, entry) = state.truncated_store().iter().next().unwrap();
        assert_eq!(entry.scope, DeferredScope::Children { skip: 9 });

        let lines = surface.lines();
        assert_eq!(lines[0], "v Array 20 elements");
        assert_eq!(lines.len(), 11, "root, nine leaves and the placeholder");
        assert!(lines[10].contains("11 more (node limit)"), "got {:?}", lines[10]);
    }
}
