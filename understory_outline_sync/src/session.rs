// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One outline view bound to one editor.

use alloc::string::ToString;
use core::fmt;

use understory_outline::{
    OutlineError, OutlineState, OutlineView, ParseOutcome, ParseService, PassStats, PlaceholderId,
    RenderLimits, RenderSurface, RenderedId, RetainedSurface, SurfaceEvent, SyntaxTree,
};

use crate::debounce::Debounce;
use crate::echo::SelectionEcho;

/// Identifies a text editor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct EditorId(pub u64);

/// A cursor move reported by an editor. Lines are 1-based, columns 0-based.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorEvent {
    /// Editor the cursor moved in.
    pub editor: EditorId,
    /// Line.
    pub line: u32,
    /// Column.
    pub column: u32,
}

/// Moves an editor's text cursor.
pub trait JumpSink {
    /// Put the cursor of `editor` at `(line, column)`.
    fn jump_to(&mut self, editor: EditorId, line: u32, column: u32);
}

impl<F: FnMut(EditorId, u32, u32)> JumpSink for F {
    fn jump_to(&mut self, editor: EditorId, line: u32, column: u32) {
        self(editor, line, column);
    }
}

/// Ties a tree, its [`OutlineState`], a surface and a jump sink together.
///
/// Cursor events are debounced and resolved on [`tick`](Self::tick), which
/// is also where the interim "rendering" state of a forced render is replaced
/// by the real one and where the span index of a fresh pass gets built. The
/// host calls it from its event loop with the current time in milliseconds.
///
/// Selections the session makes itself are not turned into jumps; selections
/// reported by the surface for any other reason are.
pub struct OutlineSession<S, J> {
    tree: SyntaxTree,
    editor: Option<EditorId>,
    state: OutlineState,
    surface: S,
    jumps: J,
    debounce: Debounce<(u32, u32)>,
    echo: SelectionEcho,
    forced_pending: bool,
}

impl<S, J> fmt::Debug for OutlineSession<S, J> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutlineSession")
            .field("editor", &self.editor)
            .field("nodes", &self.tree.len())
            .field("state", &self.state)
            .field("debounce", &self.debounce.phase())
            .field("echo", &self.echo)
            .field("forced_pending", &self.forced_pending)
            .finish_non_exhaustive()
    }
}

impl<S: RenderSurface, J: JumpSink> OutlineSession<S, J> {
    /// Create a session with nothing loaded.
    pub fn new(limits: RenderLimits, surface: S, jumps: J) -> Self {
        Self {
            tree: SyntaxTree::empty(),
            editor: None,
            state: OutlineState::new(limits),
            surface,
            jumps,
            debounce: Debounce::new(),
            echo: SelectionEcho::new(),
            forced_pending: false,
        }
    }

    /// Replace the cursor debounce, for example to change its delay.
    pub fn with_debounce(mut self, debounce: Debounce<(u32, u32)>) -> Self {
        self.debounce = debounce;
        self
    }

    /// The loaded tree.
    pub fn tree(&self) -> &SyntaxTree {
        &self.tree
    }

    /// The editor whose cursor is followed.
    pub fn editor(&self) -> Option<EditorId> {
        self.editor
    }

    /// The engine state.
    pub fn state(&self) -> &OutlineState {
        &self.state
    }

    /// The surface.
    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// The surface, mutably. Changes made here bypass the engine.
    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    /// The jump sink.
    pub fn jumps(&self) -> &J {
        &self.jumps
    }

    /// The cursor debounce.
    pub fn debounce(&self) -> &Debounce<(u32, u32)> {
        &self.debounce
    }

    /// Parse `source` from `editor` and render the result.
    ///
    /// A parse failure clears the outline and shows the parser's message.
    pub fn load<P: ParseService + ?Sized>(
        &mut self,
        parser: &mut P,
        source: &str,
        editor: EditorId,
    ) -> Option<PassStats> {
        match parser.parse(source) {
            ParseOutcome::Parsed(tree) => self.set_tree(tree, editor),
            ParseOutcome::Failed(failure) => {
                log::debug!("parse failed ({:?}): {}", failure.kind, failure.message);
                self.reset(editor);
                self.tree = SyntaxTree::empty();
                self.debounce.cancel();
                self.echo.disarm();
                self.state.clear();
                self.surface.show(&OutlineView::ParseError {
                    hint: failure.hint(),
                    message: failure.message,
                });
                None
            }
        }
    }

    /// Show `tree`, following the cursor of `editor`.
    pub fn set_tree(&mut self, tree: SyntaxTree, editor: EditorId) -> Option<PassStats> {
        self.reset(editor);
        self.tree = tree;
        self.render_pass(None)
    }

    /// Change the limits and render again.
    pub fn set_limits(&mut self, limits: RenderLimits) -> Option<PassStats> {
        self.state.set_limits(limits);
        self.render_pass(None)
    }

    /// Drop the tree and show nothing.
    pub fn clear(&mut self) {
        self.tree = SyntaxTree::empty();
        self.editor = None;
        self.forced_pending = false;
        self.debounce.cancel();
        self.echo.disarm();
        self.state.clear();
        self.surface.show(&OutlineView::Empty);
    }

    /// Render everything up to the forced caps, ignoring laziness.
    ///
    /// The surface shows [`OutlineView::Rendering`] right away; the walk
    /// itself happens on the next [`tick`](Self::tick).
    pub fn request_full_render(&mut self) {
        self.debounce.cancel();
        self.echo.disarm();
        self.forced_pending = true;
        self.surface.show(&OutlineView::Rendering);
    }

    /// Whether a forced render is waiting for the next tick.
    pub fn full_render_pending(&self) -> bool {
        self.forced_pending
    }

    /// Drive deferred work.
    ///
    /// A pending forced render runs and ends the tick. Otherwise the span
    /// index of the current pass is built if needed, then a due cursor
    /// request is resolved.
    pub fn tick(&mut self, now: u64) {
        if self.forced_pending {
            self.forced_pending = false;
            let forced = self.state.limits().forced();
            self.render_pass(Some(forced));
            return;
        }
        if !self.state.index_ready() {
            self.state.build_index();
        }
        if let Some((line, column)) = self.debounce.poll(now) {
            self.sync_to(line, column);
            self.debounce.finish();
        }
    }

    /// Queue a cursor move. Moves in other editors are ignored.
    pub fn on_cursor(&mut self, event: CursorEvent, now: u64) {
        if self.editor != Some(event.editor) {
            log::trace!("ignoring cursor in {:?}", event.editor);
            return;
        }
        self.debounce.push((event.line, event.column), now);
    }

    /// Handle an event reported by the surface.
    pub fn on_surface_event(&mut self, event: SurfaceEvent) -> bool {
        match event {
            SurfaceEvent::SelectionChanged(id) => self.on_selection_changed(id),
        }
    }

    /// Handle a selection reported by the surface.
    ///
    /// Unless it echoes a selection made by cursor sync, the editor cursor
    /// jumps to the start of the node. Returns whether it jumped.
    pub fn on_selection_changed(&mut self, id: RenderedId) -> bool {
        if self.echo.consume(id) {
            log::trace!("selection of {id:?} came from cursor sync");
            return false;
        }
        let Some(editor) = self.editor else {
            return false;
        };
        let Some(span) = self
            .state
            .registry()
            .get(id)
            .and_then(|e| self.tree.get(e.node))
            .and_then(|n| n.span())
        else {
            return false;
        };
        self.jumps.jump_to(editor, span.start_line, span.start_column);
        true
    }

    /// Expand a node, materializing it first if it is a lazy boundary.
    pub fn expand(&mut self, id: RenderedId) -> bool {
        if self.state.lazy_store().contains(id) {
            let done = self.state.resolve_lazy(&self.tree, id, &mut self.surface);
            return self.settle(done);
        }
        self.state.set_expanded(id, true, &mut self.surface)
    }

    /// Collapse a node.
    pub fn collapse(&mut self, id: RenderedId) -> bool {
        self.state.set_expanded(id, false, &mut self.surface)
    }

    /// Load the content behind a truncation placeholder.
    pub fn load_more(&mut self, id: PlaceholderId) -> bool {
        let done = self.state.resolve_truncated(&self.tree, id, &mut self.surface);
        self.settle(done)
    }

    fn reset(&mut self, editor: EditorId) {
        self.editor = Some(editor);
        self.forced_pending = false;
        self.state.forget_expanded();
    }

    fn render_pass(&mut self, limits: Option<RenderLimits>) -> Option<PassStats> {
        self.debounce.cancel();
        self.echo.disarm();
        let saved = limits.map(|l| {
            let saved = self.state.limits().clone();
            self.state.set_limits(l);
            saved
        });
        let result = self.state.render(&self.tree, &mut self.surface);
        if let Some(saved) = saved {
            self.state.set_limits(saved);
        }
        match result {
            Ok(stats) => Some(stats),
            Err(e) => {
                self.fail(&e);
                None
            }
        }
    }

    fn sync_to(&mut self, line: u32, column: u32) {
        let hit = self.state.node_at(line, column);
        // The index only knows rendered nodes; anything hidden needs a seek.
        let target = if self.state.lazy_active() || self.state.has_truncation() {
            match self.state.seek(&self.tree, line, column, &mut self.surface) {
                Ok(outcome) => outcome.id().or(hit.map(|h| h.payload)),
                Err(e) => {
                    self.fail(&e);
                    return;
                }
            }
        } else {
            hit.map(|h| h.payload)
        };
        let Some(id) = target else {
            log::trace!("nothing at {line}:{column}");
            return;
        };
        self.echo.arm(id);
        if !self.state.reveal(id, &mut self.surface) {
            log::trace!("could not reveal {id:?}");
            self.echo.retract(id);
        }
    }

    fn settle(&mut self, result: Result<bool, OutlineError>) -> bool {
        match result {
            Ok(done) => done,
            Err(e) => {
                self.fail(&e);
                false
            }
        }
    }

    fn fail(&mut self, e: &OutlineError) {
        log::warn!("outline failed: {e}");
        self.debounce.cancel();
        self.echo.disarm();
        self.state.clear();
        self.surface.show(&OutlineView::Failed {
            message: e.to_string(),
        });
    }
}

impl<J: JumpSink> OutlineSession<RetainedSurface, J> {
    /// Feed everything the retained surface queued back into the session.
    ///
    /// Returns how many jumps were made.
    pub fn pump_surface_events(&mut self) -> usize {
        let events = self.surface.take_events();
        events
            .into_iter()
            .filter(|e| self.on_surface_event(*e))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec::Vec;
    use serde_json::json;
    use understory_outline::{
        JsonAstParser, STACK_EXHAUSTED_HINT, Scalar, SurfaceStatus, tree_from_json,
    };

    const EDITOR: EditorId = EditorId(1);

    #[derive(Debug, Default)]
    struct Jumps(Vec<(EditorId, u32, u32)>);

    impl JumpSink for Jumps {
        fn jump_to(&mut self, editor: EditorId, line: u32, column: u32) {
            self.0.push((editor, line, column));
        }
    }

    /// `n` one-line statements; statement `i` sits on line `i` and holds
    /// identifier `x{i}` at columns 4..=6.
    fn statements(n: u32) -> SyntaxTree {
        let body: Vec<_> = (1..=n)
            .map(|i| {
                json!({
                    "type": "ExpressionStatement",
                    "span": { "startLine": i, "startColumn": 0, "endLine": i, "endColumn": 20 },
                    "expression": {
                        "type": "Identifier",
                        "name": format!("x{i}"),
                        "span": { "startLine": i, "startColumn": 4, "endLine": i, "endColumn": 6 }
                    }
                })
            })
            .collect();
        tree_from_json(&json!({
            "type": "Program",
            "span": { "startLine": 1, "startColumn": 0, "endLine": n, "endColumn": 20 },
            "body": body
        }))
        .unwrap()
    }

    fn session(limits: RenderLimits) -> OutlineSession<RetainedSurface, Jumps> {
        let mut s = OutlineSession::new(limits, RetainedSurface::new(), Jumps::default());
        s.set_tree(statements(12), EDITOR);
        s
    }

    fn cursor(line: u32, column: u32) -> CursorEvent {
        CursorEvent {
            editor: EDITOR,
            line,
            column,
        }
    }

    fn selected_name(s: &OutlineSession<RetainedSurface, Jumps>) -> Option<Scalar> {
        let id = s.surface().selected()?;
        let node = s.state().registry().get(id)?.node;
        s.tree().get(node)?.scalar("name").cloned()
    }

    #[test]
    fn cursor_sync_never_jumps_back() {
        let mut s = session(RenderLimits::default());
        s.tick(0);
        assert!(s.state().index_ready(), "the first tick builds the index");

        s.on_cursor(cursor(10, 4), 100);
        s.tick(149);
        assert_eq!(s.surface().selected(), None, "still debouncing");
        s.tick(150);
        assert_eq!(selected_name(&s), Some(Scalar::from("x10")));
        assert_eq!(s.pump_surface_events(), 0);
        assert!(s.jumps().0.is_empty(), "a synced selection must not move the cursor");

        // The same node picked by the user does jump, exactly once.
        let id = s.surface().selected().unwrap();
        assert!(s.surface_mut().select(id));
        assert_eq!(s.pump_surface_events(), 1);
        assert_eq!(s.jumps().0, [(EDITOR, 10, 4)]);
    }

    #[test]
    fn syncs_queued_before_pumping_never_jump() {
        let mut s = session(RenderLimits::default());
        s.on_cursor(cursor(3, 4), 0);
        s.tick(50);
        assert_eq!(selected_name(&s), Some(Scalar::from("x3")));
        s.on_cursor(cursor(10, 4), 60);
        s.tick(110);
        assert_eq!(selected_name(&s), Some(Scalar::from("x10")));

        // Both selections are reported only now.
        assert_eq!(s.pump_surface_events(), 0);
        assert!(s.jumps().0.is_empty());

        // Afterwards the user's own selection still jumps.
        let id = s.surface().selected().unwrap();
        assert!(s.surface_mut().select(id));
        assert_eq!(s.pump_surface_events(), 1);
        assert_eq!(s.jumps().0, [(EDITOR, 10, 4)]);
    }

    #[test]
    fn bursts_resolve_once_for_the_last_position() {
        let mut s = session(RenderLimits::default());
        s.on_cursor(cursor(3, 4), 0);
        s.on_cursor(cursor(10, 4), 30);
        s.tick(60);
        assert_eq!(s.surface().selected(), None);
        s.tick(80);
        assert_eq!(selected_name(&s), Some(Scalar::from("x10")));
        assert_eq!(s.surface_mut().take_events().len(), 1, "one lookup for the burst");
    }

    #[test]
    fn other_editors_are_ignored() {
        let mut s = session(RenderLimits::default());
        s.on_cursor(
            CursorEvent {
                editor: EditorId(2),
                line: 10,
                column: 4,
            },
            0,
        );
        s.tick(1_000);
        assert_eq!(s.surface().selected(), None);
    }

    #[test]
    fn sync_reaches_truncated_nodes() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let mut s = session(limits);
        assert!(s.state().has_truncation());
        assert!(s.state().registry().len() <= 10);

        s.on_cursor(cursor(10, 4), 0);
        s.tick(50);
        assert_eq!(selected_name(&s), Some(Scalar::from("x10")));
        assert_eq!(s.state().stats().resolutions, 1);
        assert_eq!(s.pump_surface_events(), 0);
    }

    #[test]
    fn sync_opens_lazy_boundaries() {
        let limits = RenderLimits {
            lazy_threshold_nodes: 10,
            lazy_pre_render_depth: 2,
            ..RenderLimits::default()
        };
        let mut s = session(limits);
        assert!(s.state().lazy_active());
        assert_eq!(s.state().lazy_store().len(), 12, "every statement is a boundary");

        s.on_cursor(cursor(10, 4), 0);
        s.tick(50);
        assert_eq!(selected_name(&s), Some(Scalar::from("x10")));
        assert_eq!(s.state().lazy_store().len(), 11);
        assert_eq!(s.pump_surface_events(), 0);
    }

    #[test]
    fn expand_resolves_lazy_boundaries() {
        let limits = RenderLimits {
            lazy_threshold_nodes: 10,
            lazy_pre_render_depth: 2,
            ..RenderLimits::default()
        };
        let mut s = session(limits);
        let id = s.state().lazy_store().iter().next().map(|(id, _)| id).unwrap();
        let before = s.state().registry().len();
        assert!(s.expand(id));
        assert_eq!(s.state().registry().len(), before + 1, "its identifier");
        assert!(s.surface().is_expanded(id));
        assert!(s.expand(id), "a resolved boundary expands like any node");
        assert!(s.collapse(id));
        assert!(!s.surface().is_expanded(id));
    }

    #[test]
    fn forced_render_shows_an_interim_state_first() {
        let limits = RenderLimits {
            max_nodes: 10,
            ..RenderLimits::default()
        };
        let mut s = session(limits);
        assert!(s.state().has_truncation());

        s.request_full_render();
        assert!(s.full_render_pending());
        assert_eq!(s.surface().status(), &SurfaceStatus::Rendering);

        s.tick(0);
        assert_eq!(s.surface().status(), &SurfaceStatus::Tree);
        assert!(!s.state().has_truncation());
        assert_eq!(s.state().registry().len(), 26);
        assert_eq!(s.state().limits().max_nodes, 10, "forced limits last one pass");
    }

    #[test]
    fn new_renders_cancel_pending_cursor_requests() {
        let mut s = session(RenderLimits::default());
        s.on_cursor(cursor(10, 4), 0);
        s.set_tree(statements(3), EDITOR);
        s.tick(1_000);
        assert_eq!(s.surface().selected(), None);
    }

    #[test]
    fn parse_failures_are_shown() {
        let mut s = session(RenderLimits::default());
        assert!(s.load(&mut JsonAstParser, "{", EDITOR).is_none());
        assert!(matches!(
            s.surface().status(),
            SurfaceStatus::ParseError { hint: None, .. }
        ));
        assert!(s.state().registry().is_empty());

        let deep = "[".repeat(500) + &"]".repeat(500);
        assert!(s.load(&mut JsonAstParser, &deep, EDITOR).is_none());
        assert!(matches!(
            s.surface().status(),
            SurfaceStatus::ParseError { hint: Some(h), .. } if *h == STACK_EXHAUSTED_HINT
        ));

        let stats = s.load(&mut JsonAstParser, r#"{"type": "Program", "body": []}"#, EDITOR);
        assert_eq!(stats.map(|st| st.rendered), Some(2));
        assert_eq!(s.surface().status(), &SurfaceStatus::Tree);
    }

    #[test]
    fn closures_are_jump_sinks() {
        let mut seen = Vec::new();
        {
            let mut s = OutlineSession::new(
                RenderLimits::default(),
                RetainedSurface::new(),
                |e: EditorId, l: u32, c: u32| seen.push((e, l, c)),
            );
            s.set_tree(statements(2), EDITOR);
            let id = s.state().registry().iter().last().unwrap().id;
            s.surface_mut().select(id);
            s.pump_surface_events();
        }
        assert_eq!(seen, [(EDITOR, 2, 4)]);
    }
}
