// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_outline_sync --heading-base-level=0

//! Understory Outline Sync: keep an outline and a text cursor pointing at the same node.
//!
//! [`understory_outline`] can find the node under a position and reveal it. This crate adds
//! the parts that depend on time and on who caused a change:
//!
//! - [`Debounce`]: a single-slot request queue with a deadline, so a burst of cursor moves
//!   becomes one lookup for the last position.
//! - [`SelectionEcho`]: recognizes the selection events programmatic selections produce, even
//!   when several are reported together, so following the cursor never moves the cursor.
//! - [`OutlineSession`]: one tree, its engine state, a surface and a [`JumpSink`], driven by
//!   [`OutlineSession::tick`].
//!
//! ## Flow
//!
//! 1) The editor reports [`CursorEvent`]s; events from editors other than the one the tree
//!    came from are dropped.
//! 2) On the tick after the debounce delay, the position is resolved. With lazy boundaries or
//!    truncation in the pass the raw tree is searched and placeholders are materialized;
//!    otherwise the span index answers directly.
//! 3) The node is revealed and selected with the echo guard armed.
//! 4) Selections the user makes on the surface call [`JumpSink::jump_to`] with the start of
//!    the node's span.
//!
//! # Example
//!
//! ```rust
//! use understory_outline::{JsonAstParser, RenderLimits, RenderSurface, RetainedSurface};
//! use understory_outline_sync::{CursorEvent, EditorId, OutlineSession};
//!
//! let source = r#"{
//!     "type": "Program",
//!     "span": { "startLine": 1, "startColumn": 0, "endLine": 1, "endColumn": 9 },
//!     "body": [{
//!         "type": "Identifier",
//!         "name": "answer",
//!         "span": { "startLine": 1, "startColumn": 2, "endLine": 1, "endColumn": 8 }
//!     }]
//! }"#;
//!
//! let mut jumps = Vec::new();
//! let mut session = OutlineSession::new(
//!     RenderLimits::default(),
//!     RetainedSurface::new(),
//!     |editor: EditorId, line: u32, column: u32| jumps.push((editor, line, column)),
//! );
//! let editor = EditorId(7);
//! session.load(&mut JsonAstParser, source, editor).unwrap();
//!
//! session.on_cursor(CursorEvent { editor, line: 1, column: 4 }, 0);
//! session.tick(100);
//! let selected = session.surface().selected().unwrap();
//! assert_eq!(session.pump_surface_events(), 0, "following the cursor does not jump");
//!
//! session.surface_mut().select(selected);
//! assert_eq!(session.pump_surface_events(), 1);
//! drop(session);
//! assert_eq!(jumps, [(editor, 1, 2)]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod debounce;
mod echo;
mod session;

pub use debounce::{DEFAULT_DEBOUNCE_MS, Debounce, DebouncePhase};
pub use echo::{MAX_PENDING_ECHOES, SelectionEcho};
pub use session::{CursorEvent, EditorId, JumpSink, OutlineSession};
