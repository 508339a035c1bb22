// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_outline --heading-base-level=0

//! Understory Outline: a bounded, incrementally materialized outline of a syntax tree.
//!
//! Understory Outline turns a parsed program tree of any size or depth into an expandable
//! outline without ever walking more of it than a budget allows.
//!
//! - A single explicit-stack walk decides per node whether to render it, stop at a lazy
//!   boundary, or hide the rest behind a truncation placeholder.
//! - Every rendered node gets a generational [`RenderedId`] and an entry in the
//!   [`NodeRegistry`]; hidden content is kept in [`DeferredStore`]s until someone asks for it.
//! - Rendered spans feed an [`understory_span_index::SpanIndex`], so a text cursor maps to
//!   the most specific rendered node without scanning the tree.
//! - [`OutlineState::seek`] walks the raw tree instead and materializes placeholders until
//!   the node under the cursor is rendered.
//!
//! Nothing recurses over input-controlled depth: trees live in a flat arena, walks use
//! explicit stacks, and [`RetainedSurface`] flattens what it is given.
//!
//! ## Where this fits
//!
//! The crate owns only derived bookkeeping. The tree comes from a [`ParseService`], and
//! whatever displays the outline implements [`RenderSurface`]. Debouncing cursor events and
//! suppressing selection feedback live one level up, in `understory_outline_sync`.
//!
//! ## API overview
//!
//! - [`SyntaxTree`] / [`SyntaxTreeBuilder`]: the immutable program tree.
//! - [`OutlineState`]: render, index, resolve, reveal and seek.
//! - [`RenderLimits`] / [`OutlineSettings`]: limits and their persisted form.
//! - [`OutlineView`] / [`RenderItem`]: the serializable render description.
//! - [`RenderSurface`] / [`RetainedSurface`]: the display seam and an in-memory surface.
//!
//! # Example
//!
//! ```rust
//! use understory_outline::{
//!     OutlineState, RenderLimits, RetainedSurface, SeekOutcome, tree_from_json,
//! };
//!
//! let tree = tree_from_json(&serde_json::json!({
//!     "type": "Program",
//!     "span": { "startLine": 1, "startColumn": 0, "endLine": 2, "endColumn": 20 },
//!     "body": [{
//!         "type": "ExpressionStatement",
//!         "span": { "startLine": 2, "startColumn": 0, "endLine": 2, "endColumn": 20 },
//!         "expression": {
//!             "type": "CallExpression",
//!             "span": { "startLine": 2, "startColumn": 0, "endLine": 2, "endColumn": 20 }
//!         }
//!     }]
//! }))
//! .unwrap();
//!
//! let mut state = OutlineState::new(RenderLimits::default());
//! let mut surface = RetainedSurface::new();
//! state.render(&tree, &mut surface).unwrap();
//! state.build_index();
//!
//! // Equal spans: the deeper call expression is the most specific match.
//! let id = state.node_at(2, 5).unwrap().payload;
//! let node = state.registry().get(id).unwrap().node;
//! assert_eq!(tree.get(node).unwrap().kind_tag(), Some("CallExpression"));
//!
//! assert_eq!(state.seek(&tree, 2, 5, &mut surface).unwrap(), SeekOutcome::Found(id));
//! assert!(state.reveal(id, &mut surface));
//! assert_eq!(surface.selected(), Some(id));
//! ```
//!
//! ## Features
//!
//! - `json` (default): ESTree-shaped JSON import, [`JsonAstParser`], and JSON settings.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod deferred;
mod error;
#[cfg(feature = "json")]
mod import;
mod parse;
mod planner;
mod registry;
mod render;
mod settings;
mod state;
mod surface;
mod tree;

pub use understory_span_index::{Lookup, LookupSource, Span};

pub use deferred::{DeferredEntry, DeferredScope, DeferredStore};
pub use error::{BuildError, ImportError, OutlineError};
#[cfg(feature = "json")]
pub use import::{tree_from_json, tree_from_json_str};
#[cfg(feature = "json")]
pub use parse::JsonAstParser;
pub use parse::{
    ParseFailure, ParseFailureKind, ParseOutcome, ParseService, STACK_EXHAUSTED_HINT,
};
pub use registry::{NodeRegistry, Owner, PlaceholderId, RegistryEntry, RenderedId};
pub use render::{
    BlockFlags, OutlineView, RenderItem, RenderPlan, RenderedNode, ScalarLine,
    TruncatedPlaceholder, TruncationReason,
};
pub use settings::{
    FORCED_NODE_CAP, HARD_DEPTH_CEILING, OutlineSettings, RESOLVE_BUDGET, RenderLimits,
};
pub use state::{MAX_SEEK_ITERATIONS, OutlineState, PassStats, SeekOutcome};
pub use surface::{
    Block, BlockContent, RenderSurface, RetainedSurface, SpliceTarget, SurfaceEvent,
    SurfaceStatus,
};
pub use tree::{
    Field, FieldValue, NodeKind, NodeRef, Scalar, SyntaxNode, SyntaxTree, SyntaxTreeBuilder,
};
