// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_span_index --heading-base-level=0

//! Understory Span Index: a line-bucketed index over source spans.
//!
//! Understory Span Index answers "which node is under the text cursor" for tools that
//! keep a rendered view of a syntax tree next to an editor.
//!
//! - Insert spans (line/column extents) with small, copyable payloads.
//! - [`SpanIndex::commit`] buckets them per line, both under the line they start on and
//!   under every line they touch, and keeps each bucket sorted smallest-span first.
//! - [`SpanIndex::query`] returns the most specific entry containing a position by
//!   scanning a single bucket, falling back to a nearby window and finally a linear scan.
//!
//! The dual bucketing trades memory for constant-time bucket selection on both
//! "what starts here" and "what merely covers here" questions.
//!
//! # Example
//!
//! ```rust
//! use understory_span_index::{Span, SpanIndex};
//!
//! let mut idx: SpanIndex<u32> = SpanIndex::new();
//! idx.insert(Span::new(1, 0, 1, 10), 1, 10);
//! idx.insert(Span::new(2, 0, 2, 20), 1, 20);
//! idx.insert(Span::new(2, 0, 2, 20), 2, 21);
//! idx.commit();
//!
//! // Equal spans: the deeper entry is more specific.
//! assert_eq!(idx.query(2, 5).unwrap().payload, 21);
//! assert_eq!(idx.query(1, 3).unwrap().payload, 10);
//! ```
//!
//! ## Features
//!
//! - `serde`: derives `Serialize`/`Deserialize` for [`Span`].
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod index;
mod span;

pub use index::{DEFAULT_NEARBY_WINDOW, Lookup, LookupSource, MAX_SPANNING_LINES, SpanIndex};
pub use span::{LINE_WEIGHT, Span};
