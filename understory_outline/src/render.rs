// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The serializable description handed to a rendering surface.

use alloc::string::String;
use alloc::vec::Vec;

use understory_span_index::Span;

use crate::registry::{Owner, PlaceholderId, RenderedId};
use crate::tree::Scalar;

bitflags::bitflags! {
    /// Presentation flags of a rendered node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
    #[serde(transparent)]
    pub struct BlockFlags: u8 {
        /// Children are shown.
        const EXPANDED     = 0b0000_0001;
        /// Children exist but have not been materialized.
        const LAZY         = 0b0000_0010;
        /// The node is an array.
        const ARRAY        = 0b0000_0100;
        /// The node has fields to show.
        const HAS_CHILDREN = 0b0000_1000;
    }
}

/// Why materialization stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub enum TruncationReason {
    /// The pass ran out of node budget.
    NodeBudget,
    /// The depth limit was reached.
    DepthLimit,
}

/// A node block.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct RenderedNode {
    /// Stable id for this pass.
    pub id: RenderedId,
    /// Property the node hangs under.
    pub owner: Owner,
    /// Kind tag, or `Array` / `Object` for containers.
    pub label: String,
    /// Short inline summary such as an identifier name.
    pub summary: Option<String>,
    /// Source location badge.
    pub span: Option<Span>,
    /// Presentation flags.
    pub flags: BlockFlags,
    /// Materialized children. Empty for lazy boundaries.
    pub children: Vec<RenderItem>,
}

/// A block standing in for content that was not materialized.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct TruncatedPlaceholder {
    /// Handle used to load the hidden content.
    pub id: PlaceholderId,
    /// Property of the first hidden item.
    pub owner: Owner,
    /// What stopped the walk.
    pub reason: TruncationReason,
    /// Number of hidden direct items.
    pub hidden: usize,
}

/// A primitive field shown as a single line.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ScalarLine {
    /// Property name or element index.
    pub owner: Owner,
    /// The value.
    pub value: Scalar,
}

/// One renderable block.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "type")]
pub enum RenderItem {
    /// A syntax node or container.
    Node(RenderedNode),
    /// A truncation placeholder.
    Truncated(TruncatedPlaceholder),
    /// A primitive field.
    Scalar(ScalarLine),
}

impl RenderItem {
    /// The node block, if this is one.
    pub fn as_node(&self) -> Option<&RenderedNode> {
        match self {
            Self::Node(n) => Some(n),
            _ => None,
        }
    }
}

/// Output of a full render.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize)]
pub struct RenderPlan {
    /// Top-level blocks.
    pub items: Vec<RenderItem>,
    /// Number of nodes registered by the pass.
    pub rendered: usize,
    /// Whether any truncation placeholder was emitted.
    pub truncated: bool,
    /// Whether the pass used lazy boundaries.
    pub lazy: bool,
}

/// What a surface should display.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(tag = "state")]
pub enum OutlineView {
    /// No tree.
    Empty,
    /// A forced render is about to run.
    Rendering,
    /// A rendered tree.
    Tree(RenderPlan),
    /// The source did not parse.
    ParseError {
        /// Parser message.
        message: String,
        /// Extra guidance for the user.
        hint: Option<&'static str>,
    },
    /// The render pass was aborted.
    Failed {
        /// What went wrong.
        message: String,
    },
}
