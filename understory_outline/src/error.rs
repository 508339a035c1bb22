// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use alloc::string::String;

use crate::tree::NodeRef;

/// Misuse of [`SyntaxTreeBuilder`](crate::SyntaxTreeBuilder).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    /// The node was not created by this builder.
    #[error("node {0:?} does not belong to this builder")]
    UnknownNode(NodeRef),
    /// The node is already linked under a parent.
    #[error("node {0:?} already has a parent")]
    AlreadyLinked(NodeRef),
    /// Linking would make a node its own ancestor.
    #[error("linking {child:?} under {parent:?} would create a cycle")]
    Cycle {
        /// Node being linked.
        child: NodeRef,
        /// Intended parent.
        parent: NodeRef,
    },
    /// Named fields cannot be added to arrays.
    #[error("node {0:?} is an array; use push_element")]
    NamedFieldOnArray(NodeRef),
    /// Elements can only be pushed to arrays.
    #[error("node {0:?} is not an array")]
    NotAnArray(NodeRef),
    /// The chosen root is linked under another node.
    #[error("root {0:?} is linked under another node")]
    RootHasParent(NodeRef),
}

/// Failure to turn JSON into a [`SyntaxTree`](crate::SyntaxTree).
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    /// The text is not valid JSON.
    #[error("invalid JSON: {message}")]
    InvalidJson {
        /// Parser message, with position.
        message: String,
    },
    /// The JSON nests deeper than the parser's recursion limit.
    #[error("input nests too deeply: {message}")]
    TooDeep {
        /// Parser message, with position.
        message: String,
    },
    /// The top-level value is a primitive rather than an object or array.
    #[error("the root must be an object or an array")]
    NotANode,
    /// A `type` or `kind` tag is present but not a string.
    #[error("`{key}` must be a string")]
    InvalidKind {
        /// The offending key.
        key: &'static str,
    },
    /// A `loc` or `span` object is present but incomplete, or ends before it starts.
    #[error("malformed `{key}` on a `{kind}` node")]
    MalformedSpan {
        /// The offending key.
        key: &'static str,
        /// Kind tag of the node carrying it.
        kind: String,
    },
    /// Building the arena failed.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// A render pass that could not complete.
///
/// These only arise when the tree handed to an operation is not the one the
/// current pass was rendered from. The pass should be treated as aborted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OutlineError {
    /// A node referenced by the walk is not part of the tree.
    #[error("node {0:?} is not part of the tree being rendered")]
    Detached(NodeRef),
}
