// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The program tree: an immutable arena of syntax nodes and its builder.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use smallvec::SmallVec;
use understory_span_index::Span;

use crate::error::BuildError;

/// Handle to a node inside one [`SyntaxTree`].
///
/// This is the canonical identity of a tree node across render passes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeRef(pub(crate) u32);

impl NodeRef {
    #[allow(clippy::cast_possible_truncation, reason = "arenas are capped at u32::MAX nodes")]
    pub(crate) const fn from_idx(idx: usize) -> Self {
        Self(idx as u32)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A primitive leaf value.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum Scalar {
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::String(s.into())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// What a node is.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// A syntax node carrying a kind tag such as `CallExpression`.
    Tagged(String),
    /// An ordered list; its fields are unnamed elements.
    Array,
    /// A plain grouping of named fields without a tag.
    Object,
}

/// Value held by a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    /// A primitive leaf.
    Scalar(Scalar),
    /// A child node.
    Node(NodeRef),
}

impl From<Scalar> for FieldValue {
    fn from(s: Scalar) -> Self {
        Self::Scalar(s)
    }
}

impl From<NodeRef> for FieldValue {
    fn from(n: NodeRef) -> Self {
        Self::Node(n)
    }
}

/// A field of a node. Array elements have no name.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    /// Property name, or `None` for array elements.
    pub name: Option<String>,
    /// The value.
    pub value: FieldValue,
}

/// One node of a [`SyntaxTree`].
#[derive(Clone, Debug)]
pub struct SyntaxNode {
    kind: NodeKind,
    span: Option<Span>,
    fields: Vec<Field>,
    parent: Option<NodeRef>,
}

impl SyntaxNode {
    /// The node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// The kind tag, for tagged nodes.
    pub fn kind_tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Tagged(tag) => Some(tag),
            _ => None,
        }
    }

    /// Source extent, if known.
    pub fn span(&self) -> Option<Span> {
        self.span
    }

    /// Whether the node can take part in position lookups.
    pub fn has_span(&self) -> bool {
        self.span.is_some()
    }

    /// Whether this is an array or untagged grouping.
    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Array | NodeKind::Object)
    }

    /// Whether this is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, NodeKind::Array)
    }

    /// Fields in insertion order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The node this one is linked under.
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent
    }

    /// Child nodes in insertion order, skipping scalar fields.
    pub fn child_nodes(&self) -> impl DoubleEndedIterator<Item = NodeRef> + '_ {
        self.fields.iter().filter_map(|f| match f.value {
            FieldValue::Node(n) => Some(n),
            FieldValue::Scalar(_) => None,
        })
    }

    /// Whether any field holds a child node.
    pub fn has_child_nodes(&self) -> bool {
        self.child_nodes().next().is_some()
    }

    /// The scalar stored under `name`, if any.
    pub fn scalar(&self, name: &str) -> Option<&Scalar> {
        self.fields.iter().find_map(|f| match (&f.name, &f.value) {
            (Some(n), FieldValue::Scalar(s)) if n == name => Some(s),
            _ => None,
        })
    }
}

/// Structural properties shown first, in this order, so an outline reads in
/// source order. Anything else follows alphabetically.
const FIELD_PRIORITY: &[&str] = &[
    "id",
    "key",
    "declarations",
    "init",
    "test",
    "update",
    "discriminant",
    "left",
    "right",
    "callee",
    "object",
    "property",
    "params",
    "arguments",
    "argument",
    "expression",
    "consequent",
    "alternate",
    "cases",
    "block",
    "handler",
    "finalizer",
    "body",
    "elements",
    "properties",
];

fn field_rank(name: Option<&str>) -> usize {
    name.and_then(|n| FIELD_PRIORITY.iter().position(|p| *p == n))
        .unwrap_or(FIELD_PRIORITY.len())
}

/// Indices into [`SyntaxNode::fields`] in display order.
pub(crate) type FieldOrder = SmallVec<[u32; 8]>;

/// An immutable program tree.
///
/// Nodes live in a flat arena, so dropping or walking a tree never recurses
/// regardless of how deeply it is nested.
#[derive(Clone, Debug, Default)]
pub struct SyntaxTree {
    nodes: Vec<SyntaxNode>,
    root: Option<NodeRef>,
}

impl SyntaxTree {
    /// A tree with no nodes.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The root node, or `None` for an empty tree.
    pub fn root(&self) -> Option<NodeRef> {
        self.root
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node.
    pub fn get(&self, node: NodeRef) -> Option<&SyntaxNode> {
        self.nodes.get(node.idx())
    }

    /// Whether `node` belongs to this tree.
    pub fn contains(&self, node: NodeRef) -> bool {
        node.idx() < self.nodes.len()
    }

    /// Nodes from `node` up to the root, starting with `node` itself.
    pub fn ancestors(&self, node: NodeRef) -> impl Iterator<Item = NodeRef> + '_ {
        let start = self.contains(node).then_some(node);
        core::iter::successors(start, |n| self.get(*n).and_then(SyntaxNode::parent))
    }

    /// The chain of nodes from the root down to `node`, inclusive.
    pub fn path_to(&self, node: NodeRef) -> Vec<NodeRef> {
        let mut path: Vec<NodeRef> = self.ancestors(node).collect();
        path.reverse();
        path
    }

    /// Field indices of `node` in display order.
    ///
    /// Array elements keep their order; other nodes put well-known structural
    /// properties first and sort the rest by name.
    pub(crate) fn ordered_fields(&self, node: NodeRef) -> FieldOrder {
        let Some(n) = self.get(node) else {
            return FieldOrder::new();
        };
        #[allow(clippy::cast_possible_truncation, reason = "field counts fit in u32")]
        let mut order: FieldOrder = (0..n.fields.len() as u32).collect();
        if !n.is_array() {
            order.sort_by(|a, b| {
                let fa = n.fields[*a as usize].name.as_deref();
                let fb = n.fields[*b as usize].name.as_deref();
                field_rank(fa).cmp(&field_rank(fb)).then_with(|| fa.cmp(&fb))
            });
        }
        order
    }

    /// Number of nodes, stopping early once `limit` is exceeded.
    ///
    /// Returns at most `limit + 1`.
    pub fn count_nodes_bounded(&self, limit: usize) -> usize {
        let Some(root) = self.root else {
            return 0;
        };
        let mut count = 0;
        let mut stack = alloc::vec![root];
        while let Some(n) = stack.pop() {
            count += 1;
            if count > limit {
                break;
            }
            if let Some(node) = self.get(n) {
                stack.extend(node.child_nodes());
            }
        }
        count
    }

    /// The most specific node whose span contains `(line, column)`.
    ///
    /// Walks the raw tree with an explicit stack. Spanned subtrees that do not
    /// contain the position are pruned; span-less nodes are walked through.
    /// Smaller spans win, and the deeper node wins between equal spans.
    pub fn deepest_containing(&self, line: u32, column: u32) -> Option<NodeRef> {
        let root = self.root?;
        let mut best: Option<(NodeRef, i64, u32)> = None;
        let mut stack: Vec<(NodeRef, u32)> = alloc::vec![(root, 0)];
        while let Some((n, depth)) = stack.pop() {
            let Some(node) = self.get(n) else {
                continue;
            };
            if let Some(span) = node.span {
                if !span.contains(line, column) {
                    continue;
                }
                let size = span.size();
                let better = match best {
                    None => true,
                    Some((_, best_size, best_depth)) => {
                        size < best_size || (size == best_size && depth > best_depth)
                    }
                };
                if better {
                    best = Some((n, size, depth));
                }
            }
            stack.extend(node.child_nodes().rev().map(|c| (c, depth + 1)));
        }
        best.map(|(n, _, _)| n)
    }
}

/// Builds a [`SyntaxTree`] node by node.
///
/// Nodes are created detached and linked under a parent with
/// [`add_field`](Self::add_field) or [`push_element`](Self::push_element).
/// A node can be linked once; linking that would close a cycle is rejected.
///
/// ```
/// use understory_outline::{Scalar, Span, SyntaxTreeBuilder};
///
/// let mut b = SyntaxTreeBuilder::new();
/// let program = b.tagged("Program", Some(Span::new(1, 0, 1, 9)));
/// let body = b.array();
/// let stmt = b.tagged("ExpressionStatement", Some(Span::new(1, 0, 1, 9)));
/// b.push_element(body, stmt).unwrap();
/// b.add_field(program, "body", body).unwrap();
/// b.add_field(program, "sourceType", Scalar::from("module")).unwrap();
///
/// let tree = b.finish(program).unwrap();
/// assert_eq!(tree.len(), 3);
/// assert_eq!(tree.path_to(stmt), vec![program, body, stmt]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct SyntaxTreeBuilder {
    nodes: Vec<SyntaxNode>,
}

impl SyntaxTreeBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with room for `n` nodes.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, kind: NodeKind, span: Option<Span>) -> NodeRef {
        let r = NodeRef::from_idx(self.nodes.len());
        self.nodes.push(SyntaxNode {
            kind,
            span,
            fields: Vec::new(),
            parent: None,
        });
        r
    }

    /// Create a detached tagged node.
    pub fn tagged(&mut self, kind: impl Into<String>, span: Option<Span>) -> NodeRef {
        self.push(NodeKind::Tagged(kind.into()), span)
    }

    /// Create a detached array.
    pub fn array(&mut self) -> NodeRef {
        self.push(NodeKind::Array, None)
    }

    /// Create a detached untagged grouping.
    pub fn object(&mut self, span: Option<Span>) -> NodeRef {
        self.push(NodeKind::Object, span)
    }

    /// Add a named field to a tagged node or grouping.
    pub fn add_field(
        &mut self,
        parent: NodeRef,
        name: impl Into<String>,
        value: impl Into<FieldValue>,
    ) -> Result<(), BuildError> {
        let value = value.into();
        let p = self.node(parent)?;
        if p.is_array() {
            return Err(BuildError::NamedFieldOnArray(parent));
        }
        self.link(parent, &value)?;
        self.nodes[parent.idx()].fields.push(Field {
            name: Some(name.into()),
            value,
        });
        Ok(())
    }

    /// Append an element to an array.
    pub fn push_element(
        &mut self,
        array: NodeRef,
        value: impl Into<FieldValue>,
    ) -> Result<(), BuildError> {
        let value = value.into();
        if !self.node(array)?.is_array() {
            return Err(BuildError::NotAnArray(array));
        }
        self.link(array, &value)?;
        self.nodes[array.idx()].fields.push(Field { name: None, value });
        Ok(())
    }

    /// Finish the tree with `root` as its root.
    pub fn finish(self, root: NodeRef) -> Result<SyntaxTree, BuildError> {
        if self.node(root)?.parent.is_some() {
            return Err(BuildError::RootHasParent(root));
        }
        Ok(SyntaxTree {
            nodes: self.nodes,
            root: Some(root),
        })
    }

    fn node(&self, n: NodeRef) -> Result<&SyntaxNode, BuildError> {
        self.nodes.get(n.idx()).ok_or(BuildError::UnknownNode(n))
    }

    fn link(&mut self, parent: NodeRef, value: &FieldValue) -> Result<(), BuildError> {
        let FieldValue::Node(child) = *value else {
            return Ok(());
        };
        if self.node(child)?.parent.is_some() {
            return Err(BuildError::AlreadyLinked(child));
        }
        // Walking up from the parent must not reach the child.
        let mut cursor = Some(parent);
        while let Some(c) = cursor {
            if c == child {
                return Err(BuildError::Cycle { child, parent });
            }
            cursor = self.nodes[c.idx()].parent;
        }
        self.nodes[child.idx()].parent = Some(parent);
        Ok(())
    }
}
