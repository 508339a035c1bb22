// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Import of ESTree-shaped JSON into a [`SyntaxTree`].
//!
//! Objects carrying a string `type` (or, failing that, `kind`) become tagged
//! nodes, other objects become groupings and arrays stay arrays. Locations
//! are read from `loc` (`{start: {line, column}, end: {line, column}}`) or
//! from `span` (`{startLine, startColumn, endLine, endColumn}`).

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::Deserialize;
use serde_json::{Map, Value};
use understory_span_index::Span;

use crate::error::ImportError;
use crate::tree::{NodeRef, Scalar, SyntaxTree, SyntaxTreeBuilder};

/// Parse JSON text and import it.
///
/// `serde_json` stops at 128 levels of nesting, so deeper input is reported
/// as [`ImportError::TooDeep`]. This is below the render depth ceiling of
/// [`HARD_DEPTH_CEILING`](crate::HARD_DEPTH_CEILING) nodes, which counts
/// tree nodes rather than JSON levels; an ESTree node usually takes two or
/// more JSON levels, so the ceiling is not reachable through this function.
/// [`tree_from_json`] walks an already parsed [`Value`] without a limit.
pub fn tree_from_json_str(text: &str) -> Result<SyntaxTree, ImportError> {
    let value: Value = serde_json::from_str(text).map_err(|e| {
        let message = e.to_string();
        if message.contains("recursion limit exceeded") {
            ImportError::TooDeep { message }
        } else {
            ImportError::InvalidJson { message }
        }
    })?;
    tree_from_json(&value)
}

/// Import an already parsed JSON value. The walk is iterative.
///
/// ```
/// use understory_outline::tree_from_json;
///
/// let tree = tree_from_json(&serde_json::json!({
///     "type": "Identifier",
///     "name": "x",
///     "loc": { "start": { "line": 1, "column": 4 }, "end": { "line": 1, "column": 5 } }
/// }))
/// .unwrap();
/// let root = tree.get(tree.root().unwrap()).unwrap();
/// assert_eq!(root.kind_tag(), Some("Identifier"));
/// assert_eq!(root.span().unwrap().start_column, 4);
/// ```
pub fn tree_from_json(value: &Value) -> Result<SyntaxTree, ImportError> {
    let mut b = SyntaxTreeBuilder::new();
    let root = create(&mut b, value)?.ok_or(ImportError::NotANode)?;
    let mut work: Vec<(NodeRef, &Value)> = alloc::vec![(root, value)];
    while let Some((node, v)) = work.pop() {
        match v {
            Value::Array(items) => {
                for item in items {
                    match create(&mut b, item)? {
                        Some(child) => {
                            b.push_element(node, child)?;
                            work.push((child, item));
                        }
                        None => b.push_element(node, scalar_of(item))?,
                    }
                }
            }
            Value::Object(map) => {
                let tag = tag_key(map)?;
                for (key, item) in map {
                    if is_metadata(key, item, tag) {
                        continue;
                    }
                    match create(&mut b, item)? {
                        Some(child) => {
                            b.add_field(node, key.as_str(), child)?;
                            work.push((child, item));
                        }
                        None => b.add_field(node, key.as_str(), scalar_of(item))?,
                    }
                }
            }
            _ => {}
        }
    }
    Ok(b.finish(root)?)
}

/// Create the node for `v`, or `None` for primitives.
fn create(b: &mut SyntaxTreeBuilder, v: &Value) -> Result<Option<NodeRef>, ImportError> {
    Ok(match v {
        Value::Array(_) => Some(b.array()),
        Value::Object(map) => {
            let tag = tag_key(map)?.and_then(|k| map.get(k)).and_then(Value::as_str);
            let span = span_of(map, tag.unwrap_or("Object"))?;
            Some(match tag {
                Some(kind) => b.tagged(kind, span),
                None => b.object(span),
            })
        }
        _ => None,
    })
}

/// Which key holds the kind tag. `type` wins over `kind`.
fn tag_key(map: &Map<String, Value>) -> Result<Option<&'static str>, ImportError> {
    match map.get("type") {
        Some(Value::String(_)) => return Ok(Some("type")),
        Some(_) => return Err(ImportError::InvalidKind { key: "type" }),
        None => {}
    }
    Ok(matches!(map.get("kind"), Some(Value::String(_))).then_some("kind"))
}

fn is_metadata(key: &str, v: &Value, tag: Option<&str>) -> bool {
    match key {
        "loc" | "span" | "range" => true,
        // Character offsets emitted by some parsers.
        "start" | "end" => v.is_number(),
        k => Some(k) == tag,
    }
}

fn span_of(map: &Map<String, Value>, kind: &str) -> Result<Option<Span>, ImportError> {
    let malformed = |key| ImportError::MalformedSpan {
        key,
        kind: kind.into(),
    };
    if let Some(loc) = map.get("loc").filter(|v| !v.is_null()) {
        let pos = |end: &str| -> Option<(u32, u32)> {
            let p = loc.get(end)?;
            let line = u32::try_from(p.get("line")?.as_u64()?).ok()?;
            let column = u32::try_from(p.get("column")?.as_u64()?).ok()?;
            Some((line, column))
        };
        let ((sl, sc), (el, ec)) = pos("start").zip(pos("end")).ok_or_else(|| malformed("loc"))?;
        let span = Span::new(sl, sc, el, ec);
        return if span.is_well_formed() {
            Ok(Some(span))
        } else {
            Err(malformed("loc"))
        };
    }
    if let Some(span) = map.get("span").filter(|v| !v.is_null()) {
        return Span::deserialize(span)
            .ok()
            .filter(Span::is_well_formed)
            .map(Some)
            .ok_or_else(|| malformed("span"));
    }
    Ok(None)
}

fn scalar_of(v: &Value) -> Scalar {
    match v {
        Value::Bool(b) => Scalar::Bool(*b),
        Value::Number(n) => n.as_f64().map_or(Scalar::Null, Scalar::Number),
        Value::String(s) => Scalar::String(s.clone()),
        _ => Scalar::Null,
    }
}
