// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The parser seam.

use alloc::string::String;

use crate::tree::SyntaxTree;

/// Hint shown when parsing failed on pathological nesting.
pub const STACK_EXHAUSTED_HINT: &str =
    "The input nests too deeply to parse. Simplify or split the most deeply nested expressions first.";

/// Category of a parse failure.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseFailureKind {
    /// Ordinary syntax error.
    Syntax,
    /// The parser ran out of stack or hit its recursion limit.
    StackExhausted,
}

/// A failed parse, as reported by a [`ParseService`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseFailure {
    /// Category.
    pub kind: ParseFailureKind,
    /// Message from the parser.
    pub message: String,
}

impl ParseFailure {
    /// Extra guidance for the user, if the failure category has any.
    pub fn hint(&self) -> Option<&'static str> {
        match self.kind {
            ParseFailureKind::Syntax => None,
            ParseFailureKind::StackExhausted => Some(STACK_EXHAUSTED_HINT),
        }
    }
}

/// Result of a parse.
#[derive(Clone, Debug)]
pub enum ParseOutcome {
    /// The source parsed.
    Parsed(SyntaxTree),
    /// It did not.
    Failed(ParseFailure),
}

/// Turns source text into a [`SyntaxTree`].
pub trait ParseService {
    /// Parse `source`.
    fn parse(&mut self, source: &str) -> ParseOutcome;
}

/// A [`ParseService`] reading ESTree-shaped JSON, as dumped by most
/// JavaScript parsers.
///
/// Documents nested deeper than `serde_json`'s limit of 128 levels fail with
/// [`ParseFailureKind::StackExhausted`]; see [`tree_from_json_str`](crate::tree_from_json_str).
#[cfg(feature = "json")]
#[derive(Copy, Clone, Debug, Default)]
pub struct JsonAstParser;

#[cfg(feature = "json")]
impl ParseService for JsonAstParser {
    fn parse(&mut self, source: &str) -> ParseOutcome {
        use crate::error::ImportError;
        use alloc::string::ToString;

        match crate::import::tree_from_json_str(source) {
            Ok(tree) => ParseOutcome::Parsed(tree),
            Err(ImportError::TooDeep { message }) => ParseOutcome::Failed(ParseFailure {
                kind: ParseFailureKind::StackExhausted,
                message,
            }),
            Err(e) => ParseOutcome::Failed(ParseFailure {
                kind: ParseFailureKind::Syntax,
                message: e.to_string(),
            }),
        }
    }
}
