// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Source spans and the size ordering used for most-specific matching.

use core::cmp::Ordering;
use core::ops::RangeInclusive;

/// Weight of one spanned line in [`Span::size`].
///
/// Large enough that any multi-line span sorts after every single-line span,
/// whatever the column widths involved.
pub const LINE_WEIGHT: i64 = 1 << 32;

/// Extent of a node in source text.
///
/// Both ends are inclusive: a position sitting exactly on `end_line:end_column`
/// is inside the span, matching how a text cursor placed right after a token is
/// still considered "on" it. Containment is lexicographic over `(line, column)`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Span {
    /// First line covered by the span.
    pub start_line: u32,
    /// Column of the first character on `start_line`.
    pub start_column: u32,
    /// Last line covered by the span.
    pub end_line: u32,
    /// Column of the end position on `end_line`.
    pub end_column: u32,
}

impl Span {
    /// Create a span from its start and end positions.
    #[inline(always)]
    pub const fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// Whether `(line, column)` lies within this span.
    ///
    /// ```
    /// use understory_span_index::Span;
    ///
    /// let call = Span::new(2, 0, 4, 1);
    /// assert!(call.contains(3, 80));
    /// assert!(call.contains(4, 1));
    /// assert!(!call.contains(4, 2));
    /// assert!(!call.contains(1, 5));
    /// ```
    #[inline]
    pub fn contains(&self, line: u32, column: u32) -> bool {
        let pos = (line, column);
        (self.start_line, self.start_column) <= pos && pos <= (self.end_line, self.end_column)
    }

    /// Whether `other` lies entirely within this span.
    #[inline]
    pub fn encloses(&self, other: &Self) -> bool {
        self.contains(other.start_line, other.start_column)
            && self.contains(other.end_line, other.end_column)
    }

    /// Total order key favoring narrow, single-line spans.
    ///
    /// Computed as `(end_line - start_line) * LINE_WEIGHT + (end_column - start_column)`.
    /// The column term may be negative for multi-line spans; the line term
    /// always dominates it.
    #[inline]
    pub fn size(&self) -> i64 {
        let lines = i64::from(self.end_line) - i64::from(self.start_line);
        let columns = i64::from(self.end_column) - i64::from(self.start_column);
        lines * LINE_WEIGHT + columns
    }

    /// The lines this span touches, inclusive. Empty for inverted spans.
    #[inline]
    pub fn lines(&self) -> RangeInclusive<u32> {
        self.start_line..=self.end_line
    }

    /// Whether the end position does not precede the start position.
    #[inline]
    pub fn is_well_formed(&self) -> bool {
        (self.start_line, self.start_column) <= (self.end_line, self.end_column)
    }
}

/// Compare two candidates for "more specific" first.
///
/// Smaller [`Span::size`] wins; on a tie, the deeper candidate wins. Both
/// the bucket sort and the linear fallbacks use this, so every query path
/// agrees on which match is best.
#[inline]
pub(crate) fn specificity(a_size: i64, a_depth: u32, b_size: i64, b_depth: u32) -> Ordering {
    a_size.cmp(&b_size).then_with(|| b_depth.cmp(&a_depth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_line_spans_sort_before_multi_line() {
        let narrow_multi = Span::new(1, 40, 2, 0);
        let wide_single = Span::new(1, 0, 1, 10_000);
        assert!(
            wide_single.size() < narrow_multi.size(),
            "any single-line span must be smaller than a multi-line one"
        );
    }

    #[test]
    fn deeper_wins_on_equal_size() {
        let s = Span::new(2, 0, 2, 20).size();
        assert_eq!(specificity(s, 3, s, 2), Ordering::Less);
        assert_eq!(specificity(s, 2, s, 3), Ordering::Greater);
    }

    #[test]
    fn inverted_span_touches_no_lines() {
        let inverted = Span::new(5, 0, 3, 0);
        assert!(!inverted.is_well_formed());
        assert_eq!(inverted.lines().count(), 0);
    }

    #[test]
    fn encloses_is_inclusive() {
        let outer = Span::new(1, 0, 3, 5);
        assert!(outer.encloses(&Span::new(1, 0, 3, 5)));
        assert!(outer.encloses(&Span::new(2, 3, 2, 9)));
        assert!(!outer.encloses(&Span::new(3, 4, 3, 6)));
    }
}
