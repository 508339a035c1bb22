// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public `SpanIndex` API: insert, commit, and point lookups with graceful fallbacks.

use alloc::vec::Vec;
use core::fmt::Debug;

use hashbrown::{HashMap, HashSet};
use smallvec::SmallVec;

use crate::span::{Span, specificity};

/// Default number of lines scanned upwards by the nearby fallback.
pub const DEFAULT_NEARBY_WINDOW: u32 = 20;

/// Spans touching more lines than this are not bucketed per line.
///
/// They are kept in one shared list that spanning lookups check as well, so
/// a single huge span costs one slot instead of one bucket per line.
pub const MAX_SPANNING_LINES: u32 = 4096;

/// Which stage of [`SpanIndex::query`] produced a match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum LookupSource {
    /// Most specific entry starting on the queried line.
    StartingLine,
    /// Most specific entry whose span covers the queried line.
    SpanningLine,
    /// Nearest entry starting within the window above the queried line.
    ///
    /// This is an approximation: the entry does not contain the position.
    Nearby,
    /// Linear scan over every inserted entry, committed or not.
    LinearScan,
}

impl LookupSource {
    /// Whether the matched span actually contains the queried position.
    #[inline]
    pub fn is_exact(self) -> bool {
        !matches!(self, Self::Nearby)
    }
}

/// Result of [`SpanIndex::query`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Lookup<P> {
    /// Payload stored with the matched entry.
    pub payload: P,
    /// The matched entry's span.
    pub span: Span,
    /// How the match was found.
    pub source: LookupSource,
}

#[derive(Clone, Debug)]
struct Entry<P> {
    span: Span,
    depth: u32,
    size: i64,
    payload: P,
}

type Bucket = SmallVec<[u32; 4]>;

/// Line-bucketed index over spans.
///
/// Entries are inserted cheaply and only bucketed on [`SpanIndex::commit`],
/// which keeps two maps keyed by line:
///
/// - the *starting-line* map holds each entry under its first line,
/// - the *spanning* map holds each entry under every line it touches, unless
///   it touches more than [`MAX_SPANNING_LINES`]; such wide entries share one
///   list instead.
///
/// Every bucket is kept sorted by [`Span::size`] (deeper entries first on a
/// tie), so the first bucket entry that actually contains a position is the
/// most specific match. Queries only touch the bucket for the queried line.
///
/// Entries inserted after the last commit are still visible to queries through
/// the linear fallback; they just aren't fast yet.
///
/// ## Example
///
/// ```rust
/// use understory_span_index::{LookupSource, Span, SpanIndex};
///
/// let mut idx: SpanIndex<&str> = SpanIndex::new();
/// idx.insert(Span::new(1, 0, 3, 1), 0, "function");
/// idx.insert(Span::new(2, 4, 2, 18), 1, "call");
/// idx.commit();
///
/// let hit = idx.query(2, 6).unwrap();
/// assert_eq!(hit.payload, "call");
/// assert_eq!(hit.source, LookupSource::StartingLine);
///
/// // Line 3 has no entry starting on it, but the function spans it.
/// assert_eq!(idx.query(3, 0).unwrap().payload, "function");
/// ```
#[derive(Clone)]
pub struct SpanIndex<P> {
    entries: Vec<Entry<P>>,
    starting: HashMap<u32, Bucket>,
    spanning: HashMap<u32, Bucket>,
    /// Entries too wide for per-line buckets, most specific first.
    wide: Bucket,
    /// `entries[..committed]` are bucketed.
    committed: usize,
    nearby_window: u32,
}

impl<P: Debug> Debug for SpanIndex<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SpanIndex")
            .field("entries", &self.entries.len())
            .field("committed", &self.committed)
            .field("starting_lines", &self.starting.len())
            .field("spanning_lines", &self.spanning.len())
            .field("wide", &self.wide.len())
            .field("nearby_window", &self.nearby_window)
            .finish_non_exhaustive()
    }
}

impl<P: Copy> Default for SpanIndex<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Copy> SpanIndex<P> {
    /// Create an empty index with the default nearby window.
    pub fn new() -> Self {
        Self::with_nearby_window(DEFAULT_NEARBY_WINDOW)
    }

    /// Create an empty index that scans `window` lines upwards before giving up
    /// on bucketed lookups.
    pub fn with_nearby_window(window: u32) -> Self {
        Self {
            entries: Vec::new(),
            starting: HashMap::new(),
            spanning: HashMap::new(),
            wide: Bucket::new(),
            committed: 0,
            nearby_window: window,
        }
    }

    /// Number of inserted entries, committed or not.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entry was inserted.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every inserted entry has been bucketed.
    pub fn is_committed(&self) -> bool {
        self.committed == self.entries.len()
    }

    /// Reserve space for at least `n` more entries.
    pub fn reserve(&mut self, n: usize) {
        self.entries.reserve(n);
    }

    /// Insert an entry. It becomes bucketed on the next [`SpanIndex::commit`].
    ///
    /// `depth` only breaks ties between spans of equal size; deeper wins.
    pub fn insert(&mut self, span: Span, depth: u32, payload: P) {
        self.entries.push(Entry {
            span,
            depth,
            size: span.size(),
            payload,
        });
    }

    /// Drop every entry and bucket.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.starting.clear();
        self.spanning.clear();
        self.wide.clear();
        self.committed = 0;
    }

    /// Bucket all entries inserted since the last commit and re-sort the
    /// buckets they touched. Returns the number of newly bucketed entries.
    pub fn commit(&mut self) -> usize {
        let fresh = self.entries.len() - self.committed;
        if fresh == 0 {
            return 0;
        }
        let mut touched_starting: HashSet<u32> = HashSet::new();
        let mut touched_spanning: HashSet<u32> = HashSet::new();
        let mut touched_wide = false;
        for slot in self.committed..self.entries.len() {
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Bucket slots are 32-bit; an index over 4G entries is not supported."
            )]
            let slot32 = slot as u32;
            let span = self.entries[slot].span;
            self.starting.entry(span.start_line).or_default().push(slot32);
            touched_starting.insert(span.start_line);
            if span.end_line.saturating_sub(span.start_line) >= MAX_SPANNING_LINES {
                self.wide.push(slot32);
                touched_wide = true;
                continue;
            }
            for line in span.lines() {
                self.spanning.entry(line).or_default().push(slot32);
                touched_spanning.insert(line);
            }
        }
        self.committed = self.entries.len();

        let entries = &self.entries;
        let order = |a: &u32, b: &u32| {
            let (a, b) = (&entries[*a as usize], &entries[*b as usize]);
            specificity(a.size, a.depth, b.size, b.depth)
        };
        for line in touched_starting {
            if let Some(bucket) = self.starting.get_mut(&line) {
                bucket.sort_by(order);
            }
        }
        for line in touched_spanning {
            if let Some(bucket) = self.spanning.get_mut(&line) {
                bucket.sort_by(order);
            }
        }
        if touched_wide {
            self.wide.sort_by(order);
        }
        fresh
    }

    /// Find the most specific entry containing `(line, column)`.
    ///
    /// Lookup degrades gracefully instead of failing:
    /// 1. the starting-line bucket for `line`,
    /// 2. the spanning bucket for `line`,
    /// 3. the nearest non-empty starting-line bucket within the nearby window
    ///    above `line` (an approximate match, see [`LookupSource::Nearby`]),
    /// 4. a linear scan over every inserted entry.
    ///
    /// Returns `None` only if no entry contains the position and nothing
    /// starts within the window.
    pub fn query(&self, line: u32, column: u32) -> Option<Lookup<P>> {
        if let Some(hit) = self.first_containing(self.starting.get(&line), line, column) {
            return Some(self.lookup(hit, LookupSource::StartingLine));
        }
        if let Some(hit) = self.first_spanning(line, column) {
            return Some(self.lookup(hit, LookupSource::SpanningLine));
        }
        if let Some(hit) = self.nearby(line) {
            return Some(self.lookup(hit, LookupSource::Nearby));
        }
        self.scan(line, column)
            .map(|hit| self.lookup(hit, LookupSource::LinearScan))
    }

    /// Visit the payloads of all entries containing `(line, column)`, most
    /// specific first. Only committed entries are visited.
    pub fn visit_containing<F: FnMut(P, Span)>(&self, line: u32, column: u32, mut f: F) {
        let contains = |slot: &&u32| self.entries[**slot as usize].span.contains(line, column);
        let mut narrow = self
            .spanning
            .get(&line)
            .into_iter()
            .flatten()
            .filter(contains)
            .peekable();
        let mut wide = self.wide.iter().filter(contains).peekable();
        loop {
            let slot = match (narrow.peek(), wide.peek()) {
                (None, None) => return,
                (Some(_), None) => narrow.next(),
                (None, Some(_)) => wide.next(),
                (Some(&&a), Some(&&b)) => {
                    if self.more_specific(b as usize, a as usize) {
                        wide.next()
                    } else {
                        narrow.next()
                    }
                }
            };
            if let Some(&slot) = slot {
                let e = &self.entries[slot as usize];
                f(e.payload, e.span);
            }
        }
    }

    fn lookup(&self, slot: usize, source: LookupSource) -> Lookup<P> {
        let e = &self.entries[slot];
        Lookup {
            payload: e.payload,
            span: e.span,
            source,
        }
    }

    fn first_containing(&self, bucket: Option<&Bucket>, line: u32, column: u32) -> Option<usize> {
        bucket?
            .iter()
            .map(|&slot| slot as usize)
            .find(|&slot| self.entries[slot].span.contains(line, column))
    }

    fn first_spanning(&self, line: u32, column: u32) -> Option<usize> {
        let narrow = self.first_containing(self.spanning.get(&line), line, column);
        let wide = self.first_containing(Some(&self.wide), line, column);
        match (narrow, wide) {
            (Some(a), Some(b)) if self.more_specific(b, a) => Some(b),
            (Some(a), _) => Some(a),
            (None, b) => b,
        }
    }

    fn more_specific(&self, a: usize, b: usize) -> bool {
        let (a, b) = (&self.entries[a], &self.entries[b]);
        specificity(a.size, a.depth, b.size, b.depth).is_lt()
    }

    fn nearby(&self, line: u32) -> Option<usize> {
        let floor = line.saturating_sub(self.nearby_window);
        (floor..line)
            .rev()
            .find_map(|l| self.starting.get(&l).and_then(|b| b.first()))
            .map(|&slot| slot as usize)
    }

    fn scan(&self, line: u32, column: u32) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (slot, e) in self.entries.iter().enumerate() {
            if !e.span.contains(line, column) {
                continue;
            }
            let better = best.is_none_or(|b| self.more_specific(slot, b));
            if better {
                best = Some(slot);
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    fn scenario() -> SpanIndex<u32> {
        let mut idx = SpanIndex::new();
        // Program, VariableDeclaration, ExpressionStatement, CallExpression.
        idx.insert(Span::new(1, 0, 2, 20), 0, 0);
        idx.insert(Span::new(1, 0, 1, 10), 2, 1);
        idx.insert(Span::new(2, 0, 2, 20), 2, 2);
        idx.insert(Span::new(2, 0, 2, 20), 3, 3);
        idx
    }

    #[test]
    fn most_specific_on_starting_line() {
        let mut idx = scenario();
        idx.commit();
        let hit = idx.query(2, 5).unwrap();
        assert_eq!(hit.payload, 3, "equal spans: the deeper call expression wins");
        assert_eq!(hit.source, LookupSource::StartingLine);
        assert_eq!(idx.query(1, 3).unwrap().payload, 1);
    }

    #[test]
    fn uncommitted_entries_are_found_by_linear_scan() {
        let idx = scenario();
        assert!(!idx.is_committed());
        let hit = idx.query(2, 5).unwrap();
        assert_eq!(hit.payload, 3);
        assert_eq!(hit.source, LookupSource::LinearScan);
    }

    #[test]
    fn spanning_bucket_covers_interior_lines() {
        let mut idx: SpanIndex<u32> = SpanIndex::new();
        idx.insert(Span::new(10, 0, 30, 1), 0, 7);
        idx.insert(Span::new(12, 4, 12, 9), 1, 8);
        idx.commit();
        let hit = idx.query(20, 3).unwrap();
        assert_eq!(hit.payload, 7);
        assert_eq!(hit.source, LookupSource::SpanningLine);
        // Column outside the narrow node on its own line falls back to the wide one.
        assert_eq!(idx.query(12, 2).unwrap().payload, 7);
    }

    #[test]
    fn gap_falls_back_to_nearby_start() {
        let mut idx: SpanIndex<u32> = SpanIndex::new();
        idx.insert(Span::new(3, 0, 3, 12), 0, 1);
        idx.insert(Span::new(5, 0, 5, 2), 0, 2);
        idx.commit();
        let hit = idx.query(8, 0).unwrap();
        assert_eq!(hit.payload, 2, "nearest line above wins");
        assert!(!hit.source.is_exact());
    }

    #[test]
    fn nothing_in_window_returns_none() {
        let mut idx: SpanIndex<u32> = SpanIndex::with_nearby_window(5);
        idx.insert(Span::new(1, 0, 1, 4), 0, 1);
        idx.commit();
        assert!(idx.query(40, 0).is_none());
        assert!(SpanIndex::<u32>::new().query(1, 1).is_none());
    }

    #[test]
    fn incremental_commit_resorts_touched_buckets() {
        let mut idx: SpanIndex<u32> = SpanIndex::new();
        idx.insert(Span::new(4, 0, 4, 40), 0, 1);
        assert_eq!(idx.commit(), 1);
        idx.insert(Span::new(4, 10, 4, 12), 1, 2);
        assert_eq!(idx.commit(), 1);
        assert_eq!(idx.commit(), 0, "nothing new to bucket");
        assert_eq!(idx.query(4, 11).unwrap().payload, 2);
        assert_eq!(idx.query(4, 30).unwrap().payload, 1);
    }

    #[test]
    fn visit_containing_is_most_specific_first() {
        let mut idx = scenario();
        idx.commit();
        let mut seen = Vec::new();
        idx.visit_containing(2, 5, |p, _| seen.push(p));
        assert_eq!(seen, [3, 2, 0]);
    }

    #[test]
    fn huge_spans_share_one_list() {
        let mut idx: SpanIndex<u32> = SpanIndex::new();
        idx.insert(Span::new(1, 0, 3_000_000, 1), 0, 1);
        idx.insert(Span::new(1_999_990, 0, 2_000_010, 1), 1, 2);
        idx.insert(Span::new(2_000_000, 2, 2_000_000, 9), 2, 3);
        assert_eq!(idx.commit(), 3);
        assert!(idx.spanning.len() < 100, "only the narrow spans are bucketed per line");
        assert_eq!(idx.wide.len(), 1);

        assert_eq!(idx.query(2_000_000, 4).unwrap().payload, 3);
        let hit = idx.query(2_000_005, 0).unwrap();
        assert_eq!(hit.payload, 2, "a narrow span beats the wide one");
        assert_eq!(hit.source, LookupSource::SpanningLine);
        let hit = idx.query(2_500_000, 0).unwrap();
        assert_eq!(hit.payload, 1);
        assert_eq!(hit.source, LookupSource::SpanningLine);

        let mut seen = Vec::new();
        idx.visit_containing(2_000_000, 4, |p, _| seen.push(p));
        assert_eq!(seen, [3, 2, 1]);
    }

    #[test]
    fn clear_resets_everything() {
        let mut idx = scenario();
        idx.commit();
        idx.clear();
        assert!(idx.is_empty());
        assert!(idx.is_committed());
        assert!(idx.query(2, 5).is_none());
    }
}
