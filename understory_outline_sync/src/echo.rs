// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Suppression of selection echoes.
//!
//! Surfaces report every selection, including the ones the synchronizer made
//! itself. Jumping the text cursor for those would move the cursor, trigger a
//! new sync, select again and so on. [`SelectionEcho`] remembers the
//! selections that are expected to come back, in order, and swallows them.

use alloc::collections::VecDeque;

use understory_outline::RenderedId;

/// Expected echoes kept at most; older ones are assumed lost.
pub const MAX_PENDING_ECHOES: usize = 16;

/// Expects the echoes of programmatic selections, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionEcho {
    expected: VecDeque<RenderedId>,
}

impl SelectionEcho {
    /// Create a disarmed guard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect the echo of selecting `id` after those already expected.
    pub fn arm(&mut self, id: RenderedId) {
        if self.expected.len() == MAX_PENDING_ECHOES {
            self.expected.pop_front();
        }
        self.expected.push_back(id);
    }

    /// Withdraw the most recent expectation, for a selection that did not happen.
    pub fn retract(&mut self, id: RenderedId) {
        if self.expected.back() == Some(&id) {
            self.expected.pop_back();
        }
    }

    /// Stop expecting anything.
    pub fn disarm(&mut self) {
        self.expected.clear();
    }

    /// Whether an echo is expected.
    pub fn is_armed(&self) -> bool {
        !self.expected.is_empty()
    }

    /// Number of echoes still expected.
    pub fn pending(&self) -> usize {
        self.expected.len()
    }

    /// Check a reported selection.
    ///
    /// Returns `true` when it is an expected echo and should be ignored.
    /// Echoes expected before it are dropped, since surfaces report in order.
    /// A selection nobody expected is the user's and disarms the guard.
    pub fn consume(&mut self, id: RenderedId) -> bool {
        match self.expected.iter().position(|e| *e == id) {
            Some(at) => {
                self.expected.drain(..=at);
                true
            }
            None => {
                self.expected.clear();
                false
            }
        }
    }
}
