// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Coalescing of rapid requests into one.
//!
//! [`Debounce`] is a single-slot request queue with a deadline. Every
//! [`push`](Debounce::push) replaces the queued request and restarts the
//! delay, so a burst of cursor moves produces one lookup for the last
//! position. Time is supplied by the caller in milliseconds, which keeps the
//! state machine deterministic and `no_std`.
//!
//! ```
//! use understory_outline_sync::{Debounce, DebouncePhase};
//!
//! let mut d: Debounce<(u32, u32)> = Debounce::with_delay(50);
//! d.push((1, 0), 1000);
//! d.push((10, 4), 1030);
//! assert_eq!(d.poll(1070), None);
//! assert_eq!(d.poll(1080), Some((10, 4)));
//! assert_eq!(d.phase(), DebouncePhase::Resolving);
//! d.finish();
//! assert_eq!(d.phase(), DebouncePhase::Idle);
//! ```

/// Delay used by [`Debounce::new`], in milliseconds.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

/// Where a [`Debounce`] stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DebouncePhase {
    /// Nothing queued.
    Idle,
    /// A request is queued and fires at `deadline`.
    Debouncing {
        /// Timestamp at which [`Debounce::poll`] hands out the request.
        deadline: u64,
    },
    /// A request was handed out and is being acted on.
    Resolving,
}

/// Single-slot debounced request queue. The latest request wins.
#[derive(Clone, Debug)]
pub struct Debounce<T> {
    delay: u64,
    pending: Option<T>,
    phase: DebouncePhase,
}

impl<T> Default for Debounce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debounce<T> {
    /// Create an idle debounce with [`DEFAULT_DEBOUNCE_MS`].
    pub fn new() -> Self {
        Self::with_delay(DEFAULT_DEBOUNCE_MS)
    }

    /// Create an idle debounce with a custom delay in milliseconds.
    pub fn with_delay(delay: u64) -> Self {
        Self {
            delay,
            pending: None,
            phase: DebouncePhase::Idle,
        }
    }

    /// The configured delay.
    pub fn delay(&self) -> u64 {
        self.delay
    }

    /// Current phase.
    pub fn phase(&self) -> DebouncePhase {
        self.phase
    }

    /// When the queued request fires, if one is queued.
    pub fn deadline(&self) -> Option<u64> {
        match self.phase {
            DebouncePhase::Debouncing { deadline } => Some(deadline),
            _ => None,
        }
    }

    /// Queue `request`, replacing any queued one, and restart the delay.
    ///
    /// Pushing while a request is being resolved queues the new one behind it.
    pub fn push(&mut self, request: T, now: u64) {
        self.pending = Some(request);
        self.phase = DebouncePhase::Debouncing {
            deadline: now.saturating_add(self.delay),
        };
    }

    /// Hand out the queued request once its deadline has passed.
    ///
    /// The debounce then stays in [`DebouncePhase::Resolving`] until
    /// [`finish`](Self::finish).
    pub fn poll(&mut self, now: u64) -> Option<T> {
        match self.phase {
            DebouncePhase::Debouncing { deadline } if now >= deadline => {
                self.phase = DebouncePhase::Resolving;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Mark the handed-out request as done.
    ///
    /// A request pushed during resolution stays queued.
    pub fn finish(&mut self) {
        if self.phase == DebouncePhase::Resolving {
            self.phase = DebouncePhase::Idle;
        }
    }

    /// Drop the queued request and return to idle.
    pub fn cancel(&mut self) {
        self.pending = None;
        self.phase = DebouncePhase::Idle;
    }
}
