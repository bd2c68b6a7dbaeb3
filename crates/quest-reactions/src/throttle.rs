//! Sliding-window throttle on vote changes.
//!
//! Allows at most [`DEFAULT_MAX_CHANGES`] changes per voter and entry inside
//! any [`DEFAULT_WINDOW_MS`] window. One throttle belongs to one UI session.
//! It only absorbs accidental double-fires; the store enforces the
//! one-vote-per-voter invariant regardless.

use std::collections::{HashMap, VecDeque};

use quest_types::EntryId;

use crate::{ReactionError, Result};

/// Default number of changes allowed per window.
pub const DEFAULT_MAX_CHANGES: usize = 2;

/// Default window length in milliseconds.
pub const DEFAULT_WINDOW_MS: u64 = 2_000;

/// Per-session vote-change throttle.
#[derive(Debug, Clone)]
pub struct VoteThrottle {
    max_changes: usize,
    window_ms: u64,
    recent: HashMap<(String, EntryId), VecDeque<u64>>,
}

impl Default for VoteThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CHANGES, DEFAULT_WINDOW_MS)
    }
}

impl VoteThrottle {
    /// Create a throttle. A `max_changes` of zero is treated as one.
    pub fn new(max_changes: usize, window_ms: u64) -> Self {
        Self {
            max_changes: max_changes.max(1),
            window_ms,
            recent: HashMap::new(),
        }
    }

    /// Record a change by `voter` on `entry_id` at `now_ms` if the window allows it.
    ///
    /// # Errors
    ///
    /// - [`ReactionError::RateLimited`] if the window is full; nothing is recorded
    pub fn try_acquire(&mut self, voter: &str, entry_id: EntryId, now_ms: u64) -> Result<()> {
        let window_ms = self.window_ms;
        let stamps = self
            .recent
            .entry((voter.to_string(), entry_id))
            .or_default();

        while stamps
            .front()
            .is_some_and(|&t| now_ms.saturating_sub(t) >= window_ms)
        {
            stamps.pop_front();
        }

        if stamps.len() >= self.max_changes {
            let oldest = stamps.front().copied().unwrap_or(now_ms);
            let retry_after_ms = (oldest + window_ms).saturating_sub(now_ms);
            tracing::debug!(voter, entry_id, retry_after_ms, "vote change throttled");
            return Err(ReactionError::RateLimited { retry_after_ms });
        }

        stamps.push_back(now_ms);
        Ok(())
    }

    /// Give back a slot taken at `at_ms` whose change was never applied.
    pub fn release(&mut self, voter: &str, entry_id: EntryId, at_ms: u64) {
        let key = (voter.to_string(), entry_id);
        let Some(stamps) = self.recent.get_mut(&key) else {
            return;
        };
        if let Some(pos) = stamps.iter().rposition(|&t| t == at_ms) {
            stamps.remove(pos);
        }
        if stamps.is_empty() {
            self.recent.remove(&key);
        }
    }

    /// Drop bookkeeping for keys with no change inside the window.
    pub fn prune(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        self.recent.retain(|_, stamps| {
            stamps
                .back()
                .is_some_and(|&t| now_ms.saturating_sub(t) < window_ms)
        });
    }

    /// Number of (voter, entry) keys currently tracked.
    pub fn tracked(&self) -> usize {
        self.recent.len()
    }
}
