//! # quest-reactions
//!
//! Consumer-side consistency for reactions and other ledger projections.
//!
//! Projections (balances, rankings, reaction summaries) are eventually
//! consistent. A consumer shows a locally predicted state right away,
//! derived with the same rules the store uses, and then:
//!
//! 1. on an authoritative update, replaces the prediction with server truth;
//! 2. on a write failure, replaces the prediction with a fresh fetch.
//!
//! ## Modules
//!
//! - [`throttle`] — Per-session sliding-window limit on vote changes
//! - [`reconcile`] — The three-state reconciliation law and reaction state
//! - [`invalidate`] — Mapping change-stream events to stale projections

pub mod invalidate;
pub mod reconcile;
pub mod throttle;

/// Error types for reaction operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactionError {
    /// Too many vote changes on one entry inside the throttle window.
    #[error("vote changes throttled, retry in {retry_after_ms} ms")]
    RateLimited {
        /// Milliseconds until the oldest change leaves the window.
        retry_after_ms: u64,
    },
}

/// Convenience result type for reaction operations.
pub type Result<T> = std::result::Result<T, ReactionError>;
