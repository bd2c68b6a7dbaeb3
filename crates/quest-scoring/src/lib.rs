//! # quest-scoring
//!
//! Deterministic XP scoring.
//!
//! A task's descriptive [`Factors`](quest_types::scoring::Factors) are turned
//! into a bounded integer score by a single configuration-driven engine.
//! Factors come from an external extraction oracle (a [`FactorSource`]);
//! when that oracle is absent, down, or returns garbage, scoring proceeds
//! with a default factor set and an explanatory rationale.
//!
//! ## Modules
//!
//! - [`profile`] — Weights, clamp ranges, and signed-mode rules
//! - [`engine`] — The pure `factors -> score` function
//! - [`factors`] — Lenient parsing of raw factor payloads
//! - [`assign`] — Request validation and fallback-aware assignment

pub mod assign;
pub mod engine;
pub mod factors;
pub mod profile;

pub use assign::{assign_from_outcome, assign_xp, validate_request, FactorSource};
pub use engine::{score, time_score};
pub use profile::{ProfileKind, ScoringProfile};

/// Error types for scoring operations.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    /// The request carried no usable title.
    #[error("title is required")]
    MissingTitle,

    /// The factor source could not be reached or started.
    #[error("factor source unavailable: {0}")]
    SourceUnavailable(String),

    /// The factor source did not answer in time.
    #[error("factor source timed out after {timeout_ms} ms")]
    SourceTimeout {
        /// The configured timeout.
        timeout_ms: u64,
    },

    /// The factor source answered with a failure status.
    #[error("factor source failed with status {status}")]
    SourceFailed {
        /// Exit or response status reported by the source.
        status: i32,
    },

    /// The factor source answered with something that is not a factor object.
    #[error("malformed factor payload: {0}")]
    MalformedPayload(String),

    /// A scoring profile is internally inconsistent.
    #[error("invalid scoring profile: {0}")]
    InvalidProfile(String),
}

/// Convenience result type for scoring operations.
pub type Result<T> = std::result::Result<T, ScoringError>;
