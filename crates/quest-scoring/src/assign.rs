//! XP assignment for task creation.
//!
//! Only a missing title fails a request. Every factor-source failure
//! (unreachable, timed out, non-zero status, malformed payload) degrades to
//! [`fallback`](crate::factors::fallback) factors plus a rationale naming
//! the cause.

use async_trait::async_trait;
use quest_types::scoring::{ScoreRequest, ScoreResponse};
use tracing::{debug, warn};

use crate::engine::{clamp_factors, score};
use crate::factors::{fallback, parse_payload};
use crate::profile::ScoringProfile;
use crate::{Result, ScoringError};

/// External oracle that extracts raw factors from a task's text.
///
/// Implementations return the oracle's raw payload; decoding and clamping
/// happen here so a misbehaving oracle can never push a score out of range.
#[async_trait]
pub trait FactorSource: Send + Sync {
    /// Ask the oracle for factors describing `request`.
    async fn extract(&self, request: &ScoreRequest) -> Result<String>;
}

/// Check the request and return its title.
///
/// # Errors
///
/// - [`ScoringError::MissingTitle`] if the title is missing or blank
pub fn validate_request(request: &ScoreRequest) -> Result<&str> {
    request.title().ok_or(ScoringError::MissingTitle)
}

/// Score a request given what the factor source produced.
///
/// `outcome` is `None` when no source is configured.
///
/// # Errors
///
/// - [`ScoringError::MissingTitle`] if the title is missing or blank
pub fn assign_from_outcome(
    request: &ScoreRequest,
    outcome: Option<Result<String>>,
    profile: &ScoringProfile,
) -> Result<ScoreResponse> {
    let title = validate_request(request)?;

    let parsed = match outcome {
        None => Err("no factor source configured".to_string()),
        Some(Err(e)) => Err(e.to_string()),
        Some(Ok(payload)) => parse_payload(&payload).map_err(|e| e.to_string()),
    };

    let response = match parsed {
        Ok(mut parsed) => {
            if let Some(minutes) = request.minutes {
                parsed.factors.minutes = minutes;
            }
            let factors = clamp_factors(&parsed.factors);
            ScoreResponse {
                xp: score(&factors, profile),
                factors: Some(factors),
                rationale: parsed.rationale,
                fallback: false,
            }
        }
        Err(cause) => {
            warn!(title, %cause, "factor source unusable, scoring with defaults");
            let factors = fallback(request);
            ScoreResponse {
                xp: score(&factors, profile),
                factors: Some(factors),
                rationale: Some(format!("{cause}; scored with default factors")),
                fallback: true,
            }
        }
    };

    debug!(title, xp = response.xp, fallback = response.fallback, "xp assigned");
    Ok(response)
}

/// Validate, consult `source`, and score.
///
/// The source is not consulted for an invalid request.
///
/// # Errors
///
/// - [`ScoringError::MissingTitle`] if the title is missing or blank
pub async fn assign_xp(
    request: &ScoreRequest,
    source: Option<&dyn FactorSource>,
    profile: &ScoringProfile,
) -> Result<ScoreResponse> {
    validate_request(request)?;
    let outcome = match source {
        Some(source) => Some(source.extract(request).await),
        None => None,
    };
    assign_from_outcome(request, outcome, profile)
}
