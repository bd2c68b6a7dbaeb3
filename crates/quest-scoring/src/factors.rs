//! Lenient decoding of factor payloads from the extraction oracle.
//!
//! Missing or non-numeric fields fall back to their minimum valid value
//! (`minutes = 1`, dimensions `0`, `virtue = 0`). Only a payload that is not
//! a JSON object at all is an error.

use quest_types::scoring::{Factors, ScoreRequest};
use serde_json::Value;

use crate::engine::{clamp_factors, MAX_DIMENSION, MAX_STRIKE, MINUTES_RANGE, VIRTUE_RANGE};
use crate::{Result, ScoringError};

/// Effort minutes assumed when no factors are available.
pub const FALLBACK_MINUTES: u32 = 10;

/// Skill assumed when no factors and no difficulty hint are available.
pub const FALLBACK_SKILL: u8 = 1;

/// Factors decoded from an oracle payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedFactors {
    pub factors: Factors,
    pub rationale: Option<String>,
}

fn number(obj: &Value, key: &str) -> Option<f64> {
    obj.get(key)
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
}

fn bounded(obj: &Value, key: &str, low: f64, high: f64) -> f64 {
    number(obj, key).map_or(low.max(0.0).min(high), |n| n.round().clamp(low, high))
}

/// Decode a factor object, clamping every field.
pub fn from_value(obj: &Value) -> Factors {
    let is_joke = match obj.get("is_joke") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    };
    let dim = |key: &str| bounded(obj, key, 0.0, f64::from(MAX_DIMENSION)) as u8;

    Factors {
        minutes: number(obj, "minutes").map_or(MINUTES_RANGE.0, |n| {
            n.round()
                .clamp(f64::from(MINUTES_RANGE.0), f64::from(MINUTES_RANGE.1)) as u32
        }),
        skill: dim("skill"),
        physical: dim("physical"),
        stakes: dim("stakes"),
        unpleasant: dim("unpleasant"),
        rarity: dim("rarity"),
        virtue: bounded(
            obj,
            "virtue",
            f64::from(VIRTUE_RANGE.0),
            f64::from(VIRTUE_RANGE.1),
        ) as i8,
        strike: bounded(obj, "strike", 0.0, f64::from(MAX_STRIKE)) as u8,
        is_joke,
    }
}

/// Strip a surrounding Markdown code fence, if any.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a raw oracle payload.
///
/// Accepts either a bare factor object or `{"factors": {...}, "rationale": "..."}`.
///
/// # Errors
///
/// - [`ScoringError::MalformedPayload`] if the text is not JSON or the
///   factor value is not an object
pub fn parse_payload(text: &str) -> Result<ParsedFactors> {
    let value: Value = serde_json::from_str(strip_fence(text))
        .map_err(|e| ScoringError::MalformedPayload(e.to_string()))?;

    let rationale = value
        .get("rationale")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);

    let obj = match value.get("factors") {
        Some(inner) => inner,
        None => &value,
    };
    if !obj.is_object() {
        return Err(ScoringError::MalformedPayload(
            "factor payload is not an object".to_string(),
        ));
    }

    Ok(ParsedFactors {
        factors: from_value(obj),
        rationale,
    })
}

/// Default factor set used when the oracle cannot be consulted.
///
/// Caller hints are honoured: `minutes` as given, `difficulty` as `skill`.
pub fn fallback(request: &ScoreRequest) -> Factors {
    clamp_factors(&Factors {
        minutes: request.minutes.unwrap_or(FALLBACK_MINUTES),
        skill: request.difficulty.unwrap_or(FALLBACK_SKILL),
        ..Default::default()
    })
}
