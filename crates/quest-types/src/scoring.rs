//! Score-assignment request/response contract and the factor set.

use serde::{Deserialize, Serialize};

/// Effort and importance dimensions a score is computed from.
///
/// Values produced by the scoring engine are always within their clamp
/// ranges; raw values from a factor source are not trusted until clamped.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Factors {
    /// Estimated effort in minutes, `[1, 600]`.
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub skill: u8,
    #[serde(default)]
    pub physical: u8,
    #[serde(default)]
    pub stakes: u8,
    #[serde(default)]
    pub unpleasant: u8,
    #[serde(default)]
    pub rarity: u8,
    /// Net benefit or harm, `[-5, 5]`. Signed profiles only.
    #[serde(default)]
    pub virtue: i8,
    /// Penalty tier, `[0, 3]`. Signed profiles only.
    #[serde(default)]
    pub strike: u8,
    #[serde(default)]
    pub is_joke: bool,
}

/// Request to assign XP to a prospective task.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ScoreRequest {
    /// Required. A missing or blank title is a validation error.
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Caller's own effort estimate; overrides the factor source's value.
    #[serde(default)]
    pub minutes: Option<u32>,
    /// Caller's difficulty hint `[0, 5]`, used as `skill` when falling back.
    #[serde(default)]
    pub difficulty: Option<u8>,
}

impl ScoreRequest {
    /// The title, if present and not blank.
    pub fn title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }
}

/// Successful score assignment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ScoreResponse {
    pub xp: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub factors: Option<Factors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// True when the factor source was bypassed and defaults were used.
    #[serde(default)]
    pub fallback: bool,
}
