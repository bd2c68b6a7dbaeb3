//! XP assignment command handlers.
//!
//! Only a missing title is a request error. Factor-source failures are
//! absorbed by `quest-scoring` and show up as `fallback: true`.

use std::sync::Arc;

use quest_types::scoring::{ScoreRequest, ScoreResponse};
use serde_json::Value;

use super::to_value;
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Decode a score request from params.
///
/// Hints of the wrong type are dropped rather than rejected; only the title
/// is checked, by [`score_request`].
pub(crate) fn parse_request(params: &Value) -> ScoreRequest {
    let text = |key: &str| params.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let number = |key: &str| params.get(key).and_then(|v| v.as_u64());
    ScoreRequest {
        title: text("title"),
        description: text("description"),
        minutes: number("minutes").map(|m| u32::try_from(m).unwrap_or(u32::MAX)),
        difficulty: number("difficulty").map(|d| d.min(5) as u8),
    }
}

/// Score a request, consulting the factor source when one is configured.
pub(crate) async fn score_request(
    state: &DaemonState,
    request: &ScoreRequest,
) -> std::result::Result<ScoreResponse, RpcError> {
    let source = state
        .factor_source
        .as_ref()
        .map(|s| s as &dyn quest_scoring::FactorSource);
    quest_scoring::assign_xp(request, source, &state.profile)
        .await
        .map_err(|e| RpcError::invalid_params(&e.to_string()))
}

/// Assign XP to a prospective task without creating it.
pub async fn assign_xp(state: &Arc<DaemonState>, params: &Value) -> Result {
    let request = parse_request(params);
    let response = score_request(state, &request).await?;
    to_value(&response)
}
