//! Reaction command handlers.
//!
//! Vote writes pass the session throttle first; a write the store rejects
//! gives its throttle slot back. When a write is throttled or fails, the
//! error carries the authoritative `{summary, my_vote}` so the
//! caller can drop its optimistic state without another round trip.

use std::sync::Arc;

use quest_db::queries::reactions;
use quest_db::DbError;
use quest_types::reaction::VoteValue;
use quest_types::EntryId;
use serde_json::Value;
use tracing::debug;

use super::{optional_str, required_i64, required_str, to_value};
use crate::rpc::{RpcError, Session};
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

fn parse_vote(params: &Value) -> std::result::Result<VoteValue, RpcError> {
    match params.get("value") {
        Some(Value::String(s)) if s == "up" => Ok(VoteValue::Up),
        Some(Value::String(s)) if s == "down" => Ok(VoteValue::Down),
        Some(v) => v
            .as_i64()
            .and_then(VoteValue::from_i64)
            .ok_or_else(|| RpcError::invalid_params("value must be \"up\", \"down\", 1 or -1")),
        None => Err(RpcError::invalid_params("value required")),
    }
}

async fn reaction_state(state: &DaemonState, entry_id: EntryId, voter: Option<&str>) -> Result {
    let db = state.db.lock().await;
    let summary = reactions::summary(&db, entry_id).map_err(|e| RpcError::from_db(&e))?;
    let my_vote = match voter {
        Some(voter) => reactions::my_vote(&db, entry_id, voter).map_err(|e| RpcError::from_db(&e))?,
        None => None,
    };
    Ok(serde_json::json!({
        "summary": to_value(&summary)?,
        "my_vote": my_vote,
    }))
}

/// Attach a fresh fetch of the voter's view to a vote error.
async fn with_authoritative(
    state: &DaemonState,
    err: RpcError,
    entry_id: EntryId,
    voter: &str,
) -> RpcError {
    match reaction_state(state, entry_id, Some(voter)).await {
        Ok(fresh) => err.with_data("authoritative", fresh),
        Err(fetch_err) => {
            debug!(entry_id, "refetch after vote failure failed: {}", fetch_err.message);
            err
        }
    }
}

async fn vote_failure(state: &DaemonState, err: &DbError, entry_id: EntryId, voter: &str) -> RpcError {
    let rpc = match err {
        DbError::NotFound(what) => return RpcError::not_found(what),
        DbError::Constraint(detail) => RpcError::vote_rejected(detail),
        other => RpcError::from_db(other),
    };
    with_authoritative(state, rpc, entry_id, voter).await
}

async fn write_vote(
    state: &Arc<DaemonState>,
    session: &mut Session,
    params: &Value,
    requested: Option<VoteValue>,
) -> Result {
    let voter = required_str(params, "voter")?;
    let entry_id = required_i64(params, "entry_id")?;

    let now_ms = crate::unix_now_ms();
    session.throttle.prune(now_ms);
    if let Err(e) = session.throttle.try_acquire(voter, entry_id, now_ms) {
        return Err(with_authoritative(state, e.into(), entry_id, voter).await);
    }

    let result = {
        let mut db = state.db.lock().await;
        match requested {
            Some(value) => reactions::set_vote(&mut db, entry_id, voter, value, crate::unix_now()),
            None => reactions::clear_vote(&mut db, entry_id, voter, crate::unix_now()),
        }
    };

    match result {
        Ok(outcome) => {
            state.event_bus.vote_changed(voter, &outcome);
            to_value(&outcome)
        }
        Err(e) => {
            session.throttle.release(voter, entry_id, now_ms);
            Err(vote_failure(state, &e, entry_id, voter).await)
        }
    }
}

/// Cast a vote. Repeating the held value clears it; the other value flips it.
pub async fn cast_vote(state: &Arc<DaemonState>, session: &mut Session, params: &Value) -> Result {
    let value = parse_vote(params)?;
    write_vote(state, session, params, Some(value)).await
}

/// Clear the voter's vote.
pub async fn clear_vote(state: &Arc<DaemonState>, session: &mut Session, params: &Value) -> Result {
    write_vote(state, session, params, None).await
}

/// Summary for an entry plus, when `voter` is given, their own vote.
pub async fn get_reactions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let entry_id = required_i64(params, "entry_id")?;
    let voter = optional_str(params, "voter");
    {
        let db = state.db.lock().await;
        quest_db::queries::ledger::get(&db, entry_id).map_err(|e| RpcError::from_db(&e))?;
    }
    reaction_state(state, entry_id, voter).await
}
