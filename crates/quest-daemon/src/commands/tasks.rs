//! Task lifecycle command handlers.

use std::sync::Arc;

use quest_db::queries::{tasks, users};
use quest_types::task::TaskStatus;
use serde_json::Value;
use tracing::info;

use super::scoring::{parse_request, score_request};
use super::{optional_str, optional_u64, required_i64, required_str, to_value};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Score and create a task. The assigned XP is fixed from here on.
pub async fn create_task(state: &Arc<DaemonState>, params: &Value) -> Result {
    let owner = required_str(params, "owner")?;
    let due_at = optional_u64(params, "due_at")?;
    if let Some(due) = due_at {
        i64::try_from(due).map_err(|_| RpcError::invalid_params("due_at out of range"))?;
    }
    let request = parse_request(params);

    {
        let db = state.db.lock().await;
        users::get(&db, owner).map_err(|e| RpcError::from_db(&e))?;
    }

    // The factor source may take seconds; the database is not held meanwhile.
    let scored = score_request(state, &request).await?;
    let title = request.title().unwrap_or_default();

    let db = state.db.lock().await;
    let task = tasks::insert(
        &db,
        &tasks::NewTask {
            owner,
            title,
            description: request.description.as_deref(),
            due_at,
            xp_assigned: scored.xp,
            factors: scored.factors.as_ref(),
            rationale: scored.rationale.as_deref(),
        },
        crate::unix_now(),
    )
    .map_err(|e| RpcError::from_db(&e))?;

    Ok(serde_json::json!({
        "task": to_value(&task)?,
        "fallback": scored.fallback,
    }))
}

/// Get a task by id.
pub async fn get_task(state: &Arc<DaemonState>, params: &Value) -> Result {
    let task_id = required_i64(params, "task_id")?;
    let db = state.db.lock().await;
    let task = tasks::get(&db, task_id).map_err(|e| RpcError::from_db(&e))?;
    to_value(&task)
}

/// List an owner's tasks, optionally filtered by status.
pub async fn list_tasks(state: &Arc<DaemonState>, params: &Value) -> Result {
    let owner = required_str(params, "owner")?;
    let status = optional_str(params, "status")
        .map(str::parse::<TaskStatus>)
        .transpose()
        .map_err(|e| RpcError::invalid_params(&e.to_string()))?;

    let db = state.db.lock().await;
    let list = tasks::list_for_owner(&db, owner, status).map_err(|e| RpcError::from_db(&e))?;
    to_value(&list)
}

/// Complete an open task with proof.
///
/// The status change and the ledger append commit together; any failure
/// leaves the task open and is reported to the caller.
pub async fn complete_task(state: &Arc<DaemonState>, params: &Value) -> Result {
    let actor = required_str(params, "actor")?;
    let task_id = required_i64(params, "task_id")?;
    let proof_refs: Vec<String> = params
        .get("proof_refs")
        .and_then(|v| v.as_array())
        .map(|refs| {
            refs.iter()
                .filter_map(|r| r.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    let (task, entry) = {
        let mut db = state.db.lock().await;
        tasks::complete(&mut db, actor, task_id, &proof_refs, crate::unix_now())
            .map_err(|e| RpcError::from_db(&e))?
    };

    state.event_bus.task_status_changed(&task);
    state.event_bus.ledger_inserted(&entry);

    Ok(serde_json::json!({
        "task": to_value(&task)?,
        "entry": to_value(&entry)?,
    }))
}

/// Run the overdue sweep now.
pub async fn sweep_overdue(state: &Arc<DaemonState>) -> Result {
    let report = crate::sweep::sweep_once(state, crate::unix_now())
        .await
        .map_err(|e| RpcError::from_db(&e))?;
    info!(count = report.missed.len(), "manual overdue sweep");

    let items = report
        .missed
        .iter()
        .map(|m| {
            Ok(serde_json::json!({
                "task": to_value(&m.task)?,
                "penalty": to_value(&m.penalty)?,
            }))
        })
        .collect::<std::result::Result<Vec<_>, RpcError>>()?;
    Ok(serde_json::json!({
        "missed": items,
        "previous_sweep_at": report.previous_sweep_at,
    }))
}
