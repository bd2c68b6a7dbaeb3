//! Ledger projection command handlers.

use std::sync::Arc;

use quest_db::queries::{balances, ledger, users};
use serde_json::Value;

use super::{optional_str, page_params, required_str, to_value};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// A member's balance under the configured vote weight.
pub async fn get_balance(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user = required_str(params, "user")?;
    let db = state.db.lock().await;
    users::get(&db, user).map_err(|e| RpcError::from_db(&e))?;
    let xp = balances::balance(&db, user, state.vote_weight).map_err(|e| RpcError::from_db(&e))?;
    Ok(serde_json::json!({
        "user": user,
        "xp": xp,
    }))
}

/// One page of the ranking.
pub async fn get_leaderboard(state: &Arc<DaemonState>, params: &Value) -> Result {
    let (offset, limit) = page_params(params)?;
    let db = state.db.lock().await;
    let page = balances::leaderboard(&db, state.vote_weight, offset, limit)
        .map_err(|e| RpcError::from_db(&e))?;
    to_value(&page)
}

/// Reverse-chronological completion feed, with `viewer`'s own votes.
pub async fn get_recent_completions(state: &Arc<DaemonState>, params: &Value) -> Result {
    let viewer = optional_str(params, "viewer");
    let (offset, limit) = page_params(params)?;
    let db = state.db.lock().await;
    let page = ledger::recent_completions(&db, viewer, offset, limit)
        .map_err(|e| RpcError::from_db(&e))?;
    to_value(&page)
}

/// A member's ledger entries in insertion order.
pub async fn get_user_ledger(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user = required_str(params, "user")?;
    let db = state.db.lock().await;
    let entries = ledger::entries_for_user(&db, user).map_err(|e| RpcError::from_db(&e))?;
    to_value(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_db::queries::tasks;

    async fn seeded() -> Arc<DaemonState> {
        let state = crate::test_state();
        let mut db = state.db.lock().await;
        for (id, name, at) in [("ana", "Ana", 1), ("bo", "Bo", 2), ("cy", "Cy", 3)] {
            users::register(&db, id, name, at).expect("register");
        }
        for (owner, xp) in [("bo", 30), ("ana", 45)] {
            let task = tasks::insert(
                &db,
                &tasks::NewTask {
                    owner,
                    title: "laundry",
                    description: None,
                    due_at: None,
                    xp_assigned: xp,
                    factors: None,
                    rationale: None,
                },
                10,
            )
            .expect("insert");
            tasks::complete(&mut db, owner, task.id, &["l.jpg".to_string()], 20).expect("complete");
        }
        drop(db);
        state
    }

    #[tokio::test]
    async fn test_balance_and_leaderboard() {
        let state = seeded().await;
        let balance = get_balance(&state, &serde_json::json!({"user": "ana"}))
            .await
            .expect("balance");
        assert_eq!(balance["xp"], 45);

        let page = get_leaderboard(&state, &serde_json::json!({"limit": 2}))
            .await
            .expect("leaderboard");
        assert_eq!(page["total"], 3);
        let items = page["items"].as_array().expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["user"], "ana");
        assert_eq!(items[0]["rank"], 1);
        assert_eq!(items[1]["user"], "bo");

        let rest = get_leaderboard(&state, &serde_json::json!({"offset": 2}))
            .await
            .expect("second page");
        assert_eq!(rest["items"][0]["user"], "cy");
        assert_eq!(rest["items"][0]["xp"], 0);
    }

    #[tokio::test]
    async fn test_unknown_user_balance() {
        let state = seeded().await;
        let err = get_balance(&state, &serde_json::json!({"user": "zed"}))
            .await
            .expect_err("unknown");
        assert_eq!(err.code, -32020);
    }

    #[tokio::test]
    async fn test_feed_and_user_ledger() {
        let state = seeded().await;
        let feed = get_recent_completions(&state, &serde_json::json!({"viewer": "cy"}))
            .await
            .expect("feed");
        assert_eq!(feed["total"], 2);
        assert_eq!(feed["items"][0]["task_title"], "laundry");
        assert!(feed["items"][0]["my_vote"].is_null());

        let entries = get_user_ledger(&state, &serde_json::json!({"user": "bo"}))
            .await
            .expect("ledger");
        assert_eq!(entries[0]["delta"], 30);
        assert_eq!(entries[0]["reason"], "completion");
    }
}
