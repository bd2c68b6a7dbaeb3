//! User registration command handlers.

use std::sync::Arc;

use serde_json::Value;

use super::{optional_str, required_str, to_value};
use crate::rpc::RpcError;
use crate::DaemonState;

type Result = std::result::Result<Value, RpcError>;

/// Register a group member, or update their display name.
pub async fn register_user(state: &Arc<DaemonState>, params: &Value) -> Result {
    let user = required_str(params, "user")?;
    let display_name = optional_str(params, "display_name").unwrap_or(user);

    let db = state.db.lock().await;
    let registered = quest_db::queries::users::register(&db, user, display_name, crate::unix_now())
        .map_err(|e| RpcError::from_db(&e))?;
    to_value(&registered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_user_defaults_display_name() {
        let state = crate::test_state();
        let value = register_user(&state, &serde_json::json!({"user": "ana"}))
            .await
            .expect("register");
        assert_eq!(value["id"], "ana");
        assert_eq!(value["display_name"], "ana");

        let err = register_user(&state, &serde_json::json!({}))
            .await
            .expect_err("user required");
        assert_eq!(err.code, -32602);
    }
}
