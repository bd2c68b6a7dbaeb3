//! JSON-RPC server over Unix socket.
//!
//! Listens on a Unix domain socket, accepts connections, and dispatches
//! newline-delimited JSON-RPC method calls to the command handlers. Each
//! connection is one UI session: it owns a vote throttle and, once
//! subscribed, receives change notifications interleaved with responses.

use std::path::PathBuf;
use std::sync::Arc;

use quest_db::DbError;
use quest_reactions::throttle::VoteThrottle;
use quest_reactions::ReactionError;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::commands;
use crate::events::EventBus;
use crate::DaemonState;

/// Outbound lines buffered per connection before writers wait.
const OUTBOUND_BUFFER: usize = 256;

/// JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct RpcRequest {
    /// JSON-RPC version (must be "2.0").
    pub jsonrpc: String,
    /// Request ID.
    #[serde(default)]
    pub id: serde_json::Value,
    /// Method name.
    pub method: String,
    /// Parameters.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct RpcResponse {
    /// JSON-RPC version.
    pub jsonrpc: String,
    /// Request ID.
    pub id: serde_json::Value,
    /// Result or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// Server-pushed JSON-RPC notification (no id).
#[derive(Debug, Serialize)]
pub struct RpcNotification {
    pub jsonrpc: String,
    pub method: String,
    pub params: serde_json::Value,
}

/// JSON-RPC error object.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RpcError {
    /// Numeric error code.
    pub code: i32,
    /// Error name.
    pub message: String,
    /// Optional structured data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RpcResponse {
    /// Create a success response.
    pub fn success(id: serde_json::Value, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: serde_json::Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

impl RpcNotification {
    pub fn new(method: &str, params: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.to_string(),
            params,
        }
    }
}

impl RpcError {
    fn with(code: i32, message: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            code,
            message: message.to_string(),
            data,
        }
    }

    // Standard JSON-RPC errors

    /// Parse error (-32700).
    pub fn parse_error() -> Self {
        Self::with(-32700, "PARSE_ERROR", None)
    }

    /// Invalid request (-32600).
    pub fn invalid_request() -> Self {
        Self::with(-32600, "INVALID_REQUEST", None)
    }

    /// Method not found (-32601).
    pub fn method_not_found(method: &str) -> Self {
        Self::with(
            -32601,
            "METHOD_NOT_FOUND",
            Some(serde_json::json!({"method": method})),
        )
    }

    /// Invalid params (-32602).
    pub fn invalid_params(detail: &str) -> Self {
        Self::with(
            -32602,
            "INVALID_PARAMS",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Internal error (-32603).
    pub fn internal_error(detail: &str) -> Self {
        Self::with(
            -32603,
            "INTERNAL_ERROR",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    // Domain errors

    /// Task, ledger entry, or user not found (-32020).
    pub fn not_found(detail: &str) -> Self {
        Self::with(-32020, "NOT_FOUND", Some(serde_json::json!({"detail": detail})))
    }

    /// Task status change not allowed (-32021).
    pub fn invalid_transition(data: serde_json::Value) -> Self {
        Self::with(-32021, "INVALID_TRANSITION", Some(data))
    }

    /// Actor does not own the task (-32022).
    pub fn not_owner(data: serde_json::Value) -> Self {
        Self::with(-32022, "NOT_OWNER", Some(data))
    }

    /// Write rejected by a schema constraint (-32023).
    pub fn constraint_violation(detail: &str) -> Self {
        Self::with(
            -32023,
            "CONSTRAINT_VIOLATION",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Vote changes throttled for this session (-32030).
    pub fn vote_rate_limited(retry_after_ms: u64) -> Self {
        Self::with(
            -32030,
            "VOTE_RATE_LIMITED",
            Some(serde_json::json!({"retry_after_ms": retry_after_ms})),
        )
    }

    /// Vote rejected by the store (-32031).
    pub fn vote_rejected(detail: &str) -> Self {
        Self::with(
            -32031,
            "VOTE_REJECTED",
            Some(serde_json::json!({"detail": detail})),
        )
    }

    /// Transient write failure; nothing was persisted (-32050).
    pub fn retryable_write_failure(detail: &str) -> Self {
        Self::with(
            -32050,
            "RETRYABLE_WRITE_FAILURE",
            Some(serde_json::json!({"detail": detail, "retryable": true})),
        )
    }

    /// Map a storage error to its wire error.
    pub fn from_db(err: &DbError) -> Self {
        if err.is_retryable() {
            return Self::retryable_write_failure(&err.to_string());
        }
        match err {
            DbError::NotFound(what) => Self::not_found(what),
            DbError::Validation(detail) => Self::invalid_params(detail),
            DbError::Constraint(detail) => Self::constraint_violation(detail),
            DbError::InvalidTransition { task_id, from, to } => {
                Self::invalid_transition(serde_json::json!({
                    "task_id": task_id,
                    "from": from,
                    "to": to,
                }))
            }
            DbError::NotOwner { task_id, actor } => Self::not_owner(serde_json::json!({
                "task_id": task_id,
                "actor": actor,
            })),
            other => Self::internal_error(&format!("db error: {other}")),
        }
    }

    /// Attach an extra field to the error's data object.
    pub fn with_data(mut self, key: &str, value: serde_json::Value) -> Self {
        let mut data = match self.data.take() {
            Some(serde_json::Value::Object(map)) => map,
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("detail".to_string(), other);
                map
            }
            None => serde_json::Map::new(),
        };
        data.insert(key.to_string(), value);
        self.data = Some(serde_json::Value::Object(data));
        self
    }
}

impl From<ReactionError> for RpcError {
    fn from(err: ReactionError) -> Self {
        match err {
            ReactionError::RateLimited { retry_after_ms } => Self::vote_rate_limited(retry_after_ms),
        }
    }
}

/// Per-connection state.
pub struct Session {
    /// Vote-change throttle for this UI session.
    pub throttle: VoteThrottle,
    outbound: mpsc::Sender<String>,
    subscription: Option<JoinHandle<()>>,
}

impl Session {
    pub fn new(throttle: VoteThrottle, outbound: mpsc::Sender<String>) -> Self {
        Self {
            throttle,
            outbound,
            subscription: None,
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    /// Start forwarding change notices to this connection.
    ///
    /// Returns `false` if already subscribed.
    pub fn subscribe(&mut self, bus: &EventBus) -> bool {
        if self.subscription.is_some() {
            return false;
        }
        let mut rx = bus.subscribe();
        let outbound = self.outbound.clone();
        self.subscription = Some(tokio::spawn(async move {
            loop {
                let notification = match rx.recv().await {
                    Ok(notice) => match serde_json::to_value(&notice) {
                        Ok(params) => RpcNotification::new("change", params),
                        Err(e) => {
                            warn!("Failed to encode change notice: {}", e);
                            continue;
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "subscriber lagged, requesting resync");
                        RpcNotification::new("resync", serde_json::json!({"skipped": skipped}))
                    }
                    Err(RecvError::Closed) => break,
                };
                let Ok(line) = serde_json::to_string(&notification) else {
                    continue;
                };
                if outbound.send(line).await.is_err() {
                    break;
                }
            }
        }));
        true
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Some(handle) = self.subscription.take() {
            handle.abort();
        }
    }
}

/// The RPC server.
pub struct RpcServer {
    state: Arc<DaemonState>,
    socket_path: PathBuf,
}

impl RpcServer {
    /// Create a new RPC server.
    pub fn new(state: Arc<DaemonState>, socket_path: PathBuf) -> Self {
        Self { state, socket_path }
    }

    /// Run the server, accepting connections.
    pub async fn run(&self) -> anyhow::Result<()> {
        // Remove stale socket file
        let _ = std::fs::remove_file(&self.socket_path);

        let listener = UnixListener::bind(&self.socket_path)?;
        info!("IPC server listening on {:?}", self.socket_path);

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let state = self.state.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(state, stream).await {
                            warn!("Connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

/// Write queued lines to the socket until every sender is gone.
async fn write_lines(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
) -> std::io::Result<()> {
    while let Some(mut line) = rx.recv().await {
        line.push('\n');
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}

/// Handle a single client connection.
async fn handle_connection(
    state: Arc<DaemonState>,
    stream: tokio::net::UnixStream,
) -> anyhow::Result<()> {
    let (reader, writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let writer_task = tokio::spawn(write_lines(writer, out_rx));

    let mut session = Session::new(state.new_throttle(), out_tx.clone());
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break; // EOF
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => dispatch_request(&state, &mut session, request).await,
            Err(_) => RpcResponse::error(serde_json::Value::Null, RpcError::parse_error()),
        };

        let response_json = serde_json::to_string(&response)?;
        if out_tx.send(response_json).await.is_err() {
            break; // writer gone
        }
    }

    drop(session);
    drop(out_tx);
    writer_task.await??;
    Ok(())
}

/// Dispatch a JSON-RPC request to the appropriate command handler.
pub async fn dispatch_request(
    state: &Arc<DaemonState>,
    session: &mut Session,
    request: RpcRequest,
) -> RpcResponse {
    let id = request.id.clone();
    let method = request.method.as_str();

    if request.jsonrpc != "2.0" {
        return RpcResponse::error(id, RpcError::invalid_request());
    }

    debug!("Dispatching RPC method: {}", method);

    let params = &request.params;
    let result = match method {
        // Users
        "register_user" => commands::users::register_user(state, params).await,

        // Scoring and tasks
        "assign_xp" => commands::scoring::assign_xp(state, params).await,
        "create_task" => commands::tasks::create_task(state, params).await,
        "get_task" => commands::tasks::get_task(state, params).await,
        "list_tasks" => commands::tasks::list_tasks(state, params).await,
        "complete_task" => commands::tasks::complete_task(state, params).await,
        "sweep_overdue" => commands::tasks::sweep_overdue(state).await,

        // Ledger projections
        "get_balance" => commands::ledger::get_balance(state, params).await,
        "get_leaderboard" => commands::ledger::get_leaderboard(state, params).await,
        "get_recent_completions" => {
            commands::ledger::get_recent_completions(state, params).await
        }
        "get_user_ledger" => commands::ledger::get_user_ledger(state, params).await,

        // Reactions
        "cast_vote" => commands::reactions::cast_vote(state, session, params).await,
        "clear_vote" => commands::reactions::clear_vote(state, session, params).await,
        "get_reactions" => commands::reactions::get_reactions(state, params).await,

        // Change stream
        "subscribe_changes" => {
            let newly = session.subscribe(&state.event_bus);
            Ok(serde_json::json!({
                "subscribed": session.is_subscribed(),
                "already_subscribed": !newly,
                "sequence": state.event_bus.sequence(),
            }))
        }

        _ => Err(RpcError::method_not_found(method)),
    };

    match result {
        Ok(value) => RpcResponse::success(id, value),
        Err(err) => RpcResponse::error(id, err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_types::task::TaskStatus;

    fn request(method: &str, params: serde_json::Value) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0".to_string(),
            id: serde_json::json!(1),
            method: method.to_string(),
            params,
        }
    }

    #[test]
    fn test_rpc_error_codes() {
        let err = RpcError::method_not_found("unknown");
        assert_eq!(err.code, -32601);

        let err = RpcError::vote_rate_limited(800);
        assert_eq!(err.code, -32030);
        assert_eq!(err.message, "VOTE_RATE_LIMITED");

        let err = RpcError::retryable_write_failure("busy");
        assert_eq!(err.code, -32050);
    }

    #[test]
    fn test_from_db_mapping() {
        let err = RpcError::from_db(&DbError::NotFound("task 9".into()));
        assert_eq!(err.code, -32020);

        let err = RpcError::from_db(&DbError::InvalidTransition {
            task_id: 3,
            from: TaskStatus::Missed,
            to: TaskStatus::Completed,
        });
        assert_eq!(err.code, -32021);
        assert_eq!(
            err.data.expect("data")["from"],
            serde_json::json!("missed")
        );

        let err = RpcError::from_db(&DbError::Validation("proof is required".into()));
        assert_eq!(err.code, -32602);

        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let err = RpcError::from_db(&DbError::Sqlite(busy));
        assert_eq!(err.code, -32050);
    }

    #[test]
    fn test_with_data_merges() {
        let err = RpcError::vote_rejected("own entry").with_data("authoritative", serde_json::json!(1));
        let data = err.data.expect("data");
        assert_eq!(data["detail"], "own entry");
        assert_eq!(data["authoritative"], 1);
    }

    #[test]
    fn test_rpc_response_success() {
        let resp = RpcResponse::success(serde_json::json!(1), serde_json::json!({"xp": 40}));
        assert!(resp.result.is_some());
        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_dispatch_unknown_method() {
        let state = crate::test_state();
        let (tx, _rx) = mpsc::channel(4);
        let mut session = Session::new(state.new_throttle(), tx);
        let resp = dispatch_request(&state, &mut session, request("mint_xp", serde_json::json!({}))).await;
        assert_eq!(resp.error.expect("error").code, -32601);
    }

    #[tokio::test]
    async fn test_dispatch_rejects_wrong_version() {
        let state = crate::test_state();
        let (tx, _rx) = mpsc::channel(4);
        let mut session = Session::new(state.new_throttle(), tx);
        let mut req = request("get_leaderboard", serde_json::json!({}));
        req.jsonrpc = "1.0".to_string();
        let resp = dispatch_request(&state, &mut session, req).await;
        assert_eq!(resp.error.expect("error").code, -32600);
    }

    #[tokio::test]
    async fn test_subscription_forwards_changes() {
        let state = crate::test_state();
        let (tx, mut rx) = mpsc::channel(4);
        let mut session = Session::new(state.new_throttle(), tx);

        let resp = dispatch_request(
            &state,
            &mut session,
            request("subscribe_changes", serde_json::json!({})),
        )
        .await;
        assert_eq!(resp.result.expect("result")["subscribed"], true);

        state.event_bus.emit(quest_types::events::ChangeEvent::VoteChanged {
            entry_id: 5,
            voter: "bo".to_string(),
        });

        let line = rx.recv().await.expect("notification");
        let value: serde_json::Value = serde_json::from_str(&line).expect("json");
        assert_eq!(value["method"], "change");
        assert_eq!(value["params"]["event"]["kind"], "vote_changed");
        assert!(value.get("id").is_none());
    }
}
