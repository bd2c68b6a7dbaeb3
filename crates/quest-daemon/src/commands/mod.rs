//! IPC command handlers.
//!
//! Each submodule implements the commands for one IPC category. Handlers
//! take the acting identity from their params; nothing is read from
//! ambient session state.

pub mod ledger;
pub mod reactions;
pub mod scoring;
pub mod tasks;
pub mod users;

use serde::Serialize;
use serde_json::Value;

use crate::rpc::RpcError;

type Result<T> = std::result::Result<T, RpcError>;

/// Default page size for paged projections.
const DEFAULT_PAGE_SIZE: u32 = 20;

fn required_str<'a>(params: &'a Value, key: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

fn optional_str<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_i64(params: &Value, key: &str) -> Result<i64> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| RpcError::invalid_params(&format!("{key} required")))
}

fn optional_u64(params: &Value, key: &str) -> Result<Option<u64>> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| RpcError::invalid_params(&format!("{key} must be a non-negative integer"))),
    }
}

/// `(offset, limit)` from optional `offset` / `limit` params.
fn page_params(params: &Value) -> Result<(u32, u32)> {
    let offset = optional_u64(params, "offset")?.unwrap_or(0);
    let limit = optional_u64(params, "limit")?.unwrap_or(u64::from(DEFAULT_PAGE_SIZE));
    let offset =
        u32::try_from(offset).map_err(|_| RpcError::invalid_params("offset out of range"))?;
    let limit = u32::try_from(limit).unwrap_or(u32::MAX);
    Ok((offset, limit))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| RpcError::internal_error(&format!("serialization error: {e}")))
}
