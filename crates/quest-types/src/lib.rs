//! # quest-types
//!
//! Shared domain types used across the Quest workspace: tasks, the XP
//! ledger, peer reactions, scoring factors, and change-stream events.
//!
//! Types that cross the daemon boundary derive `ts_rs::TS` so presentation
//! layers can consume generated TypeScript bindings.

pub mod events;
pub mod ledger;
pub mod reaction;
pub mod scoring;
pub mod task;
pub mod user;

/// Identity of a group member. Opaque to the engine.
pub type UserId = String;
/// Row id of a task.
pub type TaskId = i64;
/// Row id of an `xp_ledger` entry.
pub type EntryId = i64;
/// Unix epoch seconds.
pub type Timestamp = u64;

/// Upper bound on page sizes served by paged projections.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Error returned when a stored enum label cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseLabelError {
    /// What was being parsed ("task status", "ledger reason", ...).
    pub kind: &'static str,
    /// The offending label.
    pub value: String,
}

/// A page of a projection together with the total valid at query time.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize, ts_rs::TS)]
pub struct Page<T> {
    pub total: u64,
    pub offset: u32,
    pub items: Vec<T>,
}
