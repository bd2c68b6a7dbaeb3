//! Change-stream events for projection invalidation.
//!
//! The store's writers publish one event per committed mutation. Consumers
//! treat an event as "this projection may be stale", never as data to apply.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;
use crate::{EntryId, TaskId, Timestamp, UserId};

/// A committed change to a shared table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChangeEvent {
    /// A row was appended to `xp_ledger`.
    LedgerInserted {
        entry_id: EntryId,
        user: UserId,
        task: Option<TaskId>,
        delta: i64,
    },
    /// A vote row was inserted, flipped, or deleted.
    VoteChanged { entry_id: EntryId, voter: UserId },
    /// A task left the `open` state.
    TaskStatusChanged {
        task_id: TaskId,
        owner: UserId,
        status: TaskStatus,
    },
}

/// Envelope carrying a change event on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ChangeNotice {
    /// Monotonic per-daemon sequence number.
    pub sequence: u64,
    pub timestamp: Timestamp,
    pub event: ChangeEvent,
}
