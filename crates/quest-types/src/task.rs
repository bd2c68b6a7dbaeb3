//! Task structures and lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::scoring::Factors;
use crate::{ParseLabelError, TaskId, Timestamp, UserId};

/// Lifecycle state of a task.
///
/// `Open` is the only non-terminal state. Both `Completed` and `Missed` are
/// stable: a task never returns to `Open`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    Completed,
    Missed,
}

impl TaskStatus {
    /// Label stored in the `tasks.status` column.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Completed => "completed",
            Self::Missed => "missed",
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Open)
    }

    /// Whether `self -> next` is a permitted lifecycle transition.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (Self::Open, Self::Completed) | (Self::Open, Self::Missed)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "completed" => Ok(Self::Completed),
            "missed" => Ok(Self::Missed),
            other => Err(ParseLabelError {
                kind: "task status",
                value: other.to_string(),
            }),
        }
    }
}

/// A task owned by one member.
///
/// `xp_assigned` is fixed when the task is created and never re-scored.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct Task {
    pub id: TaskId,
    pub owner: UserId,
    pub title: String,
    pub description: Option<String>,
    pub due_at: Option<Timestamp>,
    pub xp_assigned: i32,
    pub factors: Option<Factors>,
    pub rationale: Option<String>,
    pub status: TaskStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    /// Whether the overdue rule applies to this task at `now`.
    pub fn is_overdue(&self, now: Timestamp) -> bool {
        self.status == TaskStatus::Open && self.due_at.is_some_and(|due| due < now)
    }
}
