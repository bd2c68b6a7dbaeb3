//! XP ledger entries and the read-side projections derived from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::reaction::{ReactionSummary, VoteValue};
use crate::{EntryId, ParseLabelError, TaskId, Timestamp, UserId};

/// Why a ledger entry was appended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LedgerReason {
    /// Owner completed the task with proof. `delta = +xp_assigned`.
    Completion,
    /// Task passed its due date while open. `delta = -ceil(xp_assigned / 2)`.
    MissedPenalty,
}

impl LedgerReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::MissedPenalty => "missed_penalty",
        }
    }
}

impl fmt::Display for LedgerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LedgerReason {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completion" => Ok(Self::Completion),
            "missed_penalty" => Ok(Self::MissedPenalty),
            other => Err(ParseLabelError {
                kind: "ledger reason",
                value: other.to_string(),
            }),
        }
    }
}

/// One append-only row of `xp_ledger`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub user: UserId,
    pub task: Option<TaskId>,
    pub delta: i64,
    pub reason: LedgerReason,
    pub proof_refs: Vec<String>,
    pub created_at: Timestamp,
}

/// One row of the ranked balance view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct RankedBalance {
    /// 1-based position in the full ranking.
    pub rank: u64,
    pub user: UserId,
    pub display_name: String,
    pub xp: i64,
}

/// One row of the recent-completions feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct FeedItem {
    pub ledger_entry_id: EntryId,
    pub created_at: Timestamp,
    pub proof_refs: Vec<String>,
    pub task_title: String,
    pub user: UserId,
    pub display_name: String,
    pub delta: i64,
    pub summary: ReactionSummary,
    /// The viewer's own vote on this entry.
    pub my_vote: Option<VoteValue>,
}

/// Penalty appended when a task is missed: `-ceil(xp / 2)`.
///
/// Tasks scored at or below zero carry no penalty.
pub fn missed_penalty(xp_assigned: i32) -> i64 {
    let xp = i64::from(xp_assigned.max(0));
    -((xp + 1) / 2)
}
