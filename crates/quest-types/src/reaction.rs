//! Peer reactions (up/down votes) on ledger entries.
//!
//! A voter holds at most one vote per entry. The per-entry summary is a pure
//! projection over the current votes; the same transition and counter rules
//! are used by the store and by client-side prediction so the two agree.

use serde::{Deserialize, Serialize};

use crate::EntryId;

/// A single vote. Absence of a vote is `None` wherever it is modelled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum VoteValue {
    Up,
    Down,
}

impl VoteValue {
    /// Stored value in `reaction_votes.value`.
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Parse a stored value. Anything other than `1` or `-1` is rejected.
    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            1 => Some(Self::Up),
            -1 => Some(Self::Down),
            _ => None,
        }
    }

    /// Vote that results from requesting `requested` while holding `current`.
    ///
    /// Repeating the held value clears it; the opposite value flips it.
    pub fn resolve(current: Option<VoteValue>, requested: VoteValue) -> Option<VoteValue> {
        if current == Some(requested) {
            None
        } else {
            Some(requested)
        }
    }
}

/// Aggregate over the current votes of one entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct ReactionSummary {
    pub entry_id: EntryId,
    pub upvotes: u64,
    pub downvotes: u64,
    pub net: i64,
}

impl ReactionSummary {
    pub fn empty(entry_id: EntryId) -> Self {
        Self::from_counts(entry_id, 0, 0)
    }

    pub fn from_counts(entry_id: EntryId, upvotes: u64, downvotes: u64) -> Self {
        Self {
            entry_id,
            upvotes,
            downvotes,
            net: upvotes as i64 - downvotes as i64,
        }
    }

    /// Apply one voter's change from `previous` to `next` to the counters.
    pub fn apply_transition(&mut self, previous: Option<VoteValue>, next: Option<VoteValue>) {
        if previous == next {
            return;
        }
        match previous {
            Some(VoteValue::Up) => self.upvotes = self.upvotes.saturating_sub(1),
            Some(VoteValue::Down) => self.downvotes = self.downvotes.saturating_sub(1),
            None => {}
        }
        match next {
            Some(VoteValue::Up) => self.upvotes += 1,
            Some(VoteValue::Down) => self.downvotes += 1,
            None => {}
        }
        self.net = self.upvotes as i64 - self.downvotes as i64;
    }
}

/// Result of a vote mutation as persisted by the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
pub struct VoteOutcome {
    pub previous: Option<VoteValue>,
    pub current: Option<VoteValue>,
    pub summary: ReactionSummary,
}

/// How much one net vote on an entry adjusts its author's balance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ts_rs::TS)]
#[ts(export)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum VoteWeight {
    /// Reactions never touch balances.
    #[default]
    Disabled,
    /// Each net vote is worth a fixed number of points.
    Fixed(i64),
    /// Each net vote is worth `ceil(|delta| * pct / 100)` of the entry.
    XpPercent(u8),
}

impl VoteWeight {
    /// Points one net vote is worth on an entry with the given delta.
    pub fn per_vote(self, delta: i64) -> i64 {
        let (fixed, pct) = self.sql_params();
        fixed + (delta.abs() * pct + 99) / 100
    }

    /// `(fixed, percent)` pair used by SQL projections:
    /// `per_vote = fixed + (ABS(delta) * percent + 99) / 100`.
    pub fn sql_params(self) -> (i64, i64) {
        match self {
            Self::Disabled => (0, 0),
            Self::Fixed(points) => (points, 0),
            Self::XpPercent(pct) => (0, i64::from(pct)),
        }
    }

    pub fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_toggle_and_flip() {
        assert_eq!(VoteValue::resolve(None, VoteValue::Up), Some(VoteValue::Up));
        assert_eq!(VoteValue::resolve(Some(VoteValue::Up), VoteValue::Up), None);
        assert_eq!(
            VoteValue::resolve(Some(VoteValue::Up), VoteValue::Down),
            Some(VoteValue::Down)
        );
    }

    #[test]
    fn test_stored_values() {
        assert_eq!(VoteValue::from_i64(1), Some(VoteValue::Up));
        assert_eq!(VoteValue::from_i64(-1), Some(VoteValue::Down));
        assert_eq!(VoteValue::from_i64(0), None);
        assert_eq!(VoteValue::from_i64(2), None);
    }

    #[test]
    fn test_apply_transition_keeps_net_consistent() {
        let mut summary = ReactionSummary::from_counts(7, 2, 1);
        summary.apply_transition(None, Some(VoteValue::Up));
        assert_eq!((summary.upvotes, summary.downvotes, summary.net), (3, 1, 2));

        summary.apply_transition(Some(VoteValue::Up), Some(VoteValue::Down));
        assert_eq!((summary.upvotes, summary.downvotes, summary.net), (2, 2, 0));

        summary.apply_transition(Some(VoteValue::Down), None);
        assert_eq!((summary.upvotes, summary.downvotes, summary.net), (2, 1, 1));

        summary.apply_transition(None, None);
        assert_eq!(summary, ReactionSummary::from_counts(7, 2, 1));
    }

    #[test]
    fn test_vote_weight() {
        assert_eq!(VoteWeight::Disabled.per_vote(40), 0);
        assert_eq!(VoteWeight::Fixed(2).per_vote(40), 2);
        assert_eq!(VoteWeight::XpPercent(10).per_vote(40), 4);
        assert_eq!(VoteWeight::XpPercent(10).per_vote(41), 5);
        assert_eq!(VoteWeight::XpPercent(10).per_vote(-20), 2);
    }

    #[test]
    fn test_vote_weight_serde_shape() {
        let json = serde_json::to_value(VoteWeight::Fixed(3)).expect("serialize");
        assert_eq!(json, serde_json::json!({"mode": "fixed", "value": 3}));
        let parsed: VoteWeight =
            serde_json::from_value(serde_json::json!({"mode": "disabled"})).expect("parse");
        assert_eq!(parsed, VoteWeight::Disabled);
    }
}
