//! Optimistic prediction reconciled against authoritative state.
//!
//! A [`Reconciled`] value is in one of three states:
//!
//! - settled: only the authoritative value exists;
//! - pending: a local prediction is shown over the authoritative value;
//! - resolved: an authoritative update ([`Reconciled::confirm`]) or a fresh
//!   fetch after a failed write ([`Reconciled::rollback`]) replaced the
//!   prediction, returning to settled.
//!
//! The prediction is never merged with server data. It is either confirmed
//! exactly or replaced outright.

use quest_types::reaction::{ReactionSummary, VoteOutcome, VoteValue};
use quest_types::EntryId;
use serde::{Deserialize, Serialize};

/// How an authoritative update related to what was being shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Reconciliation {
    /// The authoritative value equals what was shown; no visible change.
    Matched,
    /// The authoritative value replaced a different shown value.
    Corrected,
}

/// An authoritative value with an optional optimistic overlay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reconciled<T> {
    authoritative: T,
    predicted: Option<T>,
}

impl<T: Clone + PartialEq> Reconciled<T> {
    pub fn new(authoritative: T) -> Self {
        Self {
            authoritative,
            predicted: None,
        }
    }

    /// Value to display: the prediction while pending, else server truth.
    pub fn shown(&self) -> &T {
        self.predicted.as_ref().unwrap_or(&self.authoritative)
    }

    pub fn authoritative(&self) -> &T {
        &self.authoritative
    }

    pub fn is_pending(&self) -> bool {
        self.predicted.is_some()
    }

    /// Show `value` until the next confirm or rollback.
    pub fn predict(&mut self, value: T) {
        self.predicted = Some(value);
    }

    /// Replace the shown state with an authoritative update.
    pub fn confirm(&mut self, authoritative: T) -> Reconciliation {
        let outcome = if *self.shown() == authoritative {
            Reconciliation::Matched
        } else {
            Reconciliation::Corrected
        };
        self.authoritative = authoritative;
        self.predicted = None;
        outcome
    }

    /// Drop the prediction after a failed write, adopting a fresh fetch.
    pub fn rollback(&mut self, fetched: T) {
        if self.predicted.take().is_some() {
            tracing::debug!("optimistic state rolled back");
        }
        self.authoritative = fetched;
    }
}

/// What a voter sees for one entry: the tally and their own vote.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionState {
    pub summary: ReactionSummary,
    pub my_vote: Option<VoteValue>,
}

impl ReactionState {
    pub fn empty(entry_id: EntryId) -> Self {
        Self {
            summary: ReactionSummary::empty(entry_id),
            my_vote: None,
        }
    }

    /// State the store will persist if this voter requests `requested`.
    pub fn predict_vote(&self, requested: VoteValue) -> Self {
        self.predict_transition(VoteValue::resolve(self.my_vote, requested))
    }

    /// State the store will persist if this voter clears their vote.
    pub fn predict_clear(&self) -> Self {
        self.predict_transition(None)
    }

    fn predict_transition(&self, next: Option<VoteValue>) -> Self {
        let mut summary = self.summary.clone();
        summary.apply_transition(self.my_vote, next);
        Self {
            summary,
            my_vote: next,
        }
    }
}

impl From<VoteOutcome> for ReactionState {
    fn from(outcome: VoteOutcome) -> Self {
        Self {
            summary: outcome.summary,
            my_vote: outcome.current,
        }
    }
}
