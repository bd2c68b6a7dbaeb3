//! Change-stream emission.
//!
//! Committed mutations are pushed to subscribed connections as JSON-RPC
//! notifications. Each subscriber has an independent buffer; a subscriber
//! that falls behind is told to resynchronize instead of being blocked on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use quest_db::queries::tasks::MissedTask;
use quest_types::events::{ChangeEvent, ChangeNotice};
use quest_types::ledger::LedgerEntry;
use quest_types::reaction::VoteOutcome;
use quest_types::task::Task;
use tokio::sync::broadcast;

/// Event bus for broadcasting change notices to subscribers.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeNotice>,
    sequence: Arc<AtomicU64>,
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers, returning its sequence number.
    pub fn emit(&self, event: ChangeEvent) -> u64 {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(ChangeNotice {
            sequence,
            timestamp: crate::unix_now(),
            event,
        });
        sequence
    }

    /// Subscribe to change notices. Returns a receiver.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeNotice> {
        self.sender.subscribe()
    }

    /// Get the current sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    pub fn ledger_inserted(&self, entry: &LedgerEntry) {
        self.emit(ChangeEvent::LedgerInserted {
            entry_id: entry.id,
            user: entry.user.clone(),
            task: entry.task,
            delta: entry.delta,
        });
    }

    pub fn task_status_changed(&self, task: &Task) {
        self.emit(ChangeEvent::TaskStatusChanged {
            task_id: task.id,
            owner: task.owner.clone(),
            status: task.status,
        });
    }

    /// Emit a vote event if the outcome actually changed a row.
    pub fn vote_changed(&self, voter: &str, outcome: &VoteOutcome) {
        if outcome.previous != outcome.current {
            self.emit(ChangeEvent::VoteChanged {
                entry_id: outcome.summary.entry_id,
                voter: voter.to_string(),
            });
        }
    }

    /// Emit the events for tasks resolved by an overdue sweep.
    pub fn tasks_missed(&self, missed: &[MissedTask]) {
        for item in missed {
            self.task_status_changed(&item.task);
            if let Some(ref penalty) = item.penalty {
                self.ledger_inserted(penalty);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quest_types::reaction::{ReactionSummary, VoteValue};

    #[test]
    fn test_event_bus_emit_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(ChangeEvent::VoteChanged {
            entry_id: 4,
            voter: "bo".to_string(),
        });

        let notice = rx.try_recv().expect("receive notice");
        assert_eq!(notice.sequence, 1);
        assert!(matches!(
            notice.event,
            ChangeEvent::VoteChanged { entry_id: 4, .. }
        ));
        assert_eq!(bus.sequence(), 1);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(
            bus.emit(ChangeEvent::VoteChanged {
                entry_id: 1,
                voter: "bo".to_string(),
            }),
            1
        );
    }

    #[test]
    fn test_noop_vote_not_emitted() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        let outcome = VoteOutcome {
            previous: Some(VoteValue::Up),
            current: Some(VoteValue::Up),
            summary: ReactionSummary::from_counts(2, 1, 0),
        };
        bus.vote_changed("bo", &outcome);
        assert!(rx.try_recv().is_err());
        assert_eq!(bus.sequence(), 0);
    }
}
