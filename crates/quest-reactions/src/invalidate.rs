//! Change-stream events mapped to the projections they make stale.

use quest_types::events::ChangeEvent;
use quest_types::reaction::VoteWeight;
use quest_types::{EntryId, TaskId, UserId};

/// A consumer-side projection that can be refetched.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ProjectionKey {
    Leaderboard,
    RecentCompletions,
    Balance(UserId),
    /// Every per-user balance view.
    AllBalances,
    Reactions(EntryId),
    Task(TaskId),
}

/// Projections a consumer must refetch after `event`.
///
/// Vote changes only reach balances and rankings when `weight` is enabled.
/// A vote event does not carry the entry author, so a weighted vote marks
/// every balance view stale.
pub fn invalidations(event: &ChangeEvent, weight: VoteWeight) -> Vec<ProjectionKey> {
    match event {
        ChangeEvent::LedgerInserted {
            entry_id: _,
            user,
            task,
            delta: _,
        } => {
            let mut keys = vec![
                ProjectionKey::Balance(user.clone()),
                ProjectionKey::Leaderboard,
                ProjectionKey::RecentCompletions,
            ];
            if let Some(task_id) = task {
                keys.push(ProjectionKey::Task(*task_id));
            }
            keys
        }
        ChangeEvent::VoteChanged { entry_id, .. } => {
            let mut keys = vec![
                ProjectionKey::Reactions(*entry_id),
                ProjectionKey::RecentCompletions,
            ];
            if weight.is_enabled() {
                keys.push(ProjectionKey::Leaderboard);
                keys.push(ProjectionKey::AllBalances);
            }
            keys
        }
        ChangeEvent::TaskStatusChanged { task_id, .. } => vec![ProjectionKey::Task(*task_id)],
    }
}
