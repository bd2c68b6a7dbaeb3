//! Reaction vote query functions.
//!
//! The `(entry_id, voter)` primary key is the one-vote-per-voter invariant;
//! summaries are always recomputed from the vote rows, never cached.

use quest_types::ledger::LedgerReason;
use quest_types::reaction::{ReactionSummary, VoteOutcome, VoteValue};
use quest_types::EntryId;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;

use crate::{DbError, Result};

/// Current summary of an entry's votes.
pub fn summary(conn: &Connection, entry_id: EntryId) -> Result<ReactionSummary> {
    let (up, down): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(value = 1), 0), COALESCE(SUM(value = -1), 0)
         FROM reaction_votes WHERE entry_id = ?1",
        [entry_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(ReactionSummary::from_counts(entry_id, up as u64, down as u64))
}

/// The voter's current vote on an entry, if any.
pub fn my_vote(conn: &Connection, entry_id: EntryId, voter: &str) -> Result<Option<VoteValue>> {
    let value: Option<i64> = conn
        .query_row(
            "SELECT value FROM reaction_votes WHERE entry_id = ?1 AND voter = ?2",
            rusqlite::params![entry_id, voter],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value.and_then(VoteValue::from_i64))
}

/// Only completion entries take reactions, and never from their author.
fn check_votable(conn: &Connection, entry_id: EntryId, voter: &str) -> Result<()> {
    let row: Option<(String, String)> = conn
        .query_row(
            "SELECT user_id, reason FROM xp_ledger WHERE id = ?1",
            [entry_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    let Some((author, reason)) = row else {
        return Err(DbError::NotFound(format!("ledger entry {entry_id}")));
    };
    if reason != LedgerReason::Completion.as_str() {
        return Err(DbError::Constraint(format!(
            "ledger entry {entry_id} is a {reason} entry and takes no reactions"
        )));
    }
    if author == voter {
        return Err(DbError::Constraint("cannot react to your own entry".into()));
    }
    Ok(())
}

/// Move the voter's vote on `entry_id` to `next` within one transaction.
fn write_vote(
    conn: &mut Connection,
    entry_id: EntryId,
    voter: &str,
    next: impl FnOnce(Option<VoteValue>) -> Option<VoteValue>,
    now: u64,
) -> Result<VoteOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    check_votable(&tx, entry_id, voter)?;

    let previous = my_vote(&tx, entry_id, voter)?;
    let current = next(previous);

    match current {
        Some(value) if Some(value) != previous => {
            tx.execute(
                "INSERT INTO reaction_votes (entry_id, voter, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(entry_id, voter)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                rusqlite::params![entry_id, voter, value.as_i64(), now as i64],
            )
            .map_err(DbError::from_write)?;
        }
        None if previous.is_some() => {
            tx.execute(
                "DELETE FROM reaction_votes WHERE entry_id = ?1 AND voter = ?2",
                rusqlite::params![entry_id, voter],
            )
            .map_err(DbError::from_write)?;
        }
        _ => {}
    }

    let summary = summary(&tx, entry_id)?;
    tx.commit()?;

    debug!(entry_id, voter, ?previous, ?current, net = summary.net, "vote changed");
    Ok(VoteOutcome {
        previous,
        current,
        summary,
    })
}

/// Request `requested` on an entry.
///
/// Repeating the held value clears it; the opposite value flips it.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the entry does not exist
/// - [`DbError::Constraint`] if the entry is not a completion, the voter
///   authored it, or the voter is unknown
pub fn set_vote(
    conn: &mut Connection,
    entry_id: EntryId,
    voter: &str,
    requested: VoteValue,
    now: u64,
) -> Result<VoteOutcome> {
    write_vote(
        conn,
        entry_id,
        voter,
        |previous| VoteValue::resolve(previous, requested),
        now,
    )
}

/// Remove the voter's vote on an entry. A no-op when there is none.
pub fn clear_vote(
    conn: &mut Connection,
    entry_id: EntryId,
    voter: &str,
    now: u64,
) -> Result<VoteOutcome> {
    write_vote(conn, entry_id, voter, |_| None, now)
}
