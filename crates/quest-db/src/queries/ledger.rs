//! XP ledger query functions.
//!
//! Rows are only ever inserted, by the lifecycle operations in
//! [`tasks`](super::tasks); the schema aborts any update or delete.

use quest_types::ledger::{FeedItem, LedgerEntry, LedgerReason};
use quest_types::reaction::{ReactionSummary, VoteValue};
use quest_types::{EntryId, Page, TaskId};
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::info;

use super::conversion_error;
use crate::{page_limit, DbError, Result};

const ENTRY_COLUMNS: &str = "id, user_id, task_id, delta, reason, proof_refs, created_at";

fn proof_refs_from(column: usize, json: &str) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(json).map_err(|e| conversion_error(column, e))
}

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let reason = row
        .get::<_, String>(4)?
        .parse::<LedgerReason>()
        .map_err(|e| conversion_error(4, e))?;
    Ok(LedgerEntry {
        id: row.get(0)?,
        user: row.get(1)?,
        task: row.get(2)?,
        delta: row.get(3)?,
        reason,
        proof_refs: proof_refs_from(5, &row.get::<_, String>(5)?)?,
        created_at: row.get::<_, i64>(6)? as u64,
    })
}

/// Append one entry. Callers own the surrounding transaction.
pub(crate) fn append(
    conn: &Connection,
    user: &str,
    task: Option<TaskId>,
    delta: i64,
    reason: LedgerReason,
    proof_refs: &[String],
    now: u64,
) -> Result<LedgerEntry> {
    let proof_json =
        serde_json::to_string(proof_refs).map_err(|e| DbError::Serialization(e.to_string()))?;
    conn.execute(
        "INSERT INTO xp_ledger (user_id, task_id, delta, reason, proof_refs, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![user, task, delta, reason.as_str(), proof_json, now as i64],
    )
    .map_err(DbError::from_write)?;

    let entry_id = conn.last_insert_rowid();
    info!(entry_id, user, delta, %reason, "ledger entry appended");
    Ok(LedgerEntry {
        id: entry_id,
        user: user.to_string(),
        task,
        delta,
        reason,
        proof_refs: proof_refs.to_vec(),
        created_at: now,
    })
}

/// Get one entry by id.
pub fn get(conn: &Connection, entry_id: EntryId) -> Result<LedgerEntry> {
    conn.query_row(
        &format!("SELECT {ENTRY_COLUMNS} FROM xp_ledger WHERE id = ?1"),
        [entry_id],
        entry_from_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("ledger entry {entry_id}")))
}

/// All entries of a user in insertion order.
pub fn entries_for_user(conn: &Connection, user: &str) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM xp_ledger WHERE user_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([user], entry_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// All entries referencing a task in insertion order.
pub fn entries_for_task(conn: &Connection, task_id: TaskId) -> Result<Vec<LedgerEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM xp_ledger WHERE task_id = ?1 ORDER BY id"
    ))?;
    let rows = stmt
        .query_map([task_id], entry_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Reverse-chronological page of completion entries with their reactions.
///
/// `viewer` selects whose own vote is reported in `my_vote`. The total and
/// the page rows are read from the same snapshot.
pub fn recent_completions(
    conn: &Connection,
    viewer: Option<&str>,
    offset: u32,
    limit: u32,
) -> Result<Page<FeedItem>> {
    let tx = conn.unchecked_transaction()?;

    let total: i64 = tx.query_row(
        "SELECT COUNT(*) FROM xp_ledger WHERE reason = 'completion'",
        [],
        |row| row.get(0),
    )?;

    let items = {
        let mut stmt = tx.prepare(
            "SELECT l.id, l.created_at, l.proof_refs, t.title, l.user_id, u.display_name, l.delta,
                    COALESCE((SELECT SUM(v.value = 1) FROM reaction_votes v WHERE v.entry_id = l.id), 0),
                    COALESCE((SELECT SUM(v.value = -1) FROM reaction_votes v WHERE v.entry_id = l.id), 0),
                    (SELECT v.value FROM reaction_votes v WHERE v.entry_id = l.id AND v.voter = ?1)
             FROM xp_ledger l
             JOIN tasks t ON t.id = l.task_id
             JOIN users u ON u.id = l.user_id
             WHERE l.reason = 'completion'
             ORDER BY l.created_at DESC, l.id DESC
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt
            .query_map(
                rusqlite::params![viewer, page_limit(limit), offset],
                |row| {
                    let entry_id: EntryId = row.get(0)?;
                    Ok(FeedItem {
                        ledger_entry_id: entry_id,
                        created_at: row.get::<_, i64>(1)? as u64,
                        proof_refs: proof_refs_from(2, &row.get::<_, String>(2)?)?,
                        task_title: row.get(3)?,
                        user: row.get(4)?,
                        display_name: row.get(5)?,
                        delta: row.get(6)?,
                        summary: ReactionSummary::from_counts(
                            entry_id,
                            row.get::<_, i64>(7)? as u64,
                            row.get::<_, i64>(8)? as u64,
                        ),
                        my_vote: row.get::<_, Option<i64>>(9)?.and_then(VoteValue::from_i64),
                    })
                },
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };
    tx.commit()?;

    Ok(Page {
        total: total as u64,
        offset,
        items,
    })
}
