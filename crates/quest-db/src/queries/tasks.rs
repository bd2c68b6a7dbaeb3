//! Task lifecycle query functions.
//!
//! `open -> completed` and `open -> missed` are the only transitions. Each
//! one flips the status and appends its ledger entry inside one `IMMEDIATE`
//! transaction, so a failed append leaves the task visibly `open`.

use quest_types::ledger::{missed_penalty, LedgerEntry, LedgerReason};
use quest_types::scoring::Factors;
use quest_types::task::{Task, TaskStatus};
use quest_types::TaskId;
use rusqlite::{Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{info, warn};

use super::{conversion_error, ledger, settings};
use crate::{DbError, Result};

const TASK_COLUMNS: &str = "id, owner, title, description, due_at, xp_assigned, factors, \
                            rationale, status, created_at, completed_at";

const LAST_SWEEP_KEY: &str = "last_sweep_at";

/// Fields supplied when a task is created.
#[derive(Debug, Clone)]
pub struct NewTask<'a> {
    pub owner: &'a str,
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub due_at: Option<u64>,
    pub xp_assigned: i32,
    pub factors: Option<&'a Factors>,
    pub rationale: Option<&'a str>,
}

/// A task moved to `missed` by the overdue rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedTask {
    pub task: Task,
    /// `None` when the task was scored at or below zero.
    pub penalty: Option<LedgerEntry>,
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let factors = row
        .get::<_, Option<String>>(6)?
        .map(|json| serde_json::from_str::<Factors>(&json))
        .transpose()
        .map_err(|e| conversion_error(6, e))?;
    let status = row
        .get::<_, String>(8)?
        .parse::<TaskStatus>()
        .map_err(|e| conversion_error(8, e))?;

    Ok(Task {
        id: row.get(0)?,
        owner: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        due_at: row.get::<_, Option<i64>>(4)?.map(|t| t as u64),
        xp_assigned: row.get(5)?,
        factors,
        rationale: row.get(7)?,
        status,
        created_at: row.get::<_, i64>(9)? as u64,
        completed_at: row.get::<_, Option<i64>>(10)?.map(|t| t as u64),
    })
}

/// Insert a new task in the `open` state.
pub fn insert(conn: &Connection, new: &NewTask<'_>, now: u64) -> Result<Task> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(DbError::Validation("title is required".into()));
    }
    let due_at = new
        .due_at
        .map(i64::try_from)
        .transpose()
        .map_err(|_| DbError::Validation("due_at is out of range".into()))?;
    let factors = new
        .factors
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| DbError::Serialization(e.to_string()))?;

    conn.execute(
        "INSERT INTO tasks (owner, title, description, due_at, xp_assigned, factors, rationale, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            new.owner,
            title,
            new.description,
            due_at,
            new.xp_assigned,
            factors,
            new.rationale,
            now as i64,
        ],
    )
    .map_err(DbError::from_write)?;

    let task_id = conn.last_insert_rowid();
    info!(task_id, owner = new.owner, xp = new.xp_assigned, "task created");
    get(conn, task_id)
}

/// Get a task by id.
pub fn get(conn: &Connection, task_id: TaskId) -> Result<Task> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        [task_id],
        task_from_row,
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("task {task_id}")))
}

/// List an owner's tasks, newest first, optionally filtered by status.
pub fn list_for_owner(
    conn: &Connection,
    owner: &str,
    status: Option<TaskStatus>,
) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE owner = ?1 AND (?2 IS NULL OR status = ?2)
         ORDER BY id DESC"
    ))?;
    let rows = stmt
        .query_map(
            rusqlite::params![owner, status.map(TaskStatus::as_str)],
            task_from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Complete an open task with proof, appending `+xp_assigned` to the ledger.
///
/// # Errors
///
/// - [`DbError::Validation`] if no non-blank proof reference is given
/// - [`DbError::NotFound`] if the task does not exist
/// - [`DbError::NotOwner`] if `actor` does not own the task
/// - [`DbError::InvalidTransition`] if the task is already resolved
pub fn complete(
    conn: &mut Connection,
    actor: &str,
    task_id: TaskId,
    proof_refs: &[String],
    now: u64,
) -> Result<(Task, LedgerEntry)> {
    let proof_refs: Vec<String> = proof_refs
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if proof_refs.is_empty() {
        return Err(DbError::Validation(
            "proof is required to complete a task".into(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let task = get(&tx, task_id)?;

    if task.owner != actor {
        return Err(DbError::NotOwner {
            task_id,
            actor: actor.to_string(),
        });
    }
    if !task.status.can_transition_to(TaskStatus::Completed) {
        return Err(DbError::InvalidTransition {
            task_id,
            from: task.status,
            to: TaskStatus::Completed,
        });
    }

    let updated = tx
        .execute(
            "UPDATE tasks SET status = 'completed', completed_at = ?1
             WHERE id = ?2 AND status = 'open'",
            rusqlite::params![now as i64, task_id],
        )
        .map_err(DbError::from_write)?;
    if updated != 1 {
        return Err(DbError::InvalidTransition {
            task_id,
            from: task.status,
            to: TaskStatus::Completed,
        });
    }

    let entry = ledger::append(
        &tx,
        &task.owner,
        Some(task_id),
        i64::from(task.xp_assigned),
        LedgerReason::Completion,
        &proof_refs,
        now,
    )?;
    tx.commit()?;

    info!(task_id, owner = %task.owner, delta = entry.delta, "task completed");
    Ok((
        Task {
            status: TaskStatus::Completed,
            completed_at: Some(now),
            ..task
        },
        entry,
    ))
}

/// Apply the overdue rule to one task.
///
/// Returns `Ok(None)` without writing anything when the task is not open or
/// not yet past its due date, so reapplying the rule is a no-op.
pub fn mark_missed(conn: &mut Connection, task_id: TaskId, now: u64) -> Result<Option<MissedTask>> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let task = get(&tx, task_id)?;
    if !task.is_overdue(now) {
        return Ok(None);
    }

    let updated = tx
        .execute(
            "UPDATE tasks SET status = 'missed' WHERE id = ?1 AND status = 'open'",
            [task_id],
        )
        .map_err(DbError::from_write)?;
    if updated != 1 {
        return Ok(None);
    }

    let delta = missed_penalty(task.xp_assigned);
    let penalty = if delta == 0 {
        None
    } else {
        Some(ledger::append(
            &tx,
            &task.owner,
            Some(task_id),
            delta,
            LedgerReason::MissedPenalty,
            &[],
            now,
        )?)
    };
    tx.commit()?;

    info!(task_id, owner = %task.owner, delta, "task missed");
    Ok(Some(MissedTask {
        task: Task {
            status: TaskStatus::Missed,
            ..task
        },
        penalty,
    }))
}

/// When the overdue sweep last ran, or `None` if it never has.
pub fn last_sweep_at(conn: &Connection) -> Result<Option<u64>> {
    let at = settings::get_u64(conn, LAST_SWEEP_KEY, 0)?;
    Ok((at > 0).then_some(at))
}

/// Move every overdue open task to `missed` and record the sweep time.
///
/// Each task is resolved in its own transaction. A task that fails to
/// resolve is logged and left open for the next sweep; the tasks resolved
/// before and after it are still returned.
pub fn sweep_overdue(conn: &mut Connection, now: u64) -> Result<Vec<MissedTask>> {
    let overdue: Vec<TaskId> = {
        let mut stmt = conn.prepare(
            "SELECT id FROM tasks
             WHERE status = 'open' AND due_at IS NOT NULL AND due_at < ?1
             ORDER BY due_at, id",
        )?;
        let ids = stmt
            .query_map([now as i64], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        ids
    };

    let mut missed = Vec::with_capacity(overdue.len());
    for task_id in overdue {
        match mark_missed(conn, task_id, now) {
            Ok(Some(m)) => missed.push(m),
            Ok(None) => {}
            Err(e) => warn!(task_id, "failed to resolve overdue task: {}", e),
        }
    }

    settings::set(conn, LAST_SWEEP_KEY, &now.to_string())?;
    if !missed.is_empty() {
        info!(count = missed.len(), "overdue sweep resolved tasks");
    }
    Ok(missed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{open_task, register, test_db, NOW};

    fn proof() -> Vec<String> {
        vec!["uploads/ana/dishes.jpg".to_string()]
    }

    #[test]
    fn test_insert_starts_open() {
        let conn = test_db();
        register(&conn, "ana");
        let factors = Factors {
            minutes: 30,
            skill: 2,
            ..Default::default()
        };
        let task = insert(
            &conn,
            &NewTask {
                owner: "ana",
                title: "  dishes ",
                description: Some("all of them"),
                due_at: Some(NOW + 3600),
                xp_assigned: 25,
                factors: Some(&factors),
                rationale: Some("quick chore"),
            },
            NOW,
        )
        .expect("insert");
        assert_eq!(task.status, TaskStatus::Open);
        assert_eq!(task.title, "dishes");
        assert_eq!(task.factors, Some(factors));
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn test_insert_requires_known_owner() {
        let conn = test_db();
        let result = insert(
            &conn,
            &NewTask {
                owner: "ghost",
                title: "haunt",
                description: None,
                due_at: None,
                xp_assigned: 5,
                factors: None,
                rationale: None,
            },
            NOW,
        );
        assert!(matches!(result, Err(DbError::Constraint(_))));
    }

    #[test]
    fn test_insert_rejects_unrepresentable_due_at() {
        let mut conn = test_db();
        register(&conn, "ana");
        let result = insert(
            &conn,
            &NewTask {
                owner: "ana",
                title: "someday",
                description: None,
                due_at: Some(u64::MAX),
                xp_assigned: 10,
                factors: None,
                rationale: None,
            },
            NOW,
        );
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert!(list_for_owner(&conn, "ana", None).expect("list").is_empty());
        assert!(sweep_overdue(&mut conn, NOW).expect("sweep").is_empty());
    }

    #[test]
    fn test_complete_appends_once() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, None);

        let (done, entry) = complete(&mut conn, "ana", task.id, &proof(), NOW + 10).expect("complete");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(NOW + 10));
        assert_eq!(entry.delta, 40);
        assert_eq!(entry.reason, LedgerReason::Completion);
        assert_eq!(entry.proof_refs, proof());

        let again = complete(&mut conn, "ana", task.id, &proof(), NOW + 20);
        assert!(matches!(again, Err(DbError::InvalidTransition { .. })));
        assert_eq!(ledger::entries_for_task(&conn, task.id).expect("entries").len(), 1);
    }

    #[test]
    fn test_complete_requires_proof() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, None);
        let result = complete(&mut conn, "ana", task.id, &[" ".to_string()], NOW);
        assert!(matches!(result, Err(DbError::Validation(_))));
        assert_eq!(get(&conn, task.id).expect("get").status, TaskStatus::Open);
    }

    #[test]
    fn test_complete_requires_owner() {
        let mut conn = test_db();
        register(&conn, "ana");
        register(&conn, "bo");
        let task = open_task(&conn, "ana", 40, None);
        let result = complete(&mut conn, "bo", task.id, &proof(), NOW);
        assert!(matches!(result, Err(DbError::NotOwner { .. })));
    }

    #[test]
    fn test_complete_missing_task() {
        let mut conn = test_db();
        let result = complete(&mut conn, "ana", 99, &proof(), NOW);
        assert!(matches!(result, Err(DbError::NotFound(_))));
    }

    #[test]
    fn test_missed_task_cannot_complete() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, Some(NOW + 100));
        mark_missed(&mut conn, task.id, NOW + 101)
            .expect("mark missed")
            .expect("task was overdue");
        let result = complete(&mut conn, "ana", task.id, &proof(), NOW + 102);
        assert!(matches!(
            result,
            Err(DbError::InvalidTransition {
                from: TaskStatus::Missed,
                ..
            })
        ));
    }

    #[test]
    fn test_mark_missed_penalty_once() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, Some(NOW + 100));

        let missed = mark_missed(&mut conn, task.id, NOW + 101)
            .expect("mark missed")
            .expect("overdue");
        assert_eq!(missed.task.status, TaskStatus::Missed);
        let penalty = missed.penalty.expect("penalty entry");
        assert_eq!(penalty.delta, -20);
        assert_eq!(penalty.reason, LedgerReason::MissedPenalty);

        assert!(mark_missed(&mut conn, task.id, NOW + 500).expect("second").is_none());
        assert_eq!(ledger::entries_for_task(&conn, task.id).expect("entries").len(), 1);
    }

    #[test]
    fn test_mark_missed_not_yet_due() {
        let mut conn = test_db();
        register(&conn, "ana");
        let due = open_task(&conn, "ana", 40, Some(NOW + 100));
        let undated = open_task(&conn, "ana", 40, None);
        assert!(mark_missed(&mut conn, due.id, NOW + 100).expect("at due").is_none());
        assert!(mark_missed(&mut conn, undated.id, u64::MAX / 2).expect("undated").is_none());
        assert_eq!(get(&conn, due.id).expect("get").status, TaskStatus::Open);
    }

    #[test]
    fn test_mark_missed_completed_task_is_noop() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, Some(NOW + 100));
        complete(&mut conn, "ana", task.id, &proof(), NOW + 50).expect("complete");
        assert!(mark_missed(&mut conn, task.id, NOW + 200).expect("sweep").is_none());
        assert_eq!(get(&conn, task.id).expect("get").status, TaskStatus::Completed);
    }

    #[test]
    fn test_zero_xp_missed_without_entry() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", -15, Some(NOW + 1));
        let missed = mark_missed(&mut conn, task.id, NOW + 2)
            .expect("mark missed")
            .expect("overdue");
        assert_eq!(missed.task.status, TaskStatus::Missed);
        assert!(missed.penalty.is_none());
        assert!(ledger::entries_for_task(&conn, task.id).expect("entries").is_empty());
    }

    #[test]
    fn test_sweep_overdue_idempotent() {
        let mut conn = test_db();
        register(&conn, "ana");
        register(&conn, "bo");
        let late = open_task(&conn, "ana", 40, Some(NOW + 10));
        let later = open_task(&conn, "bo", 11, Some(NOW + 20));
        let future = open_task(&conn, "bo", 30, Some(NOW + 10_000));

        assert_eq!(last_sweep_at(&conn).expect("never swept"), None);
        let first = sweep_overdue(&mut conn, NOW + 100).expect("sweep");
        assert_eq!(last_sweep_at(&conn).expect("swept"), Some(NOW + 100));
        let ids: Vec<_> = first.iter().map(|m| m.task.id).collect();
        assert_eq!(ids, vec![late.id, later.id]);
        assert_eq!(
            first.iter().filter_map(|m| m.penalty.as_ref()).map(|e| e.delta).collect::<Vec<_>>(),
            vec![-20, -6]
        );

        let second = sweep_overdue(&mut conn, NOW + 200).expect("sweep again");
        assert!(second.is_empty());
        assert_eq!(get(&conn, future.id).expect("get").status, TaskStatus::Open);
        assert_eq!(last_sweep_at(&conn).expect("last sweep"), Some(NOW + 200));
    }

    #[test]
    fn test_sweep_skips_failing_task() {
        let mut conn = test_db();
        register(&conn, "ana");
        register(&conn, "bo");
        let first = open_task(&conn, "ana", 40, Some(NOW + 10));
        let stuck = open_task(&conn, "bo", 30, Some(NOW + 20));
        let last = open_task(&conn, "ana", 10, Some(NOW + 30));
        conn.execute_batch(&format!(
            "CREATE TRIGGER fail_penalty BEFORE INSERT ON xp_ledger
             WHEN NEW.task_id = {}
             BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END;",
            stuck.id
        ))
        .expect("install trigger");

        let missed = sweep_overdue(&mut conn, NOW + 100).expect("sweep");
        let ids: Vec<_> = missed.iter().map(|m| m.task.id).collect();
        assert_eq!(ids, vec![first.id, last.id]);
        assert_eq!(get(&conn, stuck.id).expect("get").status, TaskStatus::Open);
        assert!(ledger::entries_for_task(&conn, stuck.id).expect("entries").is_empty());

        conn.execute_batch("DROP TRIGGER fail_penalty").expect("drop trigger");
        let retry = sweep_overdue(&mut conn, NOW + 200).expect("retry");
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].task.id, stuck.id);
        assert_eq!(retry[0].penalty.as_ref().map(|e| e.delta), Some(-15));
    }

    #[test]
    fn test_complete_rolls_back_on_ledger_failure() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, None);
        conn.execute_batch(
            "CREATE TRIGGER fail_append BEFORE INSERT ON xp_ledger
             BEGIN SELECT RAISE(ABORT, 'ledger unavailable'); END;",
        )
        .expect("install trigger");

        let result = complete(&mut conn, "ana", task.id, &proof(), NOW + 10);
        assert!(result.is_err());
        let after = get(&conn, task.id).expect("get");
        assert_eq!(after.status, TaskStatus::Open);
        assert_eq!(after.completed_at, None);

        conn.execute_batch("DROP TRIGGER fail_append").expect("drop trigger");
        let (done, entry) = complete(&mut conn, "ana", task.id, &proof(), NOW + 20).expect("retry");
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(entry.delta, 40);
    }

    #[test]
    fn test_list_for_owner_filters() {
        let mut conn = test_db();
        register(&conn, "ana");
        register(&conn, "bo");
        let a1 = open_task(&conn, "ana", 10, None);
        let a2 = open_task(&conn, "ana", 20, None);
        open_task(&conn, "bo", 30, None);
        complete(&mut conn, "ana", a1.id, &proof(), NOW).expect("complete");

        let all: Vec<_> = list_for_owner(&conn, "ana", None)
            .expect("list")
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(all, vec![a2.id, a1.id]);

        let open = list_for_owner(&conn, "ana", Some(TaskStatus::Open)).expect("list open");
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a2.id);
    }

    #[test]
    fn test_schema_rejects_direct_tampering() {
        let mut conn = test_db();
        register(&conn, "ana");
        let task = open_task(&conn, "ana", 40, None);

        let rescore = conn.execute("UPDATE tasks SET xp_assigned = 99 WHERE id = ?1", [task.id]);
        assert!(rescore.is_err(), "xp_assigned must be immutable");

        complete(&mut conn, "ana", task.id, &proof(), NOW).expect("complete");
        let reopen = conn.execute("UPDATE tasks SET status = 'open' WHERE id = ?1", [task.id]);
        assert!(reopen.is_err(), "terminal status must stick");
    }
}
