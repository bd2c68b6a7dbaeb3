//! Balance projections.
//!
//! A balance is never stored: it is the sum of a user's ledger deltas plus,
//! when a [`VoteWeight`] is configured, `net votes * per-vote weight` for
//! each of their entries.
//!
//! Ranking is `xp DESC`, ties broken by the id of each user's earliest
//! ledger entry; users without entries follow in registration order.

use quest_types::ledger::RankedBalance;
use quest_types::reaction::VoteWeight;
use quest_types::Page;
use rusqlite::{Connection, OptionalExtension};

use crate::{page_limit, Result};

/// Per-user aggregate. `?1` = fixed points per vote, `?2` = percent of |delta|.
const PER_USER_CTE: &str = "
    WITH nets AS (
        SELECT entry_id, SUM(value) AS net FROM reaction_votes GROUP BY entry_id
    ),
    per_user AS (
        SELECT l.user_id AS user_id,
               SUM(l.delta)
                 + SUM(COALESCE(n.net, 0) * (?1 + (ABS(l.delta) * ?2 + 99) / 100)) AS xp,
               MIN(l.id) AS first_entry
        FROM xp_ledger l
        LEFT JOIN nets n ON n.entry_id = l.id
        GROUP BY l.user_id
    )";

/// Plain sum of a user's ledger deltas.
pub fn ledger_sum(conn: &Connection, user: &str) -> Result<i64> {
    let sum: i64 = conn.query_row(
        "SELECT COALESCE(SUM(delta), 0) FROM xp_ledger WHERE user_id = ?1",
        [user],
        |row| row.get(0),
    )?;
    Ok(sum)
}

/// A user's balance under `weight`.
pub fn balance(conn: &Connection, user: &str, weight: VoteWeight) -> Result<i64> {
    let (fixed, pct) = weight.sql_params();
    let xp: Option<i64> = conn
        .query_row(
            &format!("{PER_USER_CTE} SELECT xp FROM per_user WHERE user_id = ?3"),
            rusqlite::params![fixed, pct, user],
            |row| row.get(0),
        )
        .optional()?;
    Ok(xp.unwrap_or(0))
}

/// One page of the ranking, with the member count valid at query time.
pub fn leaderboard(
    conn: &Connection,
    weight: VoteWeight,
    offset: u32,
    limit: u32,
) -> Result<Page<RankedBalance>> {
    let (fixed, pct) = weight.sql_params();
    let tx = conn.unchecked_transaction()?;

    let total: i64 = tx.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;

    let items = {
        let mut stmt = tx.prepare(&format!(
            "{PER_USER_CTE}
             SELECT u.id, u.display_name, COALESCE(p.xp, 0) AS xp
             FROM users u
             LEFT JOIN per_user p ON p.user_id = u.id
             ORDER BY xp DESC, p.first_entry IS NULL, p.first_entry, u.created_at, u.rowid
             LIMIT ?3 OFFSET ?4"
        ))?;
        let rows = stmt
            .query_map(
                rusqlite::params![fixed, pct, page_limit(limit), offset],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?)),
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        rows
    };
    tx.commit()?;

    let items = items
        .into_iter()
        .enumerate()
        .map(|(i, (user, display_name, xp))| RankedBalance {
            rank: u64::from(offset) + i as u64 + 1,
            user,
            display_name,
            xp,
        })
        .collect();

    Ok(Page {
        total: total as u64,
        offset,
        items,
    })
}
