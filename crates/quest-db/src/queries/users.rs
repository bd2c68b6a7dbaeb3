//! Member query functions.

use quest_types::user::User;
use rusqlite::{Connection, OptionalExtension};

use crate::{DbError, Result};

/// Register a member, or update the display name of an existing one.
pub fn register(conn: &Connection, id: &str, display_name: &str, now: u64) -> Result<User> {
    let id = id.trim();
    if id.is_empty() {
        return Err(DbError::Validation("user id is required".into()));
    }
    conn.execute(
        "INSERT INTO users (id, display_name, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
        rusqlite::params![id, display_name, now as i64],
    )
    .map_err(DbError::from_write)?;
    get(conn, id)
}

/// Get a member by id.
pub fn get(conn: &Connection, id: &str) -> Result<User> {
    conn.query_row(
        "SELECT id, display_name, created_at FROM users WHERE id = ?1",
        [id],
        |row| {
            Ok(User {
                id: row.get(0)?,
                display_name: row.get(1)?,
                created_at: row.get::<_, i64>(2)? as u64,
            })
        },
    )
    .optional()?
    .ok_or_else(|| DbError::NotFound(format!("user '{id}'")))
}

/// List members in registration order.
pub fn list(conn: &Connection) -> Result<Vec<User>> {
    let mut stmt = conn.prepare(
        "SELECT id, display_name, created_at FROM users ORDER BY created_at, rowid",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(User {
                id: row.get(0)?,
                display_name: row.get(1)?,
                created_at: row.get::<_, i64>(2)? as u64,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::{test_db, NOW};

    #[test]
    fn test_register_and_get() {
        let conn = test_db();
        register(&conn, "ana", "Ana", NOW).expect("register");
        let user = get(&conn, "ana").expect("get");
        assert_eq!(user.display_name, "Ana");
        assert_eq!(user.created_at, NOW);
    }

    #[test]
    fn test_reregister_keeps_created_at() {
        let conn = test_db();
        register(&conn, "ana", "Ana", NOW).expect("register");
        let user = register(&conn, "ana", "Ana B.", NOW + 500).expect("re-register");
        assert_eq!(user.display_name, "Ana B.");
        assert_eq!(user.created_at, NOW);
        assert_eq!(list(&conn).expect("list").len(), 1);
    }

    #[test]
    fn test_blank_id_rejected() {
        let conn = test_db();
        assert!(matches!(
            register(&conn, "  ", "Nobody", NOW),
            Err(DbError::Validation(_))
        ));
    }

    #[test]
    fn test_get_missing() {
        let conn = test_db();
        assert!(matches!(get(&conn, "ghost"), Err(DbError::NotFound(_))));
    }
}
