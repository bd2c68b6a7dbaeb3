//! Integration test crate for the Quest engine.
//!
//! The scenarios in `tests/` exercise scoring, the task lifecycle, the
//! ledger projections, and reactions across the workspace crates without a
//! running daemon. This library only holds the fixtures they share.
//!
//! Run all integration tests:
//! ```sh
//! cargo test -p quest-integration-tests
//! ```

use std::path::{Path, PathBuf};

use quest_db::queries::{tasks, users};
use quest_types::task::Task;
use rusqlite::Connection;

/// Simulated timestamp for deterministic testing.
pub const TEST_TIMESTAMP: u64 = 1_700_000_000;

/// One day in seconds.
pub const DAY: u64 = 24 * 60 * 60;

/// Fresh in-memory database with the given members registered in order.
pub fn db_with_users(ids: &[&str]) -> Connection {
    let conn = quest_db::open_memory().expect("in-memory database");
    for (i, id) in ids.iter().enumerate() {
        users::register(&conn, id, &id.to_uppercase(), TEST_TIMESTAMP + i as u64)
            .expect("register user");
    }
    conn
}

/// Create an open task with a fixed XP.
pub fn create_task(conn: &Connection, owner: &str, title: &str, xp: i32, due_at: Option<u64>) -> Task {
    tasks::insert(
        conn,
        &tasks::NewTask {
            owner,
            title,
            description: None,
            due_at,
            xp_assigned: xp,
            factors: None,
            rationale: None,
        },
        TEST_TIMESTAMP,
    )
    .expect("create task")
}

/// A database file in the system temp directory, removed on drop.
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new(tag: &str) -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "quest-{tag}-{}-{nanos}.db",
            std::process::id()
        ));
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> Connection {
        quest_db::open(&self.path).expect("open file database")
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}
