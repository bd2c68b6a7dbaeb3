//! SQL schema definitions.

/// Complete schema for Quest v1 database.
pub const SCHEMA_V1: &str = r#"
-- ============================================================
-- Members
-- ============================================================

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- ============================================================
-- Tasks
-- ============================================================

CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner TEXT NOT NULL REFERENCES users(id),
    title TEXT NOT NULL,
    description TEXT,
    due_at INTEGER,
    xp_assigned INTEGER NOT NULL,
    factors TEXT,
    rationale TEXT,
    status TEXT NOT NULL DEFAULT 'open'
        CHECK (status IN ('open', 'completed', 'missed')),
    created_at INTEGER NOT NULL,
    completed_at INTEGER
);

CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner, status);
CREATE INDEX IF NOT EXISTS idx_tasks_open_due ON tasks(due_at) WHERE status = 'open';

-- XP is a contract made at assignment time.
CREATE TRIGGER IF NOT EXISTS tasks_xp_immutable
BEFORE UPDATE OF xp_assigned ON tasks
WHEN NEW.xp_assigned IS NOT OLD.xp_assigned
BEGIN
    SELECT RAISE(ABORT, 'tasks.xp_assigned is immutable');
END;

-- completed and missed are terminal.
CREATE TRIGGER IF NOT EXISTS tasks_status_terminal
BEFORE UPDATE OF status ON tasks
WHEN OLD.status <> 'open'
BEGIN
    SELECT RAISE(ABORT, 'task status is terminal');
END;

CREATE TRIGGER IF NOT EXISTS tasks_no_delete
BEFORE DELETE ON tasks
BEGIN
    SELECT RAISE(ABORT, 'tasks cannot be deleted');
END;

-- ============================================================
-- XP ledger (append-only, sole source of truth for balances)
-- ============================================================

CREATE TABLE IF NOT EXISTS xp_ledger (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL REFERENCES users(id),
    task_id INTEGER REFERENCES tasks(id),
    delta INTEGER NOT NULL,
    reason TEXT NOT NULL CHECK (reason IN ('completion', 'missed_penalty')),
    proof_refs TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);

-- At most one completion and one penalty per task.
CREATE UNIQUE INDEX IF NOT EXISTS ux_ledger_task_reason
    ON xp_ledger(task_id, reason) WHERE task_id IS NOT NULL;
CREATE INDEX IF NOT EXISTS idx_ledger_user ON xp_ledger(user_id, id);
CREATE INDEX IF NOT EXISTS idx_ledger_feed ON xp_ledger(reason, created_at, id);

CREATE TRIGGER IF NOT EXISTS xp_ledger_no_update
BEFORE UPDATE ON xp_ledger
BEGIN
    SELECT RAISE(ABORT, 'xp_ledger is append-only');
END;

CREATE TRIGGER IF NOT EXISTS xp_ledger_no_delete
BEFORE DELETE ON xp_ledger
BEGIN
    SELECT RAISE(ABORT, 'xp_ledger is append-only');
END;

-- ============================================================
-- Reactions
-- ============================================================

CREATE TABLE IF NOT EXISTS reaction_votes (
    entry_id INTEGER NOT NULL REFERENCES xp_ledger(id),
    voter TEXT NOT NULL REFERENCES users(id),
    value INTEGER NOT NULL CHECK (value IN (-1, 1)),
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (entry_id, voter)
);

-- ============================================================
-- Settings & Misc
-- ============================================================

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
