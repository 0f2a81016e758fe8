use chrono::{DateTime, SecondsFormat, Utc};
use pilot_core::{Task, TaskId, TaskStatus};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

use crate::state_machine::{is_transition_allowed, StateMachineError, StateTransition};

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("sqlite error: {source}")]
    Sql {
        #[from]
        source: rusqlite::Error,
    },
    #[error("timestamp parse error for value '{value}': {source}")]
    TimestampParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("unknown task status tag '{value}'")]
    StatusParse { value: String },
    #[error("negative value {value} in column {column}")]
    NegativeValue { column: &'static str, value: i64 },
    #[error("value {value} does not fit column {column}")]
    ValueOutOfRange { column: &'static str, value: u64 },
    #[error("task not found: {task_id}")]
    TaskNotFound { task_id: TaskId },
    #[error(transparent)]
    Transition(#[from] StateMachineError),
    #[error("task {task_id} changed status concurrently (expected {expected})")]
    StaleStatus { task_id: TaskId, expected: TaskStatus },
}

const TASK_COLUMNS: &str = "id, repo, issue_number, status, plan_artifact_id, plan_text, \
    branch_name, change_request_id, retry_count, last_error, created_at, updated_at";

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    pub fn migrate(&self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    repo TEXT NOT NULL,
    issue_number INTEGER NOT NULL,
    status TEXT NOT NULL,
    plan_artifact_id INTEGER,
    plan_text TEXT,
    branch_name TEXT,
    change_request_id INTEGER,
    retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
    last_error TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_tasks_active_issue
    ON tasks(repo, issue_number) WHERE status != 'COMPLETED';
CREATE INDEX IF NOT EXISTS idx_tasks_repo_issue ON tasks(repo, issue_number, id);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);

CREATE TABLE IF NOT EXISTS task_transitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id INTEGER NOT NULL REFERENCES tasks(id),
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_transitions_task ON task_transitions(task_id, id);

CREATE TABLE IF NOT EXISTS poll_state (
    repo TEXT PRIMARY KEY,
    last_poll_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS processed_events (
    repo TEXT NOT NULL,
    event_id INTEGER NOT NULL,
    processed_at TEXT NOT NULL,
    PRIMARY KEY (repo, event_id)
);
"#,
        )?;
        Ok(())
    }

    // --- tasks ---

    /// Insert a new task in `IDLE`. Fails if the issue already has a non-completed task.
    pub fn insert_task(
        &self,
        repo: &str,
        issue_number: u64,
        at: DateTime<Utc>,
    ) -> Result<Task, PersistenceError> {
        let ts = format_ts(at);
        self.conn.execute(
            r#"
INSERT INTO tasks (repo, issue_number, status, retry_count, created_at, updated_at)
VALUES (?1, ?2, ?3, 0, ?4, ?4)
"#,
            params![repo, to_i64("issue_number", issue_number)?, TaskStatus::Idle.as_str(), ts],
        )?;
        let task_id = TaskId(self.conn.last_insert_rowid());
        self.require_task(task_id)
    }

    pub fn load_task(&self, task_id: TaskId) -> Result<Option<Task>, PersistenceError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![task_id.0], TaskRow::from_row)
            .optional()?;
        row.map(TaskRow::into_task).transpose()
    }

    pub fn require_task(&self, task_id: TaskId) -> Result<Task, PersistenceError> {
        self.load_task(task_id)?
            .ok_or(PersistenceError::TaskNotFound { task_id })
    }

    /// Most recent task for an issue, terminal or not.
    pub fn find_by_issue(&self, repo: &str, issue_number: u64) -> Result<Option<Task>, PersistenceError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE repo = ?1 AND issue_number = ?2 \
             ORDER BY id DESC LIMIT 1"
        );
        let row = self
            .conn
            .query_row(
                &sql,
                params![repo, to_i64("issue_number", issue_number)?],
                TaskRow::from_row,
            )
            .optional()?;
        row.map(TaskRow::into_task).transpose()
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC");
        self.query_tasks(&sql, [])
    }

    pub fn list_active_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE status != 'COMPLETED' ORDER BY updated_at DESC, id ASC"
        );
        self.query_tasks(&sql, [])
    }

    fn query_tasks<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Task>, PersistenceError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, TaskRow::from_row)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    /// Durable status change: re-read, validate, guarded update, history row.
    /// All or nothing.
    pub fn transition_task(
        &self,
        task_id: TaskId,
        to: TaskStatus,
        at: DateTime<Utc>,
    ) -> Result<StateTransition, PersistenceError> {
        self.transition_task_claiming(task_id, to, at, None)
    }

    /// Like `transition_task`, but also records `(repo, event_id)` in the
    /// processed-event ledger inside the same transaction. If the status
    /// write fails the event stays unclaimed.
    pub fn transition_task_claiming(
        &self,
        task_id: TaskId,
        to: TaskStatus,
        at: DateTime<Utc>,
        claim: Option<(&str, u64)>,
    ) -> Result<StateTransition, PersistenceError> {
        let tx = self.conn.unchecked_transaction()?;

        let stored: Option<String> = tx
            .query_row(
                "SELECT status FROM tasks WHERE id = ?1",
                params![task_id.0],
                |row| row.get(0),
            )
            .optional()?;
        let from = parse_status(stored.ok_or(PersistenceError::TaskNotFound { task_id })?)?;

        if !is_transition_allowed(from, to) {
            return Err(StateMachineError::InvalidTransition { from, to }.into());
        }

        let ts = format_ts(at);
        let changed = tx.execute(
            r#"
UPDATE tasks
SET status = ?1, updated_at = MAX(updated_at, ?2)
WHERE id = ?3 AND status = ?4
"#,
            params![to.as_str(), ts, task_id.0, from.as_str()],
        )?;
        if changed != 1 {
            return Err(PersistenceError::StaleStatus {
                task_id,
                expected: from,
            });
        }

        tx.execute(
            "INSERT INTO task_transitions (task_id, from_status, to_status, at) VALUES (?1, ?2, ?3, ?4)",
            params![task_id.0, from.as_str(), to.as_str(), ts],
        )?;
        if let Some((repo, event_id)) = claim {
            tx.execute(
                "INSERT OR IGNORE INTO processed_events (repo, event_id, processed_at) VALUES (?1, ?2, ?3)",
                params![repo, to_i64("event_id", event_id)?, ts],
            )?;
        }
        tx.commit()?;

        Ok(StateTransition { from, to, at })
    }

    pub fn list_transitions(&self, task_id: TaskId) -> Result<Vec<StateTransition>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT from_status, to_status, at FROM task_transitions WHERE task_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![task_id.0], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut transitions = Vec::new();
        for row in rows {
            let (from, to, at) = row?;
            transitions.push(StateTransition {
                from: parse_status(from)?,
                to: parse_status(to)?,
                at: parse_ts(at)?,
            });
        }
        Ok(transitions)
    }

    pub fn set_plan(
        &self,
        task_id: TaskId,
        plan_artifact_id: u64,
        plan_text: &str,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.update_task(
            task_id,
            "plan_artifact_id = ?1, plan_text = ?2",
            params![to_i64("plan_artifact_id", plan_artifact_id)?, plan_text],
            at,
        )
    }

    pub fn set_branch_name(&self, task_id: TaskId, branch: &str, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        self.update_task(task_id, "branch_name = ?1", params![branch], at)
    }

    pub fn set_change_request(
        &self,
        task_id: TaskId,
        change_request_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.update_task(
            task_id,
            "change_request_id = ?1",
            params![to_i64("change_request_id", change_request_id)?],
            at,
        )
    }

    pub fn set_retry_count(&self, task_id: TaskId, retry_count: u32, at: DateTime<Utc>) -> Result<(), PersistenceError> {
        self.update_task(task_id, "retry_count = ?1", params![i64::from(retry_count)], at)
    }

    pub fn set_last_error(
        &self,
        task_id: TaskId,
        last_error: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        self.update_task(task_id, "last_error = ?1", params![last_error], at)
    }

    /// Attribute write that never touches `status`. `assignments` uses
    /// placeholders `?1..?n`; the id and timestamp are appended after them.
    fn update_task(
        &self,
        task_id: TaskId,
        assignments: &str,
        values: &[&dyn rusqlite::ToSql],
        at: DateTime<Utc>,
    ) -> Result<(), PersistenceError> {
        let ts_index = values.len() + 1;
        let id_index = values.len() + 2;
        let sql = format!(
            "UPDATE tasks SET {assignments}, updated_at = MAX(updated_at, ?{ts_index}) WHERE id = ?{id_index}"
        );

        let ts = format_ts(at);
        let mut bound: Vec<&dyn rusqlite::ToSql> = values.to_vec();
        bound.push(&ts);
        bound.push(&task_id.0);

        let changed = self.conn.execute(&sql, bound.as_slice())?;
        if changed == 0 {
            return Err(PersistenceError::TaskNotFound { task_id });
        }
        Ok(())
    }

    // --- poll checkpoint ---

    pub fn checkpoint(&self, repo: &str) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT last_poll_at FROM poll_state WHERE repo = ?1",
                params![repo],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(parse_ts).transpose()
    }

    /// Move the checkpoint forward to `at`. Earlier values are ignored.
    pub fn advance_checkpoint(&self, repo: &str, at: DateTime<Utc>) -> Result<DateTime<Utc>, PersistenceError> {
        self.conn.execute(
            r#"
INSERT INTO poll_state (repo, last_poll_at) VALUES (?1, ?2)
ON CONFLICT(repo) DO UPDATE SET last_poll_at = MAX(last_poll_at, excluded.last_poll_at)
"#,
            params![repo, format_ts(at)],
        )?;
        self.checkpoint(repo)?
            .ok_or(PersistenceError::Sql {
                source: rusqlite::Error::QueryReturnedNoRows,
            })
    }

    /// Operator reset: set the checkpoint to exactly `to`, or clear it.
    pub fn reset_checkpoint(&self, repo: &str, to: Option<DateTime<Utc>>) -> Result<(), PersistenceError> {
        match to {
            Some(at) => {
                self.conn.execute(
                    r#"
INSERT INTO poll_state (repo, last_poll_at) VALUES (?1, ?2)
ON CONFLICT(repo) DO UPDATE SET last_poll_at = excluded.last_poll_at
"#,
                    params![repo, format_ts(at)],
                )?;
            }
            None => {
                self.conn
                    .execute("DELETE FROM poll_state WHERE repo = ?1", params![repo])?;
            }
        }
        Ok(())
    }

    // --- processed-event ledger ---

    pub fn is_event_processed(&self, repo: &str, event_id: u64) -> Result<bool, PersistenceError> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM processed_events WHERE repo = ?1 AND event_id = ?2",
                params![repo, to_i64("event_id", event_id)?],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Record an event id. Returns `false` if it was already recorded.
    pub fn mark_event_processed(
        &self,
        repo: &str,
        event_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, PersistenceError> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO processed_events (repo, event_id, processed_at) VALUES (?1, ?2, ?3)",
            params![repo, to_i64("event_id", event_id)?, format_ts(at)],
        )?;
        Ok(inserted == 1)
    }
}

#[cfg(test)]
impl SqliteStore {
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<(), PersistenceError> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }
}

struct TaskRow {
    id: i64,
    repo: String,
    issue_number: i64,
    status: String,
    plan_artifact_id: Option<i64>,
    plan_text: Option<String>,
    branch_name: Option<String>,
    change_request_id: Option<i64>,
    retry_count: i64,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            repo: row.get(1)?,
            issue_number: row.get(2)?,
            status: row.get(3)?,
            plan_artifact_id: row.get(4)?,
            plan_text: row.get(5)?,
            branch_name: row.get(6)?,
            change_request_id: row.get(7)?,
            retry_count: row.get(8)?,
            last_error: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }

    fn into_task(self) -> Result<Task, PersistenceError> {
        Ok(Task {
            id: TaskId(self.id),
            repo: self.repo,
            issue_number: to_u64("issue_number", self.issue_number)?,
            status: parse_status(self.status)?,
            plan_artifact_id: self
                .plan_artifact_id
                .map(|value| to_u64("plan_artifact_id", value))
                .transpose()?,
            plan_text: self.plan_text,
            branch_name: self.branch_name,
            change_request_id: self
                .change_request_id
                .map(|value| to_u64("change_request_id", value))
                .transpose()?,
            retry_count: u32::try_from(self.retry_count).map_err(|_| {
                PersistenceError::NegativeValue {
                    column: "retry_count",
                    value: self.retry_count,
                }
            })?,
            last_error: self.last_error,
            created_at: parse_ts(self.created_at)?,
            updated_at: parse_ts(self.updated_at)?,
        })
    }
}

/// Fixed-width UTC form, so SQL `MAX()` over the text orders chronologically.
fn format_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: String) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| PersistenceError::TimestampParse { value, source })
}

fn parse_status(value: String) -> Result<TaskStatus, PersistenceError> {
    value
        .parse::<TaskStatus>()
        .map_err(|_| PersistenceError::StatusParse { value })
}

fn to_i64(column: &'static str, value: u64) -> Result<i64, PersistenceError> {
    i64::try_from(value).map_err(|_| PersistenceError::ValueOutOfRange { column, value })
}

fn to_u64(column: &'static str, value: i64) -> Result<u64, PersistenceError> {
    u64::try_from(value).map_err(|_| PersistenceError::NegativeValue { column, value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn store() -> SqliteStore {
        let store = SqliteStore::open_in_memory().expect("open sqlite");
        store.migrate().expect("migrate");
        store
    }

    fn ts(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0)
            .single()
            .expect("valid timestamp")
    }

    #[test]
    fn migrate_is_idempotent() {
        let store = store();
        store.migrate().expect("second migrate");
    }

    #[test]
    fn insert_task_starts_idle_with_zero_retries() {
        let store = store();
        let task = store.insert_task("acme/widgets", 7, ts(0)).expect("insert");

        assert_eq!(task.status, TaskStatus::Idle);
        assert_eq!(task.retry_count, 0);
        assert_eq!(task.issue_number, 7);
        assert_eq!(task.created_at, ts(0));
        assert_eq!(task.updated_at, ts(0));
        assert!(task.plan_artifact_id.is_none());
    }

    #[test]
    fn second_active_task_for_same_issue_is_rejected() {
        let store = store();
        store.insert_task("acme/widgets", 7, ts(0)).expect("first insert");

        let err = store
            .insert_task("acme/widgets", 7, ts(1))
            .expect_err("duplicate active task");
        assert!(matches!(err, PersistenceError::Sql { .. }));

        store
            .insert_task("acme/gadgets", 7, ts(1))
            .expect("same issue number in another repo is fine");
    }

    #[test]
    fn completed_task_frees_the_issue_and_lookup_returns_latest() {
        let store = store();
        let first = store.insert_task("acme/widgets", 7, ts(0)).expect("insert");
        store
            .transition_task(first.id, TaskStatus::Completed, ts(1))
            .expect("abort");

        let second = store.insert_task("acme/widgets", 7, ts(2)).expect("reinsert");
        assert_ne!(first.id, second.id);

        let found = store
            .find_by_issue("acme/widgets", 7)
            .expect("lookup")
            .expect("task exists");
        assert_eq!(found.id, second.id);
        assert_eq!(found.status, TaskStatus::Idle);
        assert!(store.find_by_issue("acme/widgets", 8).expect("lookup").is_none());
    }

    #[test]
    fn transition_writes_status_and_history_together() {
        let store = store();
        let task = store.insert_task("acme/widgets", 1, ts(0)).expect("insert");

        store
            .transition_task(task.id, TaskStatus::Planning, ts(1))
            .expect("to planning");
        store
            .transition_task(task.id, TaskStatus::PlanPending, ts(2))
            .expect("to plan pending");

        let loaded = store.require_task(task.id).expect("load");
        assert_eq!(loaded.status, TaskStatus::PlanPending);
        assert_eq!(loaded.updated_at, ts(2));

        let history = store.list_transitions(task.id).expect("history");
        let pairs: Vec<_> = history.iter().map(|t| (t.from, t.to)).collect();
        assert_eq!(
            pairs,
            vec![
                (TaskStatus::Idle, TaskStatus::Planning),
                (TaskStatus::Planning, TaskStatus::PlanPending),
            ]
        );
    }

    #[test]
    fn illegal_transition_leaves_status_and_history_unchanged() {
        let store = store();
        let task = store.insert_task("acme/widgets", 1, ts(0)).expect("insert");

        let err = store
            .transition_task(task.id, TaskStatus::Executing, ts(1))
            .expect_err("IDLE -> EXECUTING is illegal");
        assert!(matches!(
            err,
            PersistenceError::Transition(StateMachineError::InvalidTransition {
                from: TaskStatus::Idle,
                to: TaskStatus::Executing,
            })
        ));

        let loaded = store.require_task(task.id).expect("load");
        assert_eq!(loaded.status, TaskStatus::Idle);
        assert_eq!(loaded.updated_at, ts(0));
        assert!(store.list_transitions(task.id).expect("history").is_empty());
    }

    #[test]
    fn transition_of_missing_task_is_not_found() {
        let store = store();
        let err = store
            .transition_task(TaskId(404), TaskStatus::Planning, ts(0))
            .expect_err("missing task");
        assert!(matches!(err, PersistenceError::TaskNotFound { task_id } if task_id == TaskId(404)));
    }

    #[test]
    fn updated_at_is_monotonic_across_writes() {
        let store = store();
        let task = store.insert_task("acme/widgets", 1, ts(10)).expect("insert");

        store
            .transition_task(task.id, TaskStatus::Planning, ts(5))
            .expect("transition with older clock");
        store
            .set_branch_name(task.id, "pilot/issue-1", ts(3))
            .expect("attribute with older clock");

        let loaded = store.require_task(task.id).expect("load");
        assert_eq!(loaded.updated_at, ts(10));
        assert_eq!(loaded.branch_name.as_deref(), Some("pilot/issue-1"));
    }

    #[test]
    fn attribute_setters_do_not_touch_status() {
        let store = store();
        let task = store.insert_task("acme/widgets", 3, ts(0)).expect("insert");

        store.set_plan(task.id, 9001, "1. do it", ts(1)).expect("plan");
        store.set_change_request(task.id, 42, ts(2)).expect("pr");
        store.set_retry_count(task.id, 2, ts(3)).expect("retries");
        store
            .set_last_error(task.id, Some("boom"), ts(4))
            .expect("error");

        let loaded = store.require_task(task.id).expect("load");
        assert_eq!(loaded.status, TaskStatus::Idle);
        assert_eq!(loaded.plan_artifact_id, Some(9001));
        assert_eq!(loaded.plan_text.as_deref(), Some("1. do it"));
        assert_eq!(loaded.change_request_id, Some(42));
        assert_eq!(loaded.retry_count, 2);
        assert_eq!(loaded.last_error.as_deref(), Some("boom"));

        store.set_last_error(task.id, None, ts(5)).expect("clear error");
        assert!(store.require_task(task.id).expect("load").last_error.is_none());
    }

    #[test]
    fn setter_on_missing_task_is_not_found() {
        let store = store();
        let err = store
            .set_branch_name(TaskId(99), "pilot/issue-99", ts(0))
            .expect_err("missing");
        assert!(matches!(err, PersistenceError::TaskNotFound { .. }));
    }

    #[test]
    fn list_active_tasks_skips_completed() {
        let store = store();
        let done = store.insert_task("acme/widgets", 1, ts(0)).expect("insert");
        store
            .transition_task(done.id, TaskStatus::Completed, ts(1))
            .expect("complete");
        let open = store.insert_task("acme/widgets", 2, ts(2)).expect("insert");

        let active = store.list_active_tasks().expect("active");
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open.id);
        assert_eq!(store.list_tasks().expect("all").len(), 2);
    }

    #[test]
    fn checkpoint_only_moves_forward() {
        let store = store();
        assert!(store.checkpoint("acme/widgets").expect("read").is_none());

        assert_eq!(
            store.advance_checkpoint("acme/widgets", ts(10)).expect("advance"),
            ts(10)
        );
        assert_eq!(
            store.advance_checkpoint("acme/widgets", ts(5)).expect("stale advance"),
            ts(10)
        );
        assert_eq!(
            store.advance_checkpoint("acme/widgets", ts(12)).expect("advance"),
            ts(12)
        );
        assert!(store.checkpoint("acme/gadgets").expect("other repo").is_none());
    }

    #[test]
    fn reset_checkpoint_can_rewind_or_clear() {
        let store = store();
        store.advance_checkpoint("acme/widgets", ts(30)).expect("advance");

        store
            .reset_checkpoint("acme/widgets", Some(ts(1)))
            .expect("rewind");
        assert_eq!(store.checkpoint("acme/widgets").expect("read"), Some(ts(1)));

        store.reset_checkpoint("acme/widgets", None).expect("clear");
        assert!(store.checkpoint("acme/widgets").expect("read").is_none());
    }

    #[test]
    fn sub_second_checkpoints_compare_correctly() {
        let store = store();
        let base = ts(0);
        store
            .advance_checkpoint("acme/widgets", base + Duration::milliseconds(900))
            .expect("advance");
        let after = store
            .advance_checkpoint("acme/widgets", base + Duration::milliseconds(100))
            .expect("stale advance");
        assert_eq!(after, base + Duration::milliseconds(900));
    }

    #[test]
    fn ledger_records_each_event_once_per_repo() {
        let store = store();
        assert!(!store.is_event_processed("acme/widgets", 5).expect("check"));

        assert!(store
            .mark_event_processed("acme/widgets", 5, ts(0))
            .expect("first mark"));
        assert!(!store
            .mark_event_processed("acme/widgets", 5, ts(1))
            .expect("second mark"));
        assert!(store.is_event_processed("acme/widgets", 5).expect("check"));
        assert!(!store.is_event_processed("acme/gadgets", 5).expect("other repo"));
    }

    #[test]
    fn claiming_transition_records_event_with_status() {
        let store = store();
        let task = store.insert_task("acme/widgets", 3, ts(0)).expect("insert");

        store
            .transition_task_claiming(task.id, TaskStatus::Planning, ts(1), Some(("acme/widgets", 41)))
            .expect("transition");
        assert!(store.is_event_processed("acme/widgets", 41).expect("check"));
        assert_eq!(store.list_transitions(task.id).expect("history").len(), 1);
    }

    #[test]
    fn failed_status_write_leaves_event_unclaimed() {
        let store = store();
        let task = store.insert_task("acme/widgets", 3, ts(0)).expect("insert");
        store
            .execute_batch(
                "CREATE TRIGGER block_status BEFORE UPDATE OF status ON tasks \
                 BEGIN SELECT RAISE(FAIL, 'status writes blocked'); END;",
            )
            .expect("install trigger");

        let err = store
            .transition_task_claiming(task.id, TaskStatus::Planning, ts(1), Some(("acme/widgets", 41)))
            .expect_err("blocked write");
        assert!(matches!(err, PersistenceError::Sql { .. }));
        assert!(!store.is_event_processed("acme/widgets", 41).expect("check"));
        assert_eq!(store.require_task(task.id).expect("load").status, TaskStatus::Idle);
        assert!(store.list_transitions(task.id).expect("history").is_empty());

        // An illegal edge is rejected before anything is written.
        store.execute_batch("DROP TRIGGER block_status;").expect("drop trigger");
        store
            .transition_task_claiming(task.id, TaskStatus::Executing, ts(2), Some(("acme/widgets", 42)))
            .expect_err("illegal edge");
        assert!(!store.is_event_processed("acme/widgets", 42).expect("check"));
    }

    #[test]
    fn file_backed_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("state.sqlite");

        let task_id = {
            let store = SqliteStore::open(&path).expect("open");
            store.migrate().expect("migrate");
            store.advance_checkpoint("acme/widgets", ts(7)).expect("advance");
            store.insert_task("acme/widgets", 11, ts(0)).expect("insert").id
        };

        let reopened = SqliteStore::open(&path).expect("reopen");
        reopened.migrate().expect("migrate again");
        assert_eq!(reopened.checkpoint("acme/widgets").expect("read"), Some(ts(7)));
        assert_eq!(reopened.require_task(task_id).expect("load").issue_number, 11);
    }
}
