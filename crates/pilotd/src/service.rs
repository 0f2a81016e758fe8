//! Task, checkpoint and ledger operations over the SQLite store.

use chrono::{DateTime, Utc};
use pilot_core::{Task, TaskId, TaskStatus};
use std::path::Path;
use tracing::info;

use crate::persistence::{PersistenceError, SqliteStore};
use crate::state_machine::StateTransition;

pub struct TaskService {
    pub store: SqliteStore,
}

impl TaskService {
    pub fn new(store: SqliteStore) -> Self {
        Self { store }
    }

    pub fn open(sqlite_path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let svc = Self::new(SqliteStore::open(sqlite_path)?);
        svc.bootstrap()?;
        Ok(svc)
    }

    pub fn open_in_memory() -> Result<Self, PersistenceError> {
        let svc = Self::new(SqliteStore::open_in_memory()?);
        svc.bootstrap()?;
        Ok(svc)
    }

    pub fn bootstrap(&self) -> Result<(), PersistenceError> {
        self.store.migrate()
    }

    // --- Task CRUD ---

    pub fn create_task(&self, repo: &str, issue_number: u64) -> Result<Task, PersistenceError> {
        let task = self.store.insert_task(repo, issue_number, Utc::now())?;
        info!(task_id = %task.id, repo, issue = issue_number, "created task");
        Ok(task)
    }

    pub fn task(&self, task_id: TaskId) -> Result<Option<Task>, PersistenceError> {
        self.store.load_task(task_id)
    }

    pub fn require_task(&self, task_id: TaskId) -> Result<Task, PersistenceError> {
        self.store.require_task(task_id)
    }

    pub fn find_by_issue(&self, repo: &str, issue_number: u64) -> Result<Option<Task>, PersistenceError> {
        self.store.find_by_issue(repo, issue_number)
    }

    pub fn list_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        self.store.list_tasks()
    }

    pub fn list_active_tasks(&self) -> Result<Vec<Task>, PersistenceError> {
        self.store.list_active_tasks()
    }

    pub fn transitions(&self, task_id: TaskId) -> Result<Vec<StateTransition>, PersistenceError> {
        self.store.list_transitions(task_id)
    }

    // --- State Transitions ---

    /// Apply one validated transition and return the reloaded task.
    pub fn transition(&self, task_id: TaskId, to: TaskStatus) -> Result<Task, PersistenceError> {
        let transition = self.store.transition_task(task_id, to, Utc::now())?;
        info!(
            task_id = %task_id,
            from = %transition.from,
            to = %transition.to,
            "task status changed"
        );
        self.store.require_task(task_id)
    }

    /// Transition and claim the event that caused it in one write, so a
    /// failed transition leaves the event to be redelivered.
    pub fn transition_for_event(
        &self,
        task_id: TaskId,
        to: TaskStatus,
        repo: &str,
        event_id: u64,
    ) -> Result<Task, PersistenceError> {
        let transition =
            self.store
                .transition_task_claiming(task_id, to, Utc::now(), Some((repo, event_id)))?;
        info!(
            task_id = %task_id,
            from = %transition.from,
            to = %transition.to,
            event_id,
            "task status changed"
        );
        self.store.require_task(task_id)
    }

    // --- Attributes ---

    pub fn record_plan(&self, task_id: TaskId, artifact_id: u64, plan_text: &str) -> Result<(), PersistenceError> {
        self.store.set_plan(task_id, artifact_id, plan_text, Utc::now())
    }

    pub fn record_branch(&self, task_id: TaskId, branch: &str) -> Result<(), PersistenceError> {
        self.store.set_branch_name(task_id, branch, Utc::now())
    }

    pub fn record_change_request(&self, task_id: TaskId, number: u64) -> Result<(), PersistenceError> {
        self.store.set_change_request(task_id, number, Utc::now())
    }

    /// Returns the new retry count.
    pub fn increment_retry(&self, task_id: TaskId) -> Result<u32, PersistenceError> {
        let task = self.store.require_task(task_id)?;
        let next = task.retry_count.saturating_add(1);
        self.store.set_retry_count(task_id, next, Utc::now())?;
        Ok(next)
    }

    pub fn reset_retry(&self, task_id: TaskId) -> Result<(), PersistenceError> {
        self.store.set_retry_count(task_id, 0, Utc::now())
    }

    pub fn record_error(&self, task_id: TaskId, message: &str) -> Result<(), PersistenceError> {
        self.store.set_last_error(task_id, Some(message), Utc::now())
    }

    pub fn clear_error(&self, task_id: TaskId) -> Result<(), PersistenceError> {
        self.store.set_last_error(task_id, None, Utc::now())
    }

    // --- Checkpoint and ledger ---

    pub fn checkpoint(&self, repo: &str) -> Result<Option<DateTime<Utc>>, PersistenceError> {
        self.store.checkpoint(repo)
    }

    pub fn advance_checkpoint(&self, repo: &str, at: DateTime<Utc>) -> Result<DateTime<Utc>, PersistenceError> {
        self.store.advance_checkpoint(repo, at)
    }

    pub fn reset_checkpoint(&self, repo: &str, to: Option<DateTime<Utc>>) -> Result<(), PersistenceError> {
        self.store.reset_checkpoint(repo, to)?;
        info!(repo, to = ?to, "poll checkpoint reset");
        Ok(())
    }

    pub fn is_event_processed(&self, repo: &str, event_id: u64) -> Result<bool, PersistenceError> {
        self.store.is_event_processed(repo, event_id)
    }

    /// Returns `false` when the event was already in the ledger.
    pub fn mark_event_processed(&self, repo: &str, event_id: u64) -> Result<bool, PersistenceError> {
        self.store.mark_event_processed(repo, event_id, Utc::now())
    }
}
