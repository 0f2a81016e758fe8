//! Task lifecycle states.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Created, nothing has run yet
    Idle,
    /// AI planning in flight
    Planning,
    /// Plan posted, waiting for a human verdict
    PlanPending,
    /// Code generation in flight
    Executing,
    /// Verification commands running
    Verifying,
    /// Pull request opened
    PrCreated,
    /// Done or aborted
    Completed,
    /// Plan rejected, about to re-plan
    Rejected,
    /// Retries exhausted or a fatal step failed; waiting for a human
    Failed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 9] = [
        TaskStatus::Idle,
        TaskStatus::Planning,
        TaskStatus::PlanPending,
        TaskStatus::Executing,
        TaskStatus::Verifying,
        TaskStatus::PrCreated,
        TaskStatus::Completed,
        TaskStatus::Rejected,
        TaskStatus::Failed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Idle => "IDLE",
            TaskStatus::Planning => "PLANNING",
            TaskStatus::PlanPending => "PLAN_PENDING",
            TaskStatus::Executing => "EXECUTING",
            TaskStatus::Verifying => "VERIFYING",
            TaskStatus::PrCreated => "PR_CREATED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Rejected => "REJECTED",
            TaskStatus::Failed => "FAILED",
        }
    }

    /// Returns true if the task can never move again.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed)
    }

    /// Returns true while the task still occupies its issue.
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if the task is parked waiting for a human comment.
    pub fn awaits_human(self) -> bool {
        matches!(self, TaskStatus::PlanPending | TaskStatus::Failed)
    }

    /// Legal successor states.
    ///
    /// `Completed` is reachable from every non-terminal state so an abort can
    /// always land.
    pub fn allowed_targets(self) -> &'static [TaskStatus] {
        use TaskStatus::*;

        match self {
            Idle => &[Planning, Completed],
            Planning => &[PlanPending, Completed],
            PlanPending => &[Executing, Rejected, Completed],
            Executing => &[Verifying, Completed],
            Verifying => &[Executing, PrCreated, Failed, Completed],
            PrCreated => &[Completed],
            Rejected => &[Planning, Completed],
            Failed => &[Executing, Completed],
            Completed => &[],
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == value.trim())
            .ok_or_else(|| format!("invalid task status '{value}'"))
    }
}
