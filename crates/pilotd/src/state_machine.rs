//! Task status transitions.

use chrono::{DateTime, Utc};
use pilot_core::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateMachineError {
    #[error("invalid task status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: TaskStatus,
    pub to: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Check if a status transition is legal.
///
/// ```text
/// IDLE ─► PLANNING ─► PLAN_PENDING ─► EXECUTING ─► VERIFYING ─► PR_CREATED
///            ▲             │              ▲           │  │
///            └─ REJECTED ◄─┘              └───────────┘  └─► FAILED ─► EXECUTING
/// ```
/// Every non-terminal status may also move to COMPLETED. Self transitions
/// are rejected.
pub fn is_transition_allowed(from: TaskStatus, to: TaskStatus) -> bool {
    from != to && from.allowed_targets().contains(&to)
}

/// Validate and apply a transition to an in-memory task.
///
/// `updated_at` never moves backwards.
pub fn transition_task(
    task: &mut Task,
    to: TaskStatus,
    at: DateTime<Utc>,
) -> Result<StateTransition, StateMachineError> {
    let from = task.status;
    if !is_transition_allowed(from, to) {
        return Err(StateMachineError::InvalidTransition { from, to });
    }

    task.status = to;
    task.updated_at = task.updated_at.max(at);

    Ok(StateTransition { from, to, at })
}
