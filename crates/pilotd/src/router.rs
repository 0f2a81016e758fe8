//! Maps a typed event and the stored task to an action.

use pilot_core::{EventType, Task, TaskId, TaskStatus, TypedEvent};
use tracing::{error, info, warn};

use crate::context::PilotContext;
use crate::error::PilotError;
use crate::executor::{run_execute_loop, ExecutionOutcome};
use crate::plan_phase::{report_plan_failure, run_plan_phase};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteAction {
    Plan,
    Replan,
    Execute,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    Dispatched {
        task_id: TaskId,
        action: RouteAction,
        /// Status after the action ran.
        status: TaskStatus,
    },
    Ignored { reason: String },
}

impl RouteOutcome {
    fn ignored(reason: impl Into<String>) -> Self {
        RouteOutcome::Ignored {
            reason: reason.into(),
        }
    }
}

/// Route one event. Failures inside the plan phase or execute loop are
/// handled here and reflected in the returned status. `Err` means the task
/// store could not be read or written.
///
/// The first status change an event causes also claims it in the
/// processed-event ledger. `Ignored` events are left for the caller to
/// record.
pub fn route(ctx: &PilotContext<'_>, event: &TypedEvent) -> Result<RouteOutcome, PilotError> {
    info!(
        kind = %event.kind,
        repo = %event.repo,
        issue = event.issue_number,
        comment_id = event.source_comment_id,
        "routing event"
    );

    let existing = ctx.service.find_by_issue(&event.repo, event.issue_number)?;
    match event.kind {
        EventType::Mention => on_mention(ctx, event, existing),
        EventType::Approve => on_approve(ctx, event, existing),
        EventType::Reject => on_reject(ctx, event, existing),
        EventType::Abort => on_abort(ctx, event, existing),
    }
}

fn on_mention(
    ctx: &PilotContext<'_>,
    event: &TypedEvent,
    existing: Option<Task>,
) -> Result<RouteOutcome, PilotError> {
    let (task, feedback) = match existing {
        Some(task) if task.status == TaskStatus::Rejected => (task, Some(event.body.as_str())),
        // Left behind when the move to PLANNING failed after the insert.
        Some(task) if task.status == TaskStatus::Idle => {
            info!(task_id = %task.id, "resuming idle task");
            (task, None)
        }
        Some(task) if task.status.is_active() => {
            info!(task_id = %task.id, status = %task.status, "task already in progress");
            return Ok(RouteOutcome::ignored(format!(
                "task {} already in progress ({})",
                task.id, task.status
            )));
        }
        _ => (ctx.service.create_task(&event.repo, event.issue_number)?, None),
    };

    claim(ctx, event, task.id, TaskStatus::Planning)?;
    plan(ctx, task.id, feedback, RouteAction::Plan)
}

fn on_approve(
    ctx: &PilotContext<'_>,
    event: &TypedEvent,
    existing: Option<Task>,
) -> Result<RouteOutcome, PilotError> {
    let Some(task) = existing else {
        warn!("approve without a task");
        return Ok(RouteOutcome::ignored("no task for issue"));
    };
    if !matches!(task.status, TaskStatus::PlanPending | TaskStatus::Failed) {
        warn!(
            task_id = %task.id,
            status = %task.status,
            "approve ignored, expected PLAN_PENDING or FAILED"
        );
        return Ok(RouteOutcome::ignored(format!(
            "approve not accepted in {}",
            task.status
        )));
    }

    if task.status == TaskStatus::Failed {
        ctx.service.reset_retry(task.id)?;
        info!(task_id = %task.id, "retrying failed task, retry count reset");
    }
    claim(ctx, event, task.id, TaskStatus::Executing)?;

    let status = match run_execute_loop(ctx, task.id)? {
        ExecutionOutcome::Completed {
            change_request_id, ..
        } => {
            info!(task_id = %task.id, change_request_id, "task completed");
            TaskStatus::Completed
        }
        ExecutionOutcome::Failed { error, .. } => {
            warn!(task_id = %task.id, error = %error, "task parked as failed");
            TaskStatus::Failed
        }
    };

    Ok(RouteOutcome::Dispatched {
        task_id: task.id,
        action: RouteAction::Execute,
        status,
    })
}

fn on_reject(
    ctx: &PilotContext<'_>,
    event: &TypedEvent,
    existing: Option<Task>,
) -> Result<RouteOutcome, PilotError> {
    let Some(task) = existing else {
        warn!("reject without a task");
        return Ok(RouteOutcome::ignored("no task for issue"));
    };
    if task.status != TaskStatus::PlanPending {
        warn!(
            task_id = %task.id,
            status = %task.status,
            "reject ignored, expected PLAN_PENDING"
        );
        return Ok(RouteOutcome::ignored(format!(
            "reject not accepted in {}",
            task.status
        )));
    }

    claim(ctx, event, task.id, TaskStatus::Rejected)?;
    ctx.service.transition(task.id, TaskStatus::Planning)?;
    plan(ctx, task.id, Some(event.body.as_str()), RouteAction::Replan)
}

fn on_abort(
    ctx: &PilotContext<'_>,
    event: &TypedEvent,
    existing: Option<Task>,
) -> Result<RouteOutcome, PilotError> {
    let Some(task) = existing else {
        return Ok(RouteOutcome::ignored("no task for issue"));
    };
    if task.status.is_terminal() {
        info!(task_id = %task.id, "abort on completed task");
        return Ok(RouteOutcome::ignored(format!("task {} already completed", task.id)));
    }

    let task = claim(ctx, event, task.id, TaskStatus::Completed)?;
    info!(task_id = %task.id, "task aborted");
    Ok(RouteOutcome::Dispatched {
        task_id: task.id,
        action: RouteAction::Abort,
        status: task.status,
    })
}

fn claim(
    ctx: &PilotContext<'_>,
    event: &TypedEvent,
    task_id: TaskId,
    to: TaskStatus,
) -> Result<Task, PilotError> {
    Ok(ctx
        .service
        .transition_for_event(task_id, to, &event.repo, event.source_comment_id)?)
}

fn plan(
    ctx: &PilotContext<'_>,
    task_id: TaskId,
    feedback: Option<&str>,
    action: RouteAction,
) -> Result<RouteOutcome, PilotError> {
    let status = match run_plan_phase(ctx, task_id, feedback) {
        Ok(task) => task.status,
        Err(err) => {
            error!(task_id = %task_id, error = %err, "plan phase failed");
            let task = ctx.service.require_task(task_id)?;
            report_plan_failure(ctx, &task, &err);
            task.status
        }
    };

    Ok(RouteOutcome::Dispatched {
        task_id,
        action,
        status,
    })
}
