//! Plan phase: ask the AI for a read-only plan and post it for review.

use pilot_agents::build_plan_prompt;
use pilot_core::{Task, TaskId, TaskStatus};
use tracing::{info, warn};

use crate::comments::{format_plan_comment, format_plan_failure_comment};
use crate::context::PilotContext;
use crate::error::PilotError;

/// Task must be in `PLANNING`. On success it ends in `PLAN_PENDING` with the
/// plan comment id and text recorded.
pub fn run_plan_phase(
    ctx: &PilotContext<'_>,
    task_id: TaskId,
    feedback: Option<&str>,
) -> Result<Task, PilotError> {
    let task = ctx.service.require_task(task_id)?;
    if task.status != TaskStatus::Planning {
        return Err(PilotError::InvalidTransition {
            from: task.status,
            to: TaskStatus::PlanPending,
        });
    }

    let issue = ctx.tracker.get_issue(task.issue_number)?;
    let prompt = build_plan_prompt(&issue, feedback);

    info!(
        task_id = %task_id,
        issue = task.issue_number,
        replan = feedback.is_some(),
        "running plan"
    );
    let plan = ctx.ai.plan(&prompt, &ctx.repo.local_path)?;
    let plan = plan.trim();

    let artifact_id = ctx
        .tracker
        .post_comment(task.issue_number, &format_plan_comment(plan, ctx.triggers))?;
    ctx.service.record_plan(task_id, artifact_id, plan)?;

    let task = ctx.service.transition(task_id, TaskStatus::PlanPending)?;
    info!(task_id = %task_id, artifact_id, "plan posted");
    Ok(task)
}

/// Record a plan failure and tell the issue. The task keeps its status.
pub fn report_plan_failure(ctx: &PilotContext<'_>, task: &Task, err: &PilotError) {
    let message = err.to_string();
    if let Err(record_err) = ctx.service.record_error(task.id, &message) {
        warn!(task_id = %task.id, error = %record_err, "failed to record plan error");
    }

    let body = format_plan_failure_comment(&message, ctx.triggers);
    if let Err(post_err) = ctx.tracker.post_comment(task.issue_number, &body) {
        warn!(task_id = %task.id, error = %post_err, "failed to post plan failure comment");
    }
}
