//! Execute, verify and retry until a pull request opens or the retry
//! ceiling is reached.

use std::path::Path;

use pilot_agents::{build_analyze_prompt, build_fix_prompt, build_generate_prompt};
use pilot_core::{IssueSummary, Task, TaskId, TaskStatus};
use pilot_git::{branch_name_for_issue, commit_message_for_issue, workspace_path_for_issue};
use tracing::{debug, error, info, warn};

use crate::comments::{
    change_request_body, change_request_title, format_failure_comment, format_success_comment,
};
use crate::context::PilotContext;
use crate::error::PilotError;
use crate::retry::evaluate_retry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed { change_request_id: u64, attempts: u32 },
    /// Task is parked in `FAILED` waiting for approve or abort.
    Failed { attempts: u32, error: PilotError },
}

/// Drive a task from `EXECUTING` to `COMPLETED` or `FAILED`.
///
/// Adapter failures are fatal for the run: the task lands in `FAILED` and
/// the issue gets a comment. `Err` is returned only when the task record
/// itself could not be updated.
pub fn run_execute_loop(ctx: &PilotContext<'_>, task_id: TaskId) -> Result<ExecutionOutcome, PilotError> {
    let task = ctx.service.require_task(task_id)?;
    if task.status != TaskStatus::Executing {
        return Err(PilotError::InvalidTransition {
            from: task.status,
            to: TaskStatus::Verifying,
        });
    }

    let mut attempts = 0;
    match execute_attempts(ctx, &task, &mut attempts) {
        Ok(outcome) => Ok(outcome),
        Err(Step::Fatal(err)) => {
            error!(task_id = %task_id, error = %err, "execute loop failed");
            fail_task(ctx, task_id, &err)?;
            Ok(ExecutionOutcome::Failed { attempts, error: err })
        }
        Err(Step::Store(err)) => Err(err),
    }
}

/// Separates adapter failures, which park the task, from store failures,
/// which abort the run.
enum Step {
    Fatal(PilotError),
    Store(PilotError),
}

fn fatal(err: impl Into<PilotError>) -> Step {
    Step::Fatal(err.into())
}

fn store(err: impl Into<PilotError>) -> Step {
    Step::Store(err.into())
}

fn execute_attempts(ctx: &PilotContext<'_>, task: &Task, attempts: &mut u32) -> Result<ExecutionOutcome, Step> {
    let issue_number = task.issue_number;
    let issue = ctx.tracker.get_issue(issue_number).map_err(fatal)?;

    let branch = branch_name_for_issue(issue_number);
    let workdir = workspace_path_for_issue(&ctx.repo.local_path, &ctx.repo.worktree_root, issue_number);
    ctx.workspace
        .create_isolated_workspace(&workdir, &branch, &ctx.repo.base_branch)
        .map_err(fatal)?;
    ctx.service.record_branch(task.id, &branch).map_err(store)?;
    info!(task_id = %task.id, branch = %branch, workdir = %workdir.display(), "workspace ready");

    let mut retries = task.retry_count;
    let mut fix_instructions: Option<String> = None;

    loop {
        *attempts += 1;
        let prompt = match fix_instructions.as_deref() {
            None => build_generate_prompt(issue_number, &issue, task.plan_text.as_deref()),
            Some(fix) => build_fix_prompt(fix),
        };

        info!(task_id = %task.id, attempt = *attempts, "generating code");
        ctx.ai.generate(&prompt, &workdir).map_err(fatal)?;
        let committed = ctx
            .workspace
            .commit_all(&workdir, &commit_message_for_issue(issue_number))
            .map_err(fatal)?;
        if !committed {
            debug!(task_id = %task.id, "nothing to commit");
        }

        ctx.service
            .transition(task.id, TaskStatus::Verifying)
            .map_err(store)?;
        let report = ctx
            .verifier
            .verify(&workdir, &ctx.repo.verify_commands)
            .map_err(fatal)?;

        if report.passed() {
            info!(task_id = %task.id, attempt = *attempts, "verification passed");
            return open_change_request(ctx, task, &issue, &branch, &workdir, *attempts);
        }

        let failure = PilotError::VerificationFailure {
            summary: report.summary(),
        };
        warn!(
            task_id = %task.id,
            attempt = *attempts,
            failures = report.failures.len(),
            "verification failed"
        );

        let decision = evaluate_retry(retries, ctx.max_retries);
        if !decision.should_retry {
            info!(task_id = %task.id, reason = %decision.reason, "giving up");
            let err = failure.exhausted(*attempts);
            park_failed(ctx, task.id, issue_number, &err).map_err(store)?;
            return Ok(ExecutionOutcome::Failed {
                attempts: *attempts,
                error: err,
            });
        }

        info!(task_id = %task.id, reason = %decision.reason, "retrying");
        retries = ctx.service.increment_retry(task.id).map_err(store)?;
        ctx.service
            .record_error(task.id, &failure.to_string())
            .map_err(store)?;
        ctx.service
            .transition(task.id, TaskStatus::Executing)
            .map_err(store)?;

        let analyze_prompt = build_analyze_prompt(issue_number, &issue, &report.error_messages());
        fix_instructions = Some(ctx.ai.analyze(&analyze_prompt).map_err(fatal)?);
    }
}

fn open_change_request(
    ctx: &PilotContext<'_>,
    task: &Task,
    issue: &IssueSummary,
    branch: &str,
    workdir: &Path,
    attempts: u32,
) -> Result<ExecutionOutcome, Step> {
    ctx.workspace.push(workdir, branch).map_err(fatal)?;
    let change_request_id = ctx
        .tracker
        .open_change_request(
            branch,
            &ctx.repo.base_branch,
            &change_request_title(task.issue_number, &issue.title),
            &change_request_body(task.issue_number, task.plan_text.as_deref()),
        )
        .map_err(fatal)?;

    ctx.service
        .record_change_request(task.id, change_request_id)
        .map_err(store)?;
    ctx.service
        .transition(task.id, TaskStatus::PrCreated)
        .map_err(store)?;
    ctx.service
        .transition(task.id, TaskStatus::Completed)
        .map_err(store)?;
    ctx.service.clear_error(task.id).map_err(store)?;
    info!(task_id = %task.id, change_request_id, "pull request opened");

    let body = format_success_comment(change_request_id, branch, attempts);
    if let Err(err) = ctx.tracker.post_comment(task.issue_number, &body) {
        warn!(task_id = %task.id, error = %err, "failed to post success comment");
    }
    if let Err(err) = ctx.workspace.remove_workspace(workdir) {
        warn!(task_id = %task.id, error = %err, "failed to remove workspace");
    }

    Ok(ExecutionOutcome::Completed {
        change_request_id,
        attempts,
    })
}

/// Move a task to `FAILED` from wherever the loop stopped. `EXECUTING` has
/// no direct edge to `FAILED`, so it passes through `VERIFYING`.
pub fn fail_task(ctx: &PilotContext<'_>, task_id: TaskId, err: &PilotError) -> Result<(), PilotError> {
    let task = ctx.service.require_task(task_id)?;
    if task.status == TaskStatus::Executing {
        ctx.service.transition(task_id, TaskStatus::Verifying)?;
    }
    park_failed(ctx, task_id, task.issue_number, err)
}

fn park_failed(
    ctx: &PilotContext<'_>,
    task_id: TaskId,
    issue_number: u64,
    err: &PilotError,
) -> Result<(), PilotError> {
    let message = err.to_string();
    ctx.service.record_error(task_id, &message)?;
    ctx.service.transition(task_id, TaskStatus::Failed)?;

    let body = format_failure_comment(&message, ctx.triggers);
    if let Err(post_err) = ctx.tracker.post_comment(issue_number, &body) {
        warn!(task_id = %task_id, error = %post_err, "failed to post failure comment");
    }
    Ok(())
}
