//! Bodies of the comments the daemon posts back to the issue. All are signed
//! so the trigger parser ignores them on the next poll.

use pilot_core::{sign_comment, TriggerConfig};

pub fn format_plan_comment(plan: &str, triggers: &TriggerConfig) -> String {
    let body = format!(
        "## Implementation Plan\n\n{}\n\n> Reply `{}` to start implementation, `{} [feedback]` to request changes, or `{}` to cancel.",
        plan.trim(),
        triggers.approve,
        triggers.reject,
        triggers.abort,
    );
    sign_comment(&body)
}

pub fn format_plan_failure_comment(error: &str, triggers: &TriggerConfig) -> String {
    let body = format!(
        "## Planning failed\n\n```\n{}\n```\n\n> Reply `{}` to cancel this task.",
        error.trim(),
        triggers.abort,
    );
    sign_comment(&body)
}

pub fn format_success_comment(change_request_id: u64, branch: &str, attempts: u32) -> String {
    let body = format!(
        "## Pull request opened\n\nVerification passed after {attempts} attempt(s). \
         Opened #{change_request_id} from `{branch}`."
    );
    sign_comment(&body)
}

pub fn format_failure_comment(error: &str, triggers: &TriggerConfig) -> String {
    let body = format!(
        "## Implementation failed\n\n```\n{}\n```\n\n> Reply `{}` to try again or `{}` to cancel.",
        error.trim(),
        triggers.approve,
        triggers.abort,
    );
    sign_comment(&body)
}

pub fn change_request_title(issue_number: u64, issue_title: &str) -> String {
    format!("Resolve #{issue_number}: {}", issue_title.trim())
}

pub fn change_request_body(issue_number: u64, plan: Option<&str>) -> String {
    match plan {
        Some(plan) if !plan.trim().is_empty() => {
            format!("Closes #{issue_number}\n\n## Plan\n\n{}", plan.trim())
        }
        _ => format!("Closes #{issue_number}"),
    }
}
