//! Prompt builders for each agent invocation.

use pilot_core::IssueSummary;

const NO_DESCRIPTION: &str = "(no description provided)";

fn push_issue(lines: &mut Vec<String>, issue: &IssueSummary) {
    lines.push("## Issue".to_string());
    lines.push(format!("**Title:** {}", issue.title));
    lines.push(String::new());
    lines.push("**Description:**".to_string());
    if issue.body.trim().is_empty() {
        lines.push(NO_DESCRIPTION.to_string());
    } else {
        lines.push(issue.body.trim().to_string());
    }
}

/// Read-only planning prompt. `rejection_feedback` is the body of the comment
/// that rejected the previous plan.
pub fn build_plan_prompt(issue: &IssueSummary, rejection_feedback: Option<&str>) -> String {
    let mut lines = vec![
        "You are a senior software engineer reviewing a GitHub issue.".to_string(),
        "Analyze the codebase and produce a concrete implementation plan.".to_string(),
        String::new(),
    ];
    push_issue(&mut lines, issue);

    if let Some(feedback) = rejection_feedback.filter(|text| !text.trim().is_empty()) {
        lines.push(String::new());
        lines.push("## Previous Plan Was Rejected".to_string());
        lines.push(
            "The previous implementation plan was rejected. Address the following feedback:"
                .to_string(),
        );
        lines.push(String::new());
        lines.push(feedback.trim().to_string());
    }

    lines.extend(
        [
            "",
            "## Instructions",
            "- Read the project's CLAUDE.md (and any docs it references) for conventions and constraints.",
            "- Explore the code relevant to this issue before forming a plan.",
            "- The plan must include:",
            "  1. **Files to modify**, each with a brief reason",
            "  2. **Approach**, step by step",
            "  3. **Potential risks**: edge cases, breaking changes, areas needing care",
            "- Be specific. A human reviews the plan before implementation starts.",
            "- Do NOT write code or modify files; this is a read-only planning step.",
        ]
        .into_iter()
        .map(str::to_string),
    );

    lines.join("\n")
}

/// First execute attempt: implement the approved plan.
pub fn build_generate_prompt(issue_number: u64, issue: &IssueSummary, plan: Option<&str>) -> String {
    let mut lines = vec![
        format!("Implement the change requested in issue #{issue_number}."),
        String::new(),
    ];
    push_issue(&mut lines, issue);

    lines.push(String::new());
    lines.push("## Approved Plan".to_string());
    match plan.filter(|text| !text.trim().is_empty()) {
        Some(plan) => lines.push(plan.trim().to_string()),
        None => lines.push("(no plan recorded; infer the change from the issue)".to_string()),
    }

    lines.extend(
        [
            "",
            "## Instructions",
            "- Follow the approved plan. Do not add unrelated modifications.",
            "- Follow the conventions in CLAUDE.md and the surrounding code.",
            "- Leave changes in the working tree. Do not commit, push, or switch branches.",
        ]
        .into_iter()
        .map(str::to_string),
    );

    lines.join("\n")
}

/// Retry attempt: apply fix instructions produced by analysis.
pub fn build_fix_prompt(fix_instructions: &str) -> String {
    [
        "Apply the following fix instructions to the codebase.",
        "Make only the changes described. Do not add unrelated modifications.",
        "Leave changes in the working tree. Do not commit, push, or switch branches.",
        "",
        "## Fix Instructions",
        fix_instructions.trim(),
    ]
    .join("\n")
}

/// Analysis of verification failures into fix instructions.
pub fn build_analyze_prompt(issue_number: u64, issue: &IssueSummary, failures: &[String]) -> String {
    let mut lines = vec![
        "You are analyzing build/test errors to provide fix instructions.".to_string(),
        String::new(),
        "## Issue Context".to_string(),
        format!("#{issue_number}: {}", issue.title),
        String::new(),
        "## Errors".to_string(),
    ];

    for (index, failure) in failures.iter().enumerate() {
        lines.push(format!("### Error {}", index + 1));
        lines.push(failure.trim_end().to_string());
    }

    lines.extend(
        [
            "",
            "## Instructions",
            "Analyze the errors above and give specific, actionable fix instructions.",
            "Focus on the root cause and the exact code changes needed.",
            "Be concise; the output is passed directly to a code generation model.",
        ]
        .into_iter()
        .map(str::to_string),
    );

    lines.join("\n")
}
