use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyOutcome {
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NonZeroExit,
    SpawnFailed,
    TimedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandFailure {
    pub command: String,
    pub kind: FailureKind,
    pub exit_code: Option<i32>,
    /// stderr, falling back to stdout or the spawn error.
    pub output: String,
}

impl CommandFailure {
    pub fn describe(&self) -> String {
        match self.kind {
            FailureKind::TimedOut => {
                format!("Command `{}` timed out:\n{}", self.command, self.output)
            }
            FailureKind::SpawnFailed | FailureKind::NonZeroExit => {
                format!("Command `{}` failed:\n{}", self.command, self.output)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub commands_run: usize,
    pub failures: Vec<CommandFailure>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn outcome(&self) -> VerifyOutcome {
        if self.passed() {
            VerifyOutcome::Passed
        } else {
            VerifyOutcome::Failed
        }
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.failures.iter().map(CommandFailure::describe).collect()
    }

    /// All failures in one block, suitable for `last_error`.
    pub fn summary(&self) -> String {
        self.error_messages().join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(failures: Vec<CommandFailure>) -> VerificationReport {
        let now = Utc::now();
        VerificationReport {
            started_at: now,
            finished_at: now,
            commands_run: 2,
            failures,
        }
    }

    #[test]
    fn empty_failures_pass() {
        let report = report(Vec::new());
        assert!(report.passed());
        assert_eq!(report.outcome(), VerifyOutcome::Passed);
        assert!(report.summary().is_empty());
    }

    #[test]
    fn summary_joins_every_failure() {
        let report = report(vec![
            CommandFailure {
                command: "cargo test".to_string(),
                kind: FailureKind::NonZeroExit,
                exit_code: Some(101),
                output: "test foo ... FAILED".to_string(),
            },
            CommandFailure {
                command: "cargo clippy".to_string(),
                kind: FailureKind::TimedOut,
                exit_code: None,
                output: "no output".to_string(),
            },
        ]);

        assert_eq!(report.outcome(), VerifyOutcome::Failed);
        let summary = report.summary();
        assert!(summary.contains("Command `cargo test` failed:\ntest foo ... FAILED"));
        assert!(summary.contains("Command `cargo clippy` timed out"));
        assert_eq!(report.error_messages().len(), 2);
    }

    #[test]
    fn failure_kind_serializes_in_snake_case() {
        let json = serde_json::to_string(&FailureKind::NonZeroExit).expect("serialize");
        assert_eq!(json, "\"non_zero_exit\"");
    }
}
