//! Runs configured verification commands inside a workspace.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use chrono::Utc;
use pilot_core::{run_with_timeout, ProcessError};
use tracing::{debug, info, warn};

use crate::error::VerifyError;
use crate::types::{CommandFailure, FailureKind, VerificationReport};

pub trait Verifier {
    /// Run every command in order and report all failures.
    fn verify(&self, workdir: &Path, commands: &[String]) -> Result<VerificationReport, VerifyError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellVerifier {
    pub shell_bin: String,
    pub command_timeout: Duration,
}

impl ShellVerifier {
    pub fn new(command_timeout: Duration) -> Self {
        Self {
            shell_bin: "bash".to_string(),
            command_timeout,
        }
    }

    fn run_one(&self, workdir: &Path, command: &str) -> Option<CommandFailure> {
        let mut shell = Command::new(&self.shell_bin);
        shell.arg("-lc").arg(command).current_dir(workdir);

        match run_with_timeout(shell, self.command_timeout) {
            Ok(output) if output.success => {
                debug!(command, "verify command passed");
                None
            }
            Ok(output) => Some(CommandFailure {
                command: command.to_string(),
                kind: FailureKind::NonZeroExit,
                exit_code: output.exit_code,
                output: non_empty_or(output.diagnostic(), "(no output)"),
            }),
            Err(ProcessError::TimedOut { timeout, .. }) => Some(CommandFailure {
                command: command.to_string(),
                kind: FailureKind::TimedOut,
                exit_code: None,
                output: format!("no result after {}s", timeout.as_secs()),
            }),
            Err(err) => Some(CommandFailure {
                command: command.to_string(),
                kind: FailureKind::SpawnFailed,
                exit_code: None,
                output: err.to_string(),
            }),
        }
    }
}

impl Verifier for ShellVerifier {
    fn verify(&self, workdir: &Path, commands: &[String]) -> Result<VerificationReport, VerifyError> {
        if !workdir.is_dir() {
            return Err(VerifyError::MissingWorkdir {
                path: workdir.to_path_buf(),
            });
        }
        if commands.iter().any(|command| command.trim().is_empty()) {
            return Err(VerifyError::InvalidConfig {
                message: "verify command must not be blank".to_string(),
            });
        }

        let started_at = Utc::now();
        let failures: Vec<CommandFailure> = commands
            .iter()
            .filter_map(|command| self.run_one(workdir, command))
            .collect();

        if failures.is_empty() {
            info!(commands = commands.len(), "verification passed");
        } else {
            warn!(
                commands = commands.len(),
                failed = failures.len(),
                "verification failed"
            );
        }

        Ok(VerificationReport {
            started_at,
            finished_at: Utc::now(),
            commands_run: commands.len(),
            failures,
        })
    }
}

fn non_empty_or(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text.to_string()
    }
}
