use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use pilot_core::run_with_timeout;
use tracing::debug;

use crate::error::GithubError;

pub const DEFAULT_GH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhCli {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Default for GhCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("gh"),
            timeout: DEFAULT_GH_TIMEOUT,
        }
    }
}

impl GhCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Run `gh` and return stdout.
    pub fn run<I, S>(&self, args: I) -> Result<String, GithubError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let owned_args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();

        let mut command = Command::new(&self.binary);
        command.args(&owned_args).env("GH_PROMPT_DISABLED", "1");

        let output = run_with_timeout(command, self.timeout)?;
        if !output.success {
            return Err(GithubError::CommandFailed {
                command: output.command,
                status: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        debug!(command = %output.command, bytes = output.stdout.len(), "gh finished");
        Ok(output.stdout)
    }
}
