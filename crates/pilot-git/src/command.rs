use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use pilot_core::run_with_timeout;

use crate::error::GitError;

pub const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCli {
    pub binary: PathBuf,
    pub timeout: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("git"),
            timeout: DEFAULT_GIT_TIMEOUT,
        }
    }
}

impl GitCli {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn run<I, S>(&self, cwd: &Path, args: I) -> Result<GitOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let owned_args: Vec<OsString> = args
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();

        let mut command = Command::new(&self.binary);
        command.current_dir(cwd).args(&owned_args);
        // Never block on a credential prompt.
        command.env("GIT_TERMINAL_PROMPT", "0");

        let output = run_with_timeout(command, self.timeout)?;
        if !output.success {
            return Err(GitError::CommandFailed {
                command: output.command,
                status: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(GitOutput {
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
