use pilot_core::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("git command returned non-zero exit ({command}) status={status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("filesystem operation failed ({context}): {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl GitError {
    /// Combined stdout/stderr for a failed command, empty for other variants.
    pub fn command_output(&self) -> String {
        match self {
            GitError::CommandFailed { stdout, stderr, .. } => format!("{stdout}\n{stderr}"),
            _ => String::new(),
        }
    }
}
