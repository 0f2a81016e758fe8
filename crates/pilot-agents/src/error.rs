use pilot_core::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("invalid agent request: {message}")]
    InvalidRequest { message: String },
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("agent exited with status {status:?} ({command}): {stderr}")]
    NonZeroExit {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
}

impl AgentError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Process(ProcessError::TimedOut { .. }))
    }
}
