use pilot_agents::AgentError;
use pilot_core::{ProcessError, TaskStatus};
use pilot_git::GitError;
use pilot_github::GithubError;
use pilot_verify::VerifyError;

use crate::persistence::PersistenceError;
use crate::state_machine::StateMachineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    Tracker,
    Git,
    Ai,
    Persistence,
    Verifier,
}

impl AdapterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AdapterKind::Tracker => "issue tracker",
            AdapterKind::Git => "git",
            AdapterKind::Ai => "ai",
            AdapterKind::Persistence => "persistence",
            AdapterKind::Verifier => "verifier",
        }
    }
}

impl std::fmt::Display for AdapterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one orchestration step.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PilotError {
    #[error("invalid task status transition: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
    #[error("{adapter} adapter failed: {message}")]
    AdapterFailure { adapter: AdapterKind, message: String },
    #[error("verification failed:\n{summary}")]
    VerificationFailure { summary: String },
    #[error("verification still failing after {attempts} attempts:\n{last_error}")]
    ExhaustedRetries { attempts: u32, last_error: String },
    #[error("{operation} timed out: {message}")]
    TimeoutExceeded { operation: AdapterKind, message: String },
}

impl PilotError {
    pub fn adapter(adapter: AdapterKind, message: impl ToString) -> Self {
        PilotError::AdapterFailure {
            adapter,
            message: message.to_string(),
        }
    }

    /// Wrap the last failure of a run that used up its retries.
    pub fn exhausted(self, attempts: u32) -> Self {
        let last_error = match self {
            PilotError::VerificationFailure { summary } => summary,
            other => other.to_string(),
        };
        PilotError::ExhaustedRetries {
            attempts,
            last_error,
        }
    }

    fn from_process(adapter: AdapterKind, err: &ProcessError, rendered: String) -> Self {
        match err {
            ProcessError::TimedOut { .. } => PilotError::TimeoutExceeded {
                operation: adapter,
                message: rendered,
            },
            _ => PilotError::adapter(adapter, rendered),
        }
    }
}

impl From<StateMachineError> for PilotError {
    fn from(err: StateMachineError) -> Self {
        match err {
            StateMachineError::InvalidTransition { from, to } => {
                PilotError::InvalidTransition { from, to }
            }
        }
    }
}

impl From<PersistenceError> for PilotError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::Transition(inner) => inner.into(),
            other => PilotError::adapter(AdapterKind::Persistence, other),
        }
    }
}

impl From<GithubError> for PilotError {
    fn from(err: GithubError) -> Self {
        let rendered = err.to_string();
        match &err {
            GithubError::Process(process) => {
                PilotError::from_process(AdapterKind::Tracker, process, rendered)
            }
            _ => PilotError::adapter(AdapterKind::Tracker, rendered),
        }
    }
}

impl From<GitError> for PilotError {
    fn from(err: GitError) -> Self {
        let rendered = err.to_string();
        match &err {
            GitError::Process(process) => PilotError::from_process(AdapterKind::Git, process, rendered),
            _ => PilotError::adapter(AdapterKind::Git, rendered),
        }
    }
}

impl From<AgentError> for PilotError {
    fn from(err: AgentError) -> Self {
        let rendered = err.to_string();
        match &err {
            AgentError::Process(process) => PilotError::from_process(AdapterKind::Ai, process, rendered),
            _ => PilotError::adapter(AdapterKind::Ai, rendered),
        }
    }
}

impl From<VerifyError> for PilotError {
    fn from(err: VerifyError) -> Self {
        PilotError::adapter(AdapterKind::Verifier, err)
    }
}
