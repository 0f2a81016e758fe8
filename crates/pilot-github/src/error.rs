use pilot_core::ProcessError;

/// Every issue-tracker failure. An empty result is never an error.
#[derive(Debug, thiserror::Error)]
pub enum GithubError {
    #[error(transparent)]
    Process(#[from] ProcessError),
    #[error("gh command returned non-zero exit ({command}) status={status:?}: {stderr}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
        stderr: String,
    },
    #[error("unable to parse gh output ({context}): {message}")]
    Parse { context: String, message: String },
}

impl GithubError {
    pub fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        GithubError::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
