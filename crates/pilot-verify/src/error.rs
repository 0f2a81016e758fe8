use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    #[error("verification workdir does not exist: {path}")]
    MissingWorkdir { path: PathBuf },
    #[error("invalid verify configuration: {message}")]
    InvalidConfig { message: String },
}
