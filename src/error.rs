use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DownloaderError {
    #[error("Configuration error in {context}: {message}")]
    Config { context: String, message: String },

    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Backend invocation failed: {0}")]
    Backend(#[from] BackendError),

    #[error("Cookie file not found: {} (continuing without cookies)", .0.display())]
    CookieFileMissing(PathBuf),

    #[error("Run cancelled by external signal")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl DownloaderError {
    pub fn config(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Config {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Failure of a single backend call. Captured into the job outcome, never
/// propagated past the executor.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error("{0} not found")]
    ToolNotFound(String),

    #[error("exited with {status}: {stderr}")]
    Execution { status: String, stderr: String },

    #[error("unreadable backend output: {0}")]
    Parse(String),
}
