use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("A session named '{0}' already exists")]
    DuplicateName(String),

    #[error("{0}")]
    Validation(String),

    /// The user dismissed a prompt; the operation in progress is abandoned.
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Could not set permissions on {path}: {source}")]
    PermissionAdjust {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to open terminal: {0}")]
    ExternalProcess(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Profile error: {0}")]
    Profile(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn external(msg: impl Into<String>) -> Self {
        Self::ExternalProcess(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn profile(msg: impl Into<String>) -> Self {
        Self::Profile(msg.into())
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
