use thiserror::Error;

use crate::gateway::ApiError;

/// Main error type for the clinic client
#[derive(Error, Debug)]
pub enum ClinicError {
    /// A normalized failure coming back from the request gateway
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Client-side validation failed before any request was sent
    #[error("{0}")]
    Validation(String),

    #[error("Unknown role: {0}")]
    InvalidRole(String),

    #[error("Invalid token: {0}")]
    InvalidToken(String),
}

impl ClinicError {
    /// The normalized gateway error, when this failure came from the backend
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            ClinicError::Api(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClinicError>;
