use serde::Serialize;
use std::future::Future;
use tracing::error;

use super::error::ApiError;

/// Result of [`safe_request`]: never an `Err`, always something a caller can render
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ApiOutcome<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: ApiError },
}

impl<T> ApiOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, ApiOutcome::Success { .. })
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            ApiOutcome::Success { data, .. } => Some(data),
            ApiOutcome::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ApiError> {
        match self {
            ApiOutcome::Success { .. } => None,
            ApiOutcome::Failure { error, .. } => Some(error),
        }
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            ApiOutcome::Success { data, .. } => Ok(data),
            ApiOutcome::Failure { error, .. } => Err(error),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SafeRequestOptions {
    /// Replaces the normalized message on failure
    pub error_message: Option<String>,
    pub show_error: bool,
}

impl Default for SafeRequestOptions {
    fn default() -> Self {
        Self {
            error_message: None,
            show_error: true,
        }
    }
}

/// Await a gateway call and fold its failure into an [`ApiOutcome`]
pub async fn safe_request<T, F>(call: F, options: SafeRequestOptions) -> ApiOutcome<T>
where
    F: Future<Output = Result<T, ApiError>>,
{
    match call.await {
        Ok(data) => ApiOutcome::Success {
            success: true,
            data,
        },
        Err(mut err) => {
            if let Some(message) = options.error_message {
                err.message = message;
            }
            if options.show_error {
                error!("{}", err.message);
            }
            ApiOutcome::Failure {
                success: false,
                error: err,
            }
        },
    }
}
