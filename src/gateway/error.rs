use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub const MSG_UNAUTHORIZED: &str = "Session expired. Please log in again.";
pub const MSG_FORBIDDEN: &str = "Access not permitted";
pub const MSG_NOT_FOUND: &str = "Resource not found";
pub const MSG_SERVER: &str = "Internal server error";
pub const MSG_REQUEST_FAILED: &str = "Request failed";
pub const MSG_TIMEOUT: &str = "Connection timed out. Check your connection and try again.";
pub const MSG_NETWORK: &str = "Could not reach the server. Check your internet connection.";
pub const MSG_CANCELLED: &str = "Request cancelled by the user";
pub const MSG_UNKNOWN: &str = "Failed to process the request";

/// Failure classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No response reached us
    Network,
    Timeout,
    Unauthorized,
    Forbidden,
    NotFound,
    Server,
    Cancelled,
    /// Any other 4xx
    Validation,
    Unknown,
}

/// The single failure shape every gateway call resolves to
#[derive(Debug, Clone, Error, Serialize)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: Option<u16>,
    pub payload: Option<Value>,
    pub request_id: Option<String>,
    pub url: Option<String>,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            payload: None,
            request_id: None,
            url: None,
        }
    }

    /// Classify a non-success HTTP response
    pub fn from_status(status: u16, payload: Value) -> Self {
        let (kind, message) = match status {
            401 => (ErrorKind::Unauthorized, MSG_UNAUTHORIZED.to_string()),
            403 => (ErrorKind::Forbidden, MSG_FORBIDDEN.to_string()),
            404 => (ErrorKind::NotFound, MSG_NOT_FOUND.to_string()),
            500..=599 => (ErrorKind::Server, MSG_SERVER.to_string()),
            400..=499 => (
                ErrorKind::Validation,
                backend_message(&payload).unwrap_or_else(|| MSG_REQUEST_FAILED.to_string()),
            ),
            _ => (
                ErrorKind::Unknown,
                backend_message(&payload).unwrap_or_else(|| MSG_REQUEST_FAILED.to_string()),
            ),
        };

        Self {
            status: Some(status),
            payload: (!payload.is_null()).then_some(payload),
            ..Self::new(kind, message)
        }
    }

    pub fn network() -> Self {
        Self::new(ErrorKind::Network, MSG_NETWORK)
    }

    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout, MSG_TIMEOUT)
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, MSG_CANCELLED)
    }

    pub fn unknown(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        let message = if detail.is_empty() {
            MSG_UNKNOWN.to_string()
        } else {
            format!("{MSG_UNKNOWN}: {detail}")
        };
        Self::new(ErrorKind::Unknown, message)
    }

    pub(crate) fn with_context(mut self, request_id: &str, url: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self.url = Some(url.to_string());
        self
    }

    pub fn is_network_error(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == ErrorKind::Timeout
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    pub fn is_forbidden(&self) -> bool {
        self.kind == ErrorKind::Forbidden
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_server_error(&self) -> bool {
        self.kind == ErrorKind::Server
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    pub fn is_validation(&self) -> bool {
        self.kind == ErrorKind::Validation
    }

    /// Network failures and timeouts are worth offering a retry for
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::Network | ErrorKind::Timeout)
    }

    /// Text a front-end should show for this failure
    pub fn user_message(&self) -> String {
        match self.kind {
            ErrorKind::Unauthorized => MSG_UNAUTHORIZED.to_string(),
            ErrorKind::Forbidden => "You are not permitted to perform this action.".to_string(),
            ErrorKind::NotFound => "The requested record was not found.".to_string(),
            ErrorKind::Network | ErrorKind::Timeout => {
                format!("{} Retry when ready.", self.message)
            },
            ErrorKind::Validation => self
                .payload
                .as_ref()
                .and_then(backend_message)
                .unwrap_or_else(|| "The request could not be completed.".to_string()),
            ErrorKind::Cancelled => MSG_CANCELLED.to_string(),
            ErrorKind::Server | ErrorKind::Unknown => {
                "Something went wrong. Please try again later.".to_string()
            },
        }
    }
}

/// `message` or `error` field of a backend error body
fn backend_message(payload: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|field| payload.get(field).and_then(Value::as_str))
        .find(|text| !text.is_empty())
        .map(str::to_string)
}
