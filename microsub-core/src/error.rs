use serde::Serialize;
use thiserror::Error;

/// Machine-readable Microsub error codes and their HTTP statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    InvalidRequest,
    Unauthorized,
    Forbidden,
    InsufficientScope,
    NotFound,
    NotImplemented,
    ServerError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "invalid_request",
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::Forbidden => "forbidden",
            ErrorCode::InsufficientScope => "insufficient_scope",
            ErrorCode::NotFound => "not_found",
            ErrorCode::NotImplemented => "not_implemented",
            ErrorCode::ServerError => "server_error",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::InvalidRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden | ErrorCode::InsufficientScope => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::NotImplemented => 501,
            ErrorCode::ServerError => 500,
        }
    }

    pub fn response(self) -> ErrorResponse {
        ErrorResponse::new(self, None::<String>)
    }

    pub fn with_description(self, description: impl Into<String>) -> ErrorResponse {
        ErrorResponse::new(self, Some(description))
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire shape of every error: `{"error": ..., "error_description": ...}`.
///
/// `error_description` is left out of the JSON entirely when no message was
/// supplied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(skip)]
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, description: Option<impl Into<String>>) -> Self {
        ErrorResponse {
            error: code.as_str().to_string(),
            error_description: description.map(Into::into),
            status: code.status(),
        }
    }

    /// An error code outside the fixed taxonomy. Always answered with 400.
    pub fn custom(error: impl Into<String>, description: Option<impl Into<String>>) -> Self {
        ErrorResponse {
            error: error.into(),
            error_description: description.map(Into::into),
            status: 400,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({ "error": self.error }))
    }
}

/// Errors surfaced by the router and the endpoint handler.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MicrosubError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Insufficient scope: {0}")]
    InsufficientScope(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Server error: {0}")]
    Server(String),
}

impl MicrosubError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MicrosubError::InvalidRequest(_) => ErrorCode::InvalidRequest,
            MicrosubError::Unauthorized(_) => ErrorCode::Unauthorized,
            MicrosubError::Forbidden(_) => ErrorCode::Forbidden,
            MicrosubError::InsufficientScope(_) => ErrorCode::InsufficientScope,
            MicrosubError::NotFound(_) => ErrorCode::NotFound,
            MicrosubError::NotImplemented(_) => ErrorCode::NotImplemented,
            MicrosubError::Server(_) => ErrorCode::ServerError,
        }
    }

    fn description(&self) -> &str {
        match self {
            MicrosubError::InvalidRequest(m)
            | MicrosubError::Unauthorized(m)
            | MicrosubError::Forbidden(m)
            | MicrosubError::InsufficientScope(m)
            | MicrosubError::NotFound(m)
            | MicrosubError::NotImplemented(m)
            | MicrosubError::Server(m) => m,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        let description = self.description();
        if description.is_empty() {
            self.code().response()
        } else {
            self.code().with_description(description)
        }
    }
}
