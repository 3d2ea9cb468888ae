use std::collections::BTreeMap;
use std::fmt;

use axum::http::StatusCode;
use serde::Serialize;

use ::config::ConfigError;
use crate::error::AccessError;

/// JSON error body: `{status, statusText, message, error, data}`.
///
/// `error` maps offending fields to messages; `data` is always empty.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub status: u16,
    #[serde(rename = "statusText")]
    pub status_text: String,
    pub message: String,
    pub error: BTreeMap<String, String>,
    pub data: serde_json::Value,
}

impl ApiError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        let code = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Self {
            status: code.as_u16(),
            status_text: code.canonical_reason().unwrap_or("Error").to_string(),
            message: message.into(),
            error: BTreeMap::new(),
            data: serde_json::json!({}),
        }
    }

    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.error.insert(field.into(), message.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message, 400)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message, 404)
    }

    /// Internal details stay in the logs.
    pub fn internal() -> Self {
        Self::new("Something went wrong... Try finding support", 500)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API Error {}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::NotFound("file") => {
                Self::not_found("File not found").with_field("file", "File not found")
            }
            AccessError::NotFound(_) => Self::not_found("Not found in our records"),
            AccessError::Unauthorized => Self::new("Invalid credentials", 401)
                .with_field("passphrase", "Invalid credentials"),
            AccessError::Validation { field, message } => {
                Self::bad_request("Invalid request").with_field(field, message)
            }
            other => {
                tracing::error!(error = %other, "Request failed");
                Self::internal()
            }
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        Self::new(format!("Configuration error: {}", err), 500)
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        Self::bad_request("Invalid Form Upload").with_field("attachment", err.body_text())
    }
}

impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, axum::Json(self)).into_response()
    }
}
