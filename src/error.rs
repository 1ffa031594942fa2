//! Unified application error model for the HTTP edge.
//! Core (`crate::poff`) errors are mapped here into a code + message pair with an
//! HTTP status and a JSON body of the shape `{allowed, error, code}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt::{Display, Formatter};

use crate::poff::PoffError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    NotFound { code: String, message: String },
    Forbidden { code: String, message: String },
    Io { code: String, message: String },
    Upstream { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Forbidden { code, .. }
            | AppError::Io { code, .. }
            | AppError::Upstream { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Forbidden { message, .. }
            | AppError::Io { message, .. }
            | AppError::Upstream { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user<S: Into<String>>(code: S, msg: S) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn not_found<S: Into<String>>(code: S, msg: S) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn forbidden<S: Into<String>>(code: S, msg: S) -> Self { AppError::Forbidden { code: code.into(), message: msg.into() } }
    pub fn io<S: Into<String>>(code: S, msg: S) -> Self { AppError::Io { code: code.into(), message: msg.into() } }
    pub fn upstream<S: Into<String>>(code: S, msg: S) -> Self { AppError::Upstream { code: code.into(), message: msg.into() } }
    pub fn internal<S: Into<String>>(code: S, msg: S) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// The edit allow-file is missing.
    pub fn edit_disabled() -> Self { AppError::forbidden("edit_disabled", "Edit mode not enabled.") }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::NotFound { .. } => 404,
            AppError::Forbidden { .. } => 403,
            AppError::Io { .. } => 500,
            AppError::Upstream { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }

    /// JSON body sent to clients. `allowed` is false only when editing is disabled.
    pub fn body(&self) -> serde_json::Value {
        let allowed = !matches!(self, AppError::Forbidden { .. });
        json!({ "allowed": allowed, "error": self.message(), "code": self.code_str() })
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<PoffError> for AppError {
    fn from(err: PoffError) -> Self {
        let msg = err.to_string();
        match err {
            PoffError::InvalidPath(_) => AppError::user("invalid_path", msg.as_str()),
            PoffError::NotFound(_) => AppError::not_found("not_found", msg.as_str()),
            PoffError::Write { .. } => AppError::io("write_failed", msg.as_str()),
            PoffError::Encode(_) => AppError::internal("encode_failed", msg.as_str()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal { code: "internal".into(), message: err.to_string() }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(target: "poff::http", "{}", self);
        } else {
            tracing::debug!(target: "poff::http", "{}", self);
        }
        (status, Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::edit_disabled().http_status(), 403);
        assert_eq!(AppError::io("write_failed", "disk").http_status(), 500);
        assert_eq!(AppError::upstream("llm_failed", "timeout").http_status(), 502);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn core_errors_map_to_codes() {
        let e: AppError = PoffError::InvalidPath("'..' segments are not allowed".into()).into();
        assert_eq!(e.code_str(), "invalid_path");
        assert_eq!(e.http_status(), 400);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: AppError = PoffError::Write { path: PathBuf::from("/x/poff.config.json"), source: io }.into();
        assert_eq!(e.code_str(), "write_failed");
        assert_eq!(e.http_status(), 500);
    }

    #[test]
    fn body_shape() {
        assert_eq!(
            AppError::edit_disabled().body(),
            json!({ "allowed": false, "error": "Edit mode not enabled.", "code": "edit_disabled" })
        );
        assert_eq!(AppError::user("invalid_path", "bad").body()["allowed"], json!(true));
    }
}
