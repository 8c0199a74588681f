//! Error types for DeepDive.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system. The body produced here is completed
//! with request context by [`crate::middleware::error_envelope`].

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("{0}")]
    Conflict(String),

    // Validation errors
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidInput(String),

    // External service errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("AI service error: {0}")]
    AiService(String),

    #[error("Document renderer error: {0}")]
    Renderer(String),

    // Rate limiting
    #[error("Too many requests, please try again later")]
    RateLimitExceeded,

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// How a database failure surfaces to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DbFailure {
    Duplicate,
    ForeignKey,
    RowNotFound,
    Other,
}

impl Error {
    /// 401 with the standard sign-in prompt.
    pub fn unauthenticated() -> Self {
        Self::Unauthenticated("Please sign in to continue".to_string())
    }

    fn db_failure(&self) -> Option<DbFailure> {
        let Self::Database(err) = self else {
            return None;
        };
        Some(match err {
            sqlx::Error::RowNotFound => DbFailure::RowNotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => DbFailure::Duplicate,
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                DbFailure::ForeignKey
            }
            _ => DbFailure::Other,
        })
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,

            // 403
            Self::Forbidden(_) => StatusCode::FORBIDDEN,

            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 409
            Self::AlreadyExists(_) | Self::Conflict(_) => StatusCode::CONFLICT,

            // 400
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 429
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,

            // 501
            Self::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,

            // 502
            Self::AiService(_) | Self::Renderer(_) => StatusCode::BAD_GATEWAY,

            Self::Database(_) => match self.db_failure() {
                Some(DbFailure::Duplicate) => StatusCode::CONFLICT,
                Some(DbFailure::ForeignKey) => StatusCode::BAD_REQUEST,
                Some(DbFailure::RowNotFound) => StatusCode::NOT_FOUND,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },

            // 500
            Self::Internal(_) | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::Conflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Database(_) => match self.db_failure() {
                Some(DbFailure::Duplicate) => "DUPLICATE_ERROR",
                Some(DbFailure::ForeignKey) => "FOREIGN_KEY_VIOLATION",
                Some(DbFailure::RowNotFound) => "NOT_FOUND",
                _ => "DATABASE_ERROR",
            },
            Self::AiService(_) => "AI_SERVICE_ERROR",
            Self::Renderer(_) => "RENDERER_ERROR",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::NotImplemented(_) => "NOT_IMPLEMENTED",
            Self::Other(_) => "INTERNAL_ERROR",
        }
    }

    /// Message safe to show to clients. Database internals are never exposed.
    pub fn public_message(&self) -> String {
        match self.db_failure() {
            Some(DbFailure::Duplicate) => "Duplicate entry".to_string(),
            Some(DbFailure::ForeignKey) => {
                "Invalid reference: related record not found".to_string()
            }
            Some(DbFailure::RowNotFound) => "Record not found".to_string(),
            Some(DbFailure::Other) => "Database error occurred".to_string(),
            None => self.to_string(),
        }
    }

    fn details(&self) -> Option<Value> {
        match (self, self.db_failure()) {
            (Self::Database(sqlx::Error::Database(db_err)), Some(DbFailure::Duplicate))
            | (Self::Database(sqlx::Error::Database(db_err)), Some(DbFailure::ForeignKey)) => {
                Some(json!({ "constraint": db_err.message() }))
            }
            _ => None,
        }
    }
}

/// Error context carried in response extensions so the envelope middleware
/// can rebuild the body with request information.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
    pub stack: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let info = ErrorInfo {
            code: self.error_code(),
            message: self.public_message(),
            details: self.details(),
            stack: format!("{:?}", self),
        };

        let mut body = json!({
            "statusCode": status.as_u16(),
            "message": info.message,
            "error": info.code,
        });
        if let Some(details) = &info.details {
            body["details"] = details.clone();
        }

        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(info);
        response
    }
}

// Convenience conversions
impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::AiService(format!("HTTP request failed: {}", err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidInput(format!("JSON parsing error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::unauthenticated().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Forbidden("no".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Validation("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::AiService("down".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            Error::Database(sqlx::Error::RowNotFound).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_database_errors_hide_internals() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert_eq!(err.public_message(), "Database error occurred");
    }

    #[test]
    fn test_response_carries_error_info() {
        let response = Error::NotFound("Note not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let info = response.extensions().get::<ErrorInfo>().unwrap();
        assert_eq!(info.code, "NOT_FOUND");
        assert_eq!(info.message, "Note not found");
    }
}
