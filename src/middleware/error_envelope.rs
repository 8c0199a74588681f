//! Uniform error bodies.
//!
//! Every 4xx/5xx response leaving the router is rewritten into
//! `{statusCode, timestamp, path, method, message, error, details?, stack?}`.
//! Handler errors carry their context in an [`ErrorInfo`] extension;
//! extractor rejections and routing failures are rebuilt from their status
//! and plain-text body.

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::error::ErrorInfo;
use crate::models::now_rfc3339;
use crate::AppState;

const MAX_REJECTION_BODY: usize = 16 * 1024;

pub async fn error_envelope(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = next.run(req).await;
    let status = response.status();
    if !status.is_client_error() && !status.is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let (status, info) = match parts.extensions.remove::<ErrorInfo>() {
        Some(info) => (status, info),
        None => {
            let text = to_bytes(body, MAX_REJECTION_BODY)
                .await
                .map(|b| String::from_utf8_lossy(&b).trim().to_string())
                .unwrap_or_default();
            rejection_info(status, &method, &path, text)
        }
    };

    if status.is_server_error() {
        error!(status = status.as_u16(), method = %method, path = %path, error = info.code, message = %info.message, "Request failed");
    } else {
        warn!(status = status.as_u16(), method = %method, path = %path, error = info.code, message = %info.message, "Request rejected");
    }

    let mut body = json!({
        "statusCode": status.as_u16(),
        "timestamp": now_rfc3339(),
        "path": path,
        "method": method.as_str(),
        "message": info.message,
        "error": info.code,
    });
    if let Some(details) = info.details {
        body["details"] = details;
    }
    if state.config.server.environment.is_development() {
        body["stack"] = json!(info.stack);
    }

    let mut rebuilt = (status, Json(body)).into_response();
    // Keep headers such as `Allow` on 405s
    for (name, value) in parts.headers.iter() {
        if name != header::CONTENT_TYPE && name != header::CONTENT_LENGTH {
            rebuilt.headers_mut().insert(name.clone(), value.clone());
        }
    }
    rebuilt
}

/// Error context for responses that did not come from [`crate::Error`].
fn rejection_info(
    status: StatusCode,
    method: &axum::http::Method,
    path: &str,
    text: String,
) -> (StatusCode, ErrorInfo) {
    let status = if status == StatusCode::UNPROCESSABLE_ENTITY {
        StatusCode::BAD_REQUEST
    } else {
        status
    };

    let code = match status.as_u16() {
        400 => "VALIDATION_ERROR",
        401 => "UNAUTHENTICATED",
        403 => "FORBIDDEN",
        404 => "NOT_FOUND",
        405 => "METHOD_NOT_ALLOWED",
        408 => "REQUEST_TIMEOUT",
        409 => "CONFLICT",
        413 => "PAYLOAD_TOO_LARGE",
        415 => "UNSUPPORTED_MEDIA_TYPE",
        429 => "RATE_LIMIT_EXCEEDED",
        500..=599 => "INTERNAL_ERROR",
        _ => "HTTP_ERROR",
    };

    let message = if !text.is_empty() {
        text
    } else if status == StatusCode::NOT_FOUND {
        format!("Cannot {} {}", method, path)
    } else {
        status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string()
    };

    (
        status,
        ErrorInfo {
            code,
            stack: message.clone(),
            message,
            details: None,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;

    #[test]
    fn test_unprocessable_becomes_validation_error() {
        let (status, info) = rejection_info(
            StatusCode::UNPROCESSABLE_ENTITY,
            &Method::POST,
            "/api/v1/notes",
            "missing field `content`".to_string(),
        );
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(info.code, "VALIDATION_ERROR");
        assert_eq!(info.message, "missing field `content`");
    }

    #[test]
    fn test_empty_not_found_names_route() {
        let (status, info) = rejection_info(StatusCode::NOT_FOUND, &Method::GET, "/nope", String::new());
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(info.message, "Cannot GET /nope");
    }

    #[test]
    fn test_method_not_allowed_uses_reason() {
        let (_, info) = rejection_info(StatusCode::METHOD_NOT_ALLOWED, &Method::PUT, "/x", String::new());
        assert_eq!(info.code, "METHOD_NOT_ALLOWED");
        assert_eq!(info.message, "Method Not Allowed");
    }
}
