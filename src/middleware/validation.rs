use axum::{
    extract::{Request, State},
    http::{header, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

use crate::config::AppConfig;

/// Rejects requests that are malformed before they reach a handler.
///
/// Checks:
/// - path traversal sequences in the URI (`400`)
/// - a declared `Content-Length` above `server.max_body_bytes` on POST/PUT (`413`)
/// - write requests with a body that is not JSON (`415`)
///
/// `DefaultBodyLimit` still guards bodies sent without a length header.
pub async fn validate_request_middleware(
    State(cfg): State<Arc<AppConfig>>,
    req: Request,
    next: Next,
) -> Response {
    if contains_path_traversal(req.uri().path()) {
        return reject(StatusCode::BAD_REQUEST, "INVALID_PATH", "Path traversal detected in request".to_string());
    }

    if let Some(user_agent) = req.headers().get(header::USER_AGENT).and_then(|ua| ua.to_str().ok()) {
        if is_suspicious_user_agent(user_agent) {
            tracing::warn!("Suspicious user agent detected: {}", user_agent);
        }
    }

    if matches!(req.method(), &Method::POST | &Method::PUT) {
        let length = req
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        let max_body_size = cfg.server.max_body_bytes;
        if length.is_some_and(|len| len > max_body_size) {
            return reject(
                StatusCode::PAYLOAD_TOO_LARGE,
                "PAYLOAD_TOO_LARGE",
                format!("Request body exceeds maximum size of {} bytes", max_body_size),
            );
        }

        let has_body = length.is_some_and(|len| len > 0);
        if has_body {
            let content_type = req.headers().get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok());
            if !content_type.is_some_and(|ct| ct.starts_with("application/json")) {
                return reject(
                    StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    "UNSUPPORTED_MEDIA_TYPE",
                    "Request bodies must be application/json".to_string(),
                );
            }
        }
    }

    next.run(req).await
}

fn reject(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "code": code,
                "message": message,
            },
            "status": status.as_u16(),
        })),
    )
        .into_response()
}

/// Directory traversal patterns, plain and URL-encoded.
fn contains_path_traversal(path: &str) -> bool {
    let lower = path.to_lowercase();

    if path.contains("/..") || path.contains("\\..") || path.starts_with("..") {
        return true;
    }
    if path.contains("/./") || path.contains("\\.\\") || path.contains("....") {
        return true;
    }

    const ENCODED_PATTERNS: [&str; 11] = [
        "%2e%2e",
        "%252e%252e",
        "%2e/",
        "%252e%2f",
        "/%2e",
        "%2f%2e",
        "%2e\\",
        "%2e%5c",
        "%5c%2e",
        "%5c%5c",
        "%00",
    ];
    if ENCODED_PATTERNS.iter().any(|p| lower.contains(p)) {
        return true;
    }

    path.contains('\0')
}

fn is_suspicious_user_agent(ua: &str) -> bool {
    let ua_lower = ua.to_lowercase();
    ["nikto", "sqlmap", "havij", "acunetix", "masscan"].iter().any(|tool| ua_lower.contains(tool))
}
