/// Response middleware
use crate::error::{ErrorEnvelope, ErrorReport};
use axum::{
    body::{to_bytes, Body},
    extract::Request,
    http::{header, StatusCode},
    middleware::Next,
    response::IntoResponse,
    response::Response,
    Json,
};

/// Largest framework rejection body reused as an error message
const MAX_REJECTION_BODY: usize = 4096;

/// Render every error response as the JSON envelope with the request path
///
/// Errors raised by handlers carry an `ErrorReport`. Bare error responses
/// produced by the router itself (wrong method, path rejections) are wrapped
/// too; a wrong method on a known route answers like an unknown route.
pub async fn error_envelope(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let route = req.uri().path().to_string();
    let path = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| route.clone());

    let mut response = next.run(req).await;

    let report = match response.extensions_mut().remove::<ErrorReport>() {
        Some(report) => report,
        None if response.status() == StatusCode::METHOD_NOT_ALLOWED => {
            *response.status_mut() = StatusCode::NOT_FOUND;
            response.headers_mut().remove(header::ALLOW);
            ErrorReport {
                status: StatusCode::NOT_FOUND,
                message: format!("Cannot {} {}", method, route),
            }
        }
        None if response.status().is_client_error() || response.status().is_server_error() => {
            let status = response.status();
            let (parts, body) = response.into_parts();
            let text = to_bytes(body, MAX_REJECTION_BODY)
                .await
                .ok()
                .and_then(|bytes| String::from_utf8(bytes.to_vec()).ok())
                .filter(|text| !text.trim().is_empty());

            response = Response::from_parts(parts, Body::empty());
            ErrorReport {
                status,
                message: text.unwrap_or_else(|| {
                    status.canonical_reason().unwrap_or("Error").to_string()
                }),
            }
        }
        None => return response,
    };

    let (mut parts, _) = response.into_parts();
    let rendered = Json(ErrorEnvelope::new(report.status, report.message, path)).into_response();

    // Keep status and headers such as Set-Cookie, replace only the body
    let (rendered_parts, rendered_body) = rendered.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.extend(rendered_parts.headers);
    Response::from_parts(parts, rendered_body)
}
