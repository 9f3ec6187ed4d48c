//! Inbound request conversion.
//!
//! # Responsibilities
//! - Stamp every request with an `x-request-id` (UUID v4)
//! - Buffer the body up to the configured limit
//! - Convert the axum request into the engine's [`Request`] snapshot
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Repeated header fields stay separate, except `cookie`, joined with `; `
//! - A body that cannot be read within the limit is answered with 413

use axum::body::Body;
use axum::http::{header, HeaderValue, Request as HttpRequest, StatusCode};
use tower_http::request_id::{MakeRequestId, RequestId};

use crate::model::Request;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates a fresh UUID v4 for requests that arrive without an ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &HttpRequest<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// The request ID set by the request-id layer, or `unknown`.
pub fn request_id<B>(request: &HttpRequest<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Buffer `request` into a [`Request`].
pub async fn into_model(request: HttpRequest<Body>, max_body_bytes: usize) -> Result<Request, StatusCode> {
    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, max_body_bytes).await.map_err(|e| {
        tracing::warn!(error = %e, limit = max_body_bytes, "Failed to buffer request body");
        StatusCode::PAYLOAD_TOO_LARGE
    })?;

    let url = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let mut req = Request::new(parts.method.as_str(), url).with_body(body);

    let mut cookies = Vec::new();
    for (name, value) in &parts.headers {
        let Ok(value) = value.to_str() else {
            continue;
        };
        if name == header::COOKIE {
            cookies.push(value);
        } else {
            req.append_header(name.as_str(), value);
        }
    }
    // HTTP/2 clients may split cookies across fields; upstreams expect one
    if !cookies.is_empty() {
        req.set_header("cookie", cookies.join("; "));
    }

    // HTTP/2 carries the host in the URI authority
    if req.header("host").is_none() {
        if let Some(authority) = parts.uri.authority() {
            req.set_header("host", authority.as_str());
        }
    }

    Ok(req)
}
