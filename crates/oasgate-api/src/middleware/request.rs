//! # Request Validation Middleware
//!
//! Buffers the body, runs the request validator and either rejects the
//! request or hands the normalized [`ValidatedRequest`] to the handler
//! through request extensions. The original body bytes are forwarded
//! unchanged.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use oasgate_core::RequestContext;

use super::{api_request, parse_request_body, MAX_BODY_BYTES};
use crate::error::ApiError;
use crate::extractors::ValidatedRequest;
use crate::state::OpenApiValidator;

/// Validate the request against its operation.
pub async fn validate_request(
    State(validator): State<OpenApiValidator>,
    request: Request,
    next: Next,
) -> Response {
    let Some(requests) = validator.requests() else {
        return next.run(request).await;
    };
    if request.extensions().get::<RequestContext>().is_none() {
        return next.run(request).await;
    }

    let (mut parts, body) = request.into_parts();
    let bytes = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::BadRequest(format!("failed to read request body: {e}")).into_response()
        }
    };

    let mut api_request = api_request(&parts);
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    api_request.body = match parse_request_body(content_type, &bytes) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(path = %parts.uri.path(), error = %e, "request body is not valid JSON");
            return ApiError::BadRequest(format!("malformed request body: {e}")).into_response();
        }
    };

    if let Err(err) = requests.validate(&mut api_request) {
        return ApiError::from(err).into_response();
    }

    parts.extensions.insert(ValidatedRequest(api_request));
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
