//! # Response Validation Middleware
//!
//! Buffers the handler's response and checks it against the operation's
//! declared responses. A violation replaces the response with a 500.
//! Bodies normalized by the validator (`removeAdditional`) are
//! re-serialized; everything else is forwarded byte for byte.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use oasgate_core::{ApiRequest, RequestContext};

use super::parse_response_body;
use crate::error::{ApiError, Rejection};
use crate::state::OpenApiValidator;

/// Validate the handler's response.
pub async fn validate_response(
    State(validator): State<OpenApiValidator>,
    request: Request,
    next: Next,
) -> Response {
    let Some(responses) = validator.responses() else {
        return next.run(request).await;
    };
    let Some(context) = request.extensions().get::<RequestContext>().cloned() else {
        return next.run(request).await;
    };
    let api_request =
        ApiRequest::new(request.method().as_str(), request.uri().path()).with_context(context);

    let response = next.run(request).await;
    if response.extensions().get::<Rejection>().is_some() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            return ApiError::Internal(format!("failed to read response body: {e}")).into_response()
        }
    };
    let content_type = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut body = parse_response_body(content_type.as_deref(), &bytes);
    let original = body.clone();
    if let Err(err) = responses.validate(
        &api_request,
        parts.status.as_u16(),
        content_type.as_deref(),
        body.as_mut(),
    ) {
        return ApiError::from(err).into_response();
    }

    match body {
        Some(normalized) if original.as_ref() != Some(&normalized) => {
            match serde_json::to_vec(&normalized) {
                Ok(rewritten) => {
                    parts.headers.remove(CONTENT_LENGTH);
                    Response::from_parts(parts, Body::from(rewritten))
                }
                Err(e) => ApiError::Internal(format!("failed to re-serialize response: {e}"))
                    .into_response(),
            }
        }
        _ => Response::from_parts(parts, Body::from(bytes)),
    }
}
