//! # Route Metadata Middleware
//!
//! Resolves the request path against the document and attaches the
//! [`RequestContext`] to request extensions. Paths outside the API get
//! nothing and pass through every later layer untouched.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::state::OpenApiValidator;

/// Attach the routing context, if the path is part of the API.
pub async fn attach_metadata(
    State(validator): State<OpenApiValidator>,
    mut request: Request,
    next: Next,
) -> Response {
    let context = validator
        .routes()
        .resolve(request.method().as_str(), request.uri().path());

    match context {
        Some(context) => {
            tracing::debug!(
                method = %request.method(),
                path = request.uri().path(),
                route = context.matched_route.as_deref().unwrap_or("<none>"),
                "resolved openapi route"
            );
            request.extensions_mut().insert(context);
        }
        None => {
            tracing::trace!(path = request.uri().path(), "path is not managed by the document");
        }
    }
    next.run(request).await
}
