//! # Custom Extractors
//!
//! [`ValidatedRequest`] hands handlers the request as the validator left
//! it: query, headers, path parameters, cookies and body normalized to the
//! types the document declares.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use oasgate_core::ApiRequest;

use crate::error::ApiError;

/// The normalized request, inserted into request extensions by the request
/// validation middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRequest(pub ApiRequest);

impl std::ops::Deref for ValidatedRequest {
    type Target = ApiRequest;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Returns 500 when the request validation layer is not installed in front
/// of the handler.
impl<S: Send + Sync> FromRequestParts<S> for ValidatedRequest {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<ValidatedRequest>()
            .cloned()
            .ok_or_else(|| ApiError::Internal("no validated request in request context".into()))
    }
}
