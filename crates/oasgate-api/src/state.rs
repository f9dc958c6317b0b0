//! # Validator State
//!
//! [`OpenApiValidator`] is the shared state behind the three middleware
//! layers: the route table, and the request and response validators the
//! options enable. It is cheap to clone; every layer holds the same
//! instance, so compiled validators are shared across requests.

use std::path::Path;
use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use oasgate_core::{
    ApiDocument, ConfigError, DocumentError, RequestValidator, ResponseValidator, RouteTable,
    ValidatorOptions,
};
use thiserror::Error;

use crate::middleware;

/// Errors raised while setting the validator up.
#[derive(Error, Debug)]
pub enum SetupError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("path template does not compile: {0}")]
    Route(#[from] regex::Error),
}

#[derive(Debug)]
struct Inner {
    routes: RouteTable,
    requests: Option<RequestValidator>,
    responses: Option<ResponseValidator>,
}

/// OpenAPI validation for an axum [`Router`].
#[derive(Debug, Clone)]
pub struct OpenApiValidator {
    inner: Arc<Inner>,
}

impl OpenApiValidator {
    /// Build the validator for `doc`.
    pub fn new(doc: ApiDocument, options: &ValidatorOptions) -> Result<Self, SetupError> {
        let doc = Arc::new(doc);
        let routes =
            RouteTable::new(Arc::clone(&doc))?.with_ignore_paths(options.ignore_paths_regex()?);
        let requests = options
            .validate_requests
            .is_some()
            .then(|| RequestValidator::new(Arc::clone(&doc), options));
        let responses = options
            .validate_responses
            .is_some()
            .then(|| ResponseValidator::new(Arc::clone(&doc), options));

        tracing::info!(
            requests = requests.is_some(),
            responses = responses.is_some(),
            "openapi validation configured"
        );
        Ok(Self {
            inner: Arc::new(Inner {
                routes,
                requests,
                responses,
            }),
        })
    }

    /// Load the document (YAML or JSON) from `path`.
    pub fn from_path(path: &Path, options: &ValidatorOptions) -> Result<Self, SetupError> {
        Self::new(ApiDocument::from_path(path)?, options)
    }

    /// The route table.
    pub fn routes(&self) -> &RouteTable {
        &self.inner.routes
    }

    /// The request validator, when request validation is enabled.
    pub fn requests(&self) -> Option<&RequestValidator> {
        self.inner.requests.as_ref()
    }

    /// The response validator, when response validation is enabled.
    pub fn responses(&self) -> Option<&ResponseValidator> {
        self.inner.responses.as_ref()
    }

    /// Install the validation layers on `router`.
    ///
    /// Execution order: metadata → response validation → request
    /// validation → handler. Layers apply to the routes (and fallback)
    /// already added, so call this last.
    pub fn layer<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let mut router = router;
        if self.requests().is_some() {
            router = router.layer(from_fn_with_state(self.clone(), middleware::request::validate_request));
        }
        if self.responses().is_some() {
            router = router.layer(from_fn_with_state(self.clone(), middleware::response::validate_response));
        }
        router.layer(from_fn_with_state(self.clone(), middleware::metadata::attach_metadata))
    }
}
