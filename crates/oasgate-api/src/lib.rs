//! # oasgate-api: Axum Validation Middleware
//!
//! Puts an OpenAPI 3 document in front of an axum [`Router`](axum::Router).
//! Requests are checked before they reach handlers and, when enabled,
//! responses are checked before they leave.
//!
//! ```ignore
//! let validator = OpenApiValidator::from_path(Path::new("openapi.yaml"), &options)?;
//! let app = validator.layer(Router::new().route("/v1/pets", get(list_pets)));
//! ```
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Metadata → ResponseValidation → RequestValidation → Handler
//! ```
//!
//! Handlers read the normalized request through the
//! [`ValidatedRequest`] extractor. Failures become [`ApiError`] JSON
//! envelopes carrying the validator's `{path, message, errorCode}` list.
//!
//! ## Crate Policy
//!
//! - No validation logic here; everything delegates to `oasgate-core`.
//! - Paths the document does not manage are never rejected.

pub mod error;
pub mod extractors;
pub mod middleware;
pub mod state;

pub use error::{ApiError, ErrorBody, ErrorDetail};
pub use extractors::ValidatedRequest;
pub use state::{OpenApiValidator, SetupError};
