//! # oasgate-core: OpenAPI 3 Request/Response Validation
//!
//! Validates HTTP requests and responses against an OpenAPI 3 document as
//! they pass through a server's middleware chain. Framework-neutral: the
//! HTTP layer builds an [`ApiRequest`], attaches the [`RequestContext`]
//! routing resolved, and calls the validators.
//!
//! ## Request Path
//!
//! [`RequestValidator::validate`] compiles (once per method, route and
//! content type) a JSON Schema covering query, headers, path parameters,
//! cookies and body, rewrites style/explode-encoded parameters into native
//! values ([`mutator`]), enforces strict query parameters, then validates.
//!
//! ## Response Path
//!
//! [`ResponseValidator::validate`] selects a compiled validator by status
//! (`200`, `2XX`, `default`) and content type (exact, `*/*`, `type/*`,
//! first declared) and checks the outgoing body.
//!
//! ## Errors
//!
//! Every failure is a [`ValidationError`] carrying the HTTP status and an
//! ordered `{path, message, errorCode}` list. Requests outside the API
//! surface (no context) are never rejected.
//!
//! ## Crate Policy
//!
//! - The JSON Schema engine is reached only through [`SchemaCompiler`].
//! - Validator caches are owned by each validator instance.
//! - No I/O after construction; validation is pure CPU work.

pub mod body;
pub mod cache;
pub mod coerce;
pub mod compiler;
pub mod config;
pub mod content_type;
pub mod dialect;
pub mod document;
pub mod error;
pub mod mutator;
pub mod parameters;
pub mod query;
pub mod request;
pub mod request_validator;
pub mod response_validator;
pub mod routing;
pub mod schema;
pub mod security;

pub use body::{BodySchema, BodySchemaResolver, RequestBodyResolver};
pub use compiler::{
    CompileError, CompiledSchema, EngineError, EngineOptions, JsonSchemaCompiler, SchemaCompiler,
};
pub use config::{
    ConfigError, FormatValidation, RequestOptions, ResponseOptions, UnknownFormats,
    ValidatorOptions,
};
pub use content_type::{ContentType, MediaType, NOT_PROVIDED};
pub use document::{ApiDocument, DocumentError, Operation};
pub use error::{ErrorItem, ErrorKind, ValidationError};
pub use mutator::ParameterMutator;
pub use parameters::{ParameterLocation, ParameterSchemas, ResolvedParameter};
pub use request::{ApiRequest, RequestContext};
pub use request_validator::{RequestValidator, RouteValidator};
pub use response_validator::{ResponseTable, ResponseValidator};
pub use routing::RouteTable;
pub use schema::{Composition, SchemaNode};
