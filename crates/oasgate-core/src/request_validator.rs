//! # Request Validation
//!
//! [`RequestValidator`] resolves a compiled [`RouteValidator`] per
//! `METHOD-route-contentType` key, building it on first use, and runs it:
//! path parameter override, parameter mutation, strict query checking,
//! then the compiled schema over `{query, headers, params, cookies, body}`.
//!
//! On success the request's fields hold the normalized values (decoded
//! styles, coerced types, defaults) for downstream handlers.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::body::{strip_read_only_required, BodySchemaResolver, RequestBodyResolver};
use crate::cache::ValidatorCache;
use crate::compiler::{CompiledSchema, JsonSchemaCompiler, SchemaCompiler};
use crate::config::{RequestOptions, ValidatorOptions};
use crate::content_type::ContentType;
use crate::document::{ApiDocument, Operation};
use crate::error::{ErrorKind, ValidationError};
use crate::mutator::ParameterMutator;
use crate::parameters::{ParameterLocation, ParameterSchemas};
use crate::request::ApiRequest;
use crate::security;

/// The compiled validator of one (method, route, content type).
pub struct RouteValidator {
    parameters: ParameterSchemas,
    security_query_keys: BTreeSet<String>,
    allow_unknown_query_parameters: bool,
    schema: Value,
    compiled: Arc<dyn CompiledSchema>,
}

impl std::fmt::Debug for RouteValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteValidator")
            .field("schema", &self.schema)
            .field("security_query_keys", &self.security_query_keys)
            .finish_non_exhaustive()
    }
}

impl RouteValidator {
    /// The compiled request schema document.
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate and normalize `request`.
    pub fn validate(&self, request: &mut ApiRequest) -> Result<(), ValidationError> {
        if let Some(path_params) = request
            .openapi
            .as_ref()
            .map(|ctx| &ctx.path_params)
            .filter(|params| !params.is_empty())
        {
            request.params = path_params.clone();
            request
                .decoded
                .retain(|(location, _)| *location != ParameterLocation::Path);
        }

        ParameterMutator::new(self.parameters.parameters()).mutate(request)?;

        if !self.allow_unknown_query_parameters {
            self.check_query(&request.query)?;
        }

        let mut data = Map::new();
        data.insert("query".into(), Value::Object(std::mem::take(&mut request.query)));
        data.insert("headers".into(), Value::Object(std::mem::take(&mut request.headers)));
        data.insert("params".into(), Value::Object(std::mem::take(&mut request.params)));
        data.insert("cookies".into(), Value::Object(request.all_cookies()));
        if let Some(body) = request.body.take() {
            data.insert("body".into(), body);
        }
        let mut data = Value::Object(data);

        let outcome = self.compiled.validate(&mut data);

        if let Value::Object(mut data) = data {
            let mut field = |name: &str| match data.remove(name) {
                Some(Value::Object(map)) => map,
                _ => Map::new(),
            };
            request.query = field("query");
            request.headers = field("headers");
            request.params = field("params");
            let cookies = field("cookies");
            for (name, value) in cookies {
                if request.signed_cookies.contains_key(&name) {
                    request.signed_cookies.insert(name, value);
                } else {
                    request.cookies.insert(name, value);
                }
            }
            request.body = data.remove("body");
        }

        outcome.map_err(|errors| {
            let err = ValidationError::from_engine_errors(
                ErrorKind::RequestSchemaViolation,
                &errors,
                "request",
            );
            tracing::debug!(
                method = %request.method,
                path = %request.path,
                errors = err.errors.len(),
                "request failed validation"
            );
            err
        })
    }

    fn check_query(&self, query: &Map<String, Value>) -> Result<(), ValidationError> {
        let declared = self.parameters.location(ParameterLocation::Query);
        for (key, value) in query {
            if !declared.declares(key) && !self.security_query_keys.contains(key) {
                return Err(ValidationError::new(
                    ErrorKind::UnknownQueryParameter,
                    format!(".query.{key}"),
                    format!("Unknown query parameter '{key}'"),
                ));
            }
            if value.as_str() == Some("") && !declared.allow_empty.contains(key) {
                return Err(ValidationError::new(
                    ErrorKind::EmptyQueryParameter,
                    format!(".query.{key}"),
                    format!("Empty value found for query parameter '{key}'"),
                ));
            }
        }
        Ok(())
    }
}

/// Build the validator for one operation and request content type.
pub fn build_route_validator(
    doc: &ApiDocument,
    route: &str,
    operation: &Operation,
    content_type: &ContentType,
    options: &RequestOptions,
    compiler: &dyn SchemaCompiler,
    body_resolver: &dyn BodySchemaResolver,
) -> Result<RouteValidator, ValidationError> {
    let parameters = ParameterSchemas::parse(&operation.parameters, doc)?;
    let body = body_resolver.resolve(route, operation, content_type)?;

    let mut properties = parameters.to_properties();
    let body_required = body.required && !body.is_binary();
    properties.insert(
        "body".into(),
        if body.is_binary() { json!({}) } else { body.schema },
    );

    let mut required = vec!["query", "headers", "params"];
    if body_required {
        required.push("body");
    }

    let mut components = doc.components();
    strip_read_only_required(&mut components, doc);
    let schema = json!({
        "required": required,
        "properties": properties,
        "components": components,
    });

    let compiled = compiler.compile(&schema).map_err(|e| {
        tracing::error!(route, error = %e, "request schema failed to compile");
        ValidationError::schema_compilation(route, e)
    })?;

    Ok(RouteValidator {
        security_query_keys: security::query_api_keys(doc, operation).into_iter().collect(),
        allow_unknown_query_parameters: options.allow_unknown_query_parameters,
        parameters,
        schema,
        compiled,
    })
}

/// Validates requests against an API document.
pub struct RequestValidator {
    doc: Arc<ApiDocument>,
    options: RequestOptions,
    compiler: Arc<dyn SchemaCompiler>,
    body_resolver: Arc<dyn BodySchemaResolver>,
    cache: ValidatorCache<RouteValidator>,
}

impl std::fmt::Debug for RequestValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestValidator")
            .field("options", &self.options)
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl RequestValidator {
    /// A validator using the `jsonschema` engine and the document's request
    /// bodies, configured from `options`.
    pub fn new(doc: Arc<ApiDocument>, options: &ValidatorOptions) -> Self {
        Self {
            compiler: Arc::new(JsonSchemaCompiler::new(options.request_engine())),
            body_resolver: Arc::new(RequestBodyResolver::new(Arc::clone(&doc))),
            options: options.validate_requests.clone().unwrap_or_default(),
            cache: ValidatorCache::new(),
            doc,
        }
    }

    /// Replace the schema compiler.
    pub fn with_compiler(mut self, compiler: Arc<dyn SchemaCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Replace the body schema resolver.
    pub fn with_body_resolver(mut self, resolver: Arc<dyn BodySchemaResolver>) -> Self {
        self.body_resolver = resolver;
        self
    }

    /// Number of compiled route validators.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Validate `request`, normalizing it in place.
    ///
    /// Requests without a routing context pass untouched.
    ///
    /// # Errors
    ///
    /// 404 without a matched route, 405 without an operation, 415 for an
    /// unsupported body media type, 400 for parameter and schema failures.
    pub fn validate(&self, request: &mut ApiRequest) -> Result<(), ValidationError> {
        let Some(context) = &request.openapi else {
            return Ok(());
        };
        let Some(route) = context.matched_route.clone() else {
            return Err(ValidationError::route_not_found(&request.path));
        };
        let Some(operation) = context.operation.clone() else {
            return Err(ValidationError::method_not_allowed(&request.path, &request.method));
        };

        let content_type = ContentType::parse(request.header("content-type"));
        let key = format!("{}-{}-{}", request.method, route, content_type.cache_key());

        let validator = self.cache.get_or_try_insert_with(&key, || {
            tracing::debug!(cache_key = %key, "compiling request validator");
            build_route_validator(
                &self.doc,
                &route,
                &operation,
                &content_type,
                &self.options,
                self.compiler.as_ref(),
                self.body_resolver.as_ref(),
            )
        })?;
        validator.validate(request)
    }
}
