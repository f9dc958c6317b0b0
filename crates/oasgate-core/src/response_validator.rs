//! # Response Validation
//!
//! For each operation a [`ResponseTable`] maps declared status keys
//! (`200`, `4XX`, `default`) to compiled validators per response content
//! type. Outgoing bodies are checked against the entry selected by status
//! and content type; failures are contract violations (500).
//!
//! Content types are selected exactly, then by `*/*`, then by a matching
//! `type/*`, then by falling back to the first declared content type.
//! The last step is a compatibility behaviour, not strict negotiation.
//!
//! Tables are cached per `METHOD-route`: a table covers every status and
//! content type of its operation, so neither the URL nor the content type
//! needs to be part of the key.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::cache::ValidatorCache;
use crate::compiler::{CompiledSchema, JsonSchemaCompiler, SchemaCompiler};
use crate::config::ValidatorOptions;
use crate::content_type::{is_json_content_type, is_wildcard, wildcard_type, ContentType};
use crate::document::{ApiDocument, Operation};
use crate::error::{ErrorKind, ValidationError};
use crate::request::ApiRequest;

/// Compiled validators of one declared response, by content type in
/// declaration order.
#[derive(Clone, Default)]
pub struct ResponseEntry {
    validators: IndexMap<String, Arc<dyn CompiledSchema>>,
}

impl std::fmt::Debug for ResponseEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.validators.keys()).finish()
    }
}

impl ResponseEntry {
    /// Content types with a validator.
    pub fn content_types(&self) -> impl Iterator<Item = &str> {
        self.validators.keys().map(String::as_str)
    }

    /// The validator for `content_type`, with the key it was found under.
    pub fn select(&self, content_type: &ContentType) -> Option<(&str, &Arc<dyn CompiledSchema>)> {
        let exact = std::iter::once(content_type.response_key()).chain(content_type.equivalents());
        for candidate in exact {
            if let Some((key, validator)) = self
                .validators
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&candidate))
            {
                return Some((key.as_str(), validator));
            }
        }

        if let Some((key, validator)) = self.validators.get_key_value("*/*") {
            return Some((key.as_str(), validator));
        }

        if let Some(kind) = content_type
            .media_type()
            .and_then(|m| m.split_once('/'))
            .map(|(kind, _)| kind.to_ascii_lowercase())
        {
            if let Some((key, validator)) = self
                .validators
                .iter()
                .find(|(key, _)| wildcard_type(key) == Some(kind.as_str()))
            {
                return Some((key.as_str(), validator));
            }
        }

        self.validators
            .first()
            .map(|(key, validator)| (key.as_str(), validator))
    }
}

/// Compiled validators of one operation, by status key in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ResponseTable {
    entries: IndexMap<String, ResponseEntry>,
}

impl ResponseTable {
    /// Compile every validatable content type of every declared response.
    pub fn build(
        doc: &ApiDocument,
        operation: &Operation,
        compiler: &dyn SchemaCompiler,
    ) -> Result<Self, ValidationError> {
        let components = doc.components();
        let mut entries = IndexMap::new();

        for (status, response) in &operation.responses {
            let response = doc.dereference(response);
            let mut entry = ResponseEntry::default();

            let content = response.get("content").and_then(Value::as_object);
            for (content_type, media) in content.into_iter().flatten() {
                if !is_validatable(content_type) {
                    continue;
                }
                let schema = json!({
                    "type": "object",
                    "properties": {
                        "response": media.get("schema").cloned().unwrap_or_else(|| json!({})),
                    },
                    "components": components,
                });
                let compiled = compiler.compile(&schema).map_err(|e| {
                    tracing::error!(status = %status, content_type = %content_type, error = %e, "response schema failed to compile");
                    ValidationError::schema_compilation(".response", e)
                })?;
                entry.validators.insert(content_type.clone(), compiled);
            }
            entries.insert(status.clone(), entry);
        }
        Ok(Self { entries })
    }

    /// Declared status keys.
    pub fn statuses(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The entry for `status`: exact, then `NXX`, then `default`.
    ///
    /// # Errors
    ///
    /// 500 when none of them is declared.
    pub fn select(&self, status: u16) -> Result<&ResponseEntry, ValidationError> {
        let exact = status.to_string();
        let class = format!("{}XX", status / 100);
        self.entries
            .get(&exact)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(&class))
                    .map(|(_, entry)| entry)
            })
            .or_else(|| self.entries.get("default"))
            .ok_or_else(|| {
                ValidationError::new(
                    ErrorKind::ResponseContractViolation,
                    ".response",
                    format!("no schema defined for status code '{status}' in the openapi spec"),
                )
            })
    }
}

/// JSON media types and wildcards can be checked; anything else cannot.
pub fn is_validatable(content_type: &str) -> bool {
    is_wildcard(content_type) || matches!(is_json_content_type(content_type), Ok(true))
}

/// Validates responses against an API document.
pub struct ResponseValidator {
    doc: Arc<ApiDocument>,
    compiler: Arc<dyn SchemaCompiler>,
    cache: ValidatorCache<ResponseTable>,
}

impl std::fmt::Debug for ResponseValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseValidator")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ResponseValidator {
    /// A validator using the `jsonschema` engine, configured from `options`.
    pub fn new(doc: Arc<ApiDocument>, options: &ValidatorOptions) -> Self {
        Self {
            doc,
            compiler: Arc::new(JsonSchemaCompiler::new(options.response_engine())),
            cache: ValidatorCache::new(),
        }
    }

    /// Replace the schema compiler.
    pub fn with_compiler(mut self, compiler: Arc<dyn SchemaCompiler>) -> Self {
        self.compiler = compiler;
        self
    }

    /// Number of compiled response tables.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// The response table of `request`'s operation.
    fn table(&self, request: &ApiRequest, route: &str, operation: &Operation) -> Result<Arc<ResponseTable>, ValidationError> {
        let key = format!("{}-{}", request.method, route);
        self.cache.get_or_try_insert_with(&key, || {
            tracing::debug!(cache_key = %key, "compiling response validators");
            ResponseTable::build(&self.doc, operation, self.compiler.as_ref())
        })
    }

    /// Check an outgoing response.
    ///
    /// `body` is the parsed body, `None` when the response has none; it may
    /// be normalized in place (`removeAdditional`). Requests without a
    /// routing context or operation pass.
    ///
    /// # Errors
    ///
    /// 500 when the status has no declared response, when a body is
    /// required but missing, or when the body breaks the schema.
    pub fn validate(
        &self,
        request: &ApiRequest,
        status: u16,
        content_type: Option<&str>,
        body: Option<&mut Value>,
    ) -> Result<(), ValidationError> {
        let Some(context) = &request.openapi else {
            return Ok(());
        };
        let (Some(route), Some(operation)) = (&context.matched_route, &context.operation) else {
            return Ok(());
        };

        let table = self.table(request, route, operation)?;
        let entry = table.select(status)?;
        let content_type = ContentType::parse(content_type);

        let Some((selected, validator)) = entry.select(&content_type) else {
            tracing::warn!(
                route = %route,
                status,
                content_type = %content_type.response_key(),
                "no validator for response content type, skipping"
            );
            return Ok(());
        };

        let Some(body) = body else {
            return Err(ValidationError::new(
                ErrorKind::ResponseContractViolation,
                ".response",
                "response body required.",
            ));
        };

        if let Some(raw) = content_type.raw() {
            match is_json_content_type(raw) {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(route = %route, status, content_type = raw, "response content type is not JSON, skipping");
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(route = %route, status, content_type = raw, error = %e, "cannot parse response content type, skipping");
                    return Ok(());
                }
            }
        }

        let mut data = json!({ "response": std::mem::take(body) });
        let outcome = validator.validate(&mut data);
        if let Some(normalized) = data.get_mut("response") {
            *body = std::mem::take(normalized);
        }

        outcome.map_err(|errors| {
            let err = ValidationError::from_engine_errors(ErrorKind::ResponseContractViolation, &errors, "");
            tracing::info!(
                route = %route,
                status,
                content_type = selected,
                errors = err.errors.len(),
                "response failed validation"
            );
            err
        })
    }
}
