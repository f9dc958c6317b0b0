//! # Schema Compilation
//!
//! The narrow capability the validators need from a JSON Schema engine:
//! compile a schema document once, then validate instances against it,
//! getting back structured [`EngineError`]s.
//!
//! [`JsonSchemaCompiler`] implements it with the `jsonschema` crate. It
//! also emulates the engine options the validators rely on (type
//! coercion, defaults, removal of additional properties, format policy)
//! and translates the OpenAPI schema dialect first.
//!
//! ## Reference Resolution
//!
//! Compiled documents embed the API document's `components`, so
//! `#/components/...` references resolve natively. Any other URI goes
//! through [`OfflineRetriever`], which never touches the network.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Retrieve, Uri, Validator};
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::coerce::{Normalization, Normalizer};
use crate::config::{FormatValidation, UnknownFormats};
use crate::dialect;

/// Formats OpenAPI defines on top of JSON Schema.
const OPENAPI_FORMATS: [&str; 6] = ["int32", "int64", "float", "double", "binary", "password"];

/// A compiled schema could not be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("validator build error: {reason}")]
pub struct CompileError {
    /// Reason reported by the engine.
    pub reason: String,
}

/// One failure reported by the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineError {
    /// Failing keyword (`type`, `required`, `enum`, ...).
    pub keyword: String,
    /// Engine message.
    pub message: String,
    /// Keyword parameters: `allowedValues`, `missingProperty`,
    /// `additionalProperty`.
    pub params: Value,
    /// JSON pointer to the failing instance location.
    pub instance_path: String,
    /// JSON pointer to the failing schema location.
    pub schema_path: String,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.instance_path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.instance_path, self.message)
        }
    }
}

/// A compiled, reusable validator.
pub trait CompiledSchema: Send + Sync {
    /// Validate `instance`. Implementations may normalize the instance in
    /// place first (type coercion, defaults), as configured at compile time.
    fn validate(&self, instance: &mut Value) -> Result<(), Vec<EngineError>>;
}

/// Compiles schema documents into [`CompiledSchema`]s.
pub trait SchemaCompiler: Send + Sync {
    /// Compile `schema`.
    fn compile(&self, schema: &Value) -> Result<Arc<dyn CompiledSchema>, CompileError>;
}

/// Engine settings for one validator family (requests or responses).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Instance normalization applied before validation.
    pub normalization: Normalization,
    /// Whether `format` is asserted.
    pub validate_formats: FormatValidation,
    /// Policy for formats the engine does not know.
    pub unknown_formats: UnknownFormats,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            validate_formats: FormatValidation::Fast,
            unknown_formats: UnknownFormats::Reject,
        }
    }
}

/// Resolves non-local `$ref` URIs to a permissive schema instead of
/// fetching them.
struct OfflineRetriever;

impl Retrieve for OfflineRetriever {
    fn retrieve(
        &self,
        uri: &Uri<&str>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        tracing::warn!(uri = uri.as_str(), "unresolvable external $ref, accepting any value");
        Ok(json!({}))
    }
}

/// [`SchemaCompiler`] backed by the `jsonschema` crate (Draft 7).
#[derive(Debug, Clone, Default)]
pub struct JsonSchemaCompiler {
    options: EngineOptions,
}

impl JsonSchemaCompiler {
    /// A compiler with the given engine options.
    pub fn new(options: EngineOptions) -> Self {
        Self { options }
    }

    /// The configured options.
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn build_validator(&self, schema: &Value) -> Result<Validator, CompileError> {
        let mut opts = jsonschema::options();
        opts.with_draft(Draft::Draft7);
        opts.with_retriever(OfflineRetriever);
        opts.should_validate_formats(self.options.validate_formats.is_enabled());

        for name in OPENAPI_FORMATS {
            opts.with_format(name, |_: &str| true);
        }
        opts.with_format("byte", |s: &str| STANDARD.decode(s).is_ok());
        // Draft 7 has no `uuid` format of its own.
        opts.with_format("uuid", |s: &str| Uuid::parse_str(s).is_ok());

        match &self.options.unknown_formats {
            UnknownFormats::Reject => {
                opts.should_ignore_unknown_formats(false);
            }
            UnknownFormats::Ignore => {
                opts.should_ignore_unknown_formats(true);
            }
            UnknownFormats::Allow(names) => {
                opts.should_ignore_unknown_formats(false);
                for name in names {
                    opts.with_format(name.clone(), |_: &str| true);
                }
            }
        }

        opts.build(schema).map_err(|e| CompileError {
            reason: e.to_string(),
        })
    }
}

impl SchemaCompiler for JsonSchemaCompiler {
    fn compile(&self, schema: &Value) -> Result<Arc<dyn CompiledSchema>, CompileError> {
        let mut translated = schema.clone();
        dialect::translate(&mut translated);
        let validator = self.build_validator(&translated)?;
        Ok(Arc::new(JsonSchemaValidator {
            schema: translated,
            validator,
            normalization: self.options.normalization,
        }))
    }
}

/// A schema compiled by [`JsonSchemaCompiler`].
struct JsonSchemaValidator {
    schema: Value,
    validator: Validator,
    normalization: Normalization,
}

impl CompiledSchema for JsonSchemaValidator {
    fn validate(&self, instance: &mut Value) -> Result<(), Vec<EngineError>> {
        Normalizer::new(&self.schema, self.normalization).apply(instance);

        let errors: Vec<EngineError> = self
            .validator
            .iter_errors(instance)
            .flat_map(|e| {
                let instance_path = e.instance_path.to_string();
                let schema_path = e.schema_path.to_string();
                let message = e.to_string();
                engine_errors(&e.kind, instance_path, schema_path, message)
            })
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Map one `jsonschema` error to engine errors; additional-property errors
/// fan out to one entry per unexpected property.
fn engine_errors(
    kind: &ValidationErrorKind,
    instance_path: String,
    schema_path: String,
    message: String,
) -> Vec<EngineError> {
    let keyword = schema_path
        .rsplit('/')
        .next()
        .filter(|k| !k.is_empty())
        .unwrap_or("schema")
        .to_string();

    let error = |params: Value, message: String| EngineError {
        keyword: keyword.clone(),
        message,
        params,
        instance_path: instance_path.clone(),
        schema_path: schema_path.clone(),
    };

    match kind {
        ValidationErrorKind::Enum { options } => {
            vec![error(json!({ "allowedValues": options }), message)]
        }
        ValidationErrorKind::Required { property } => {
            vec![error(json!({ "missingProperty": property }), message)]
        }
        ValidationErrorKind::AdditionalProperties { unexpected } => unexpected
            .iter()
            .map(|property| {
                error(
                    json!({ "additionalProperty": property }),
                    "should NOT have additional properties".to_string(),
                )
            })
            .collect(),
        _ => vec![error(json!({}), message)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(schema: Value) -> Arc<dyn CompiledSchema> {
        JsonSchemaCompiler::default().compile(&schema).unwrap()
    }

    #[test]
    fn valid_instance_passes() {
        let v = compile(json!({"type": "object", "properties": {"id": {"type": "integer"}}}));
        assert!(v.validate(&mut json!({"id": 1})).is_ok());
    }

    #[test]
    fn required_error_carries_missing_property() {
        let v = compile(json!({"type": "object", "required": ["name"]}));
        let errors = v.validate(&mut json!({})).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].keyword, "required");
        assert_eq!(errors[0].params["missingProperty"], "name");
    }

    #[test]
    fn enum_error_carries_allowed_values() {
        let v = compile(json!({"type": "object", "properties": {"s": {"enum": ["a", "b"]}}}));
        let errors = v.validate(&mut json!({"s": "c"})).unwrap_err();
        assert_eq!(errors[0].keyword, "enum");
        assert_eq!(errors[0].params["allowedValues"], json!(["a", "b"]));
        assert_eq!(errors[0].instance_path, "/s");
    }

    #[test]
    fn additional_properties_fan_out() {
        let v = compile(json!({"type": "object", "properties": {}, "additionalProperties": false}));
        let errors = v.validate(&mut json!({"x": 1, "y": 2})).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().all(|e| e.keyword == "additionalProperties"));
    }

    #[test]
    fn components_refs_resolve() {
        let v = compile(json!({
            "properties": {"pet": {"$ref": "#/components/schemas/Pet"}},
            "components": {"schemas": {"Pet": {"type": "object", "required": ["id"]}}}
        }));
        assert!(v.validate(&mut json!({"pet": {"id": 1}})).is_ok());
        assert!(v.validate(&mut json!({"pet": {}})).is_err());
    }

    #[test]
    fn nullable_is_honoured() {
        let v = compile(json!({"type": "object", "properties": {"tag": {"type": "string", "nullable": true}}}));
        assert!(v.validate(&mut json!({"tag": null})).is_ok());
    }

    #[test]
    fn openapi_formats_are_known() {
        let v = compile(json!({"type": "object", "properties": {
            "n": {"type": "string", "format": "int64"},
            "b": {"type": "string", "format": "byte"}
        }}));
        assert!(v.validate(&mut json!({"n": "1", "b": "aGVsbG8="})).is_ok());
        assert!(v.validate(&mut json!({"b": "not base64!"})).is_err());
    }

    #[test]
    fn unknown_format_policy() {
        let schema = json!({"type": "string", "format": "x-custom"});
        assert!(JsonSchemaCompiler::default().compile(&schema).is_err());

        let ignoring = JsonSchemaCompiler::new(EngineOptions {
            unknown_formats: UnknownFormats::Ignore,
            ..EngineOptions::default()
        });
        assert!(ignoring.compile(&schema).is_ok());

        let allowing = JsonSchemaCompiler::new(EngineOptions {
            unknown_formats: UnknownFormats::Allow(vec!["x-custom".into()]),
            ..EngineOptions::default()
        });
        assert!(allowing.compile(&schema).is_ok());
    }

    #[test]
    fn coercion_runs_before_validation() {
        let compiler = JsonSchemaCompiler::new(EngineOptions {
            normalization: Normalization {
                coerce_types: true,
                ..Normalization::default()
            },
            ..EngineOptions::default()
        });
        let v = compiler
            .compile(&json!({"type": "object", "properties": {"limit": {"type": "integer"}}}))
            .unwrap();
        let mut data = json!({"limit": "5"});
        assert!(v.validate(&mut data).is_ok());
        assert_eq!(data["limit"], 5);
    }

    #[test]
    fn byte_format_requires_base64() {
        let v = compile(json!({"type": "string", "format": "byte"}));
        assert!(v.validate(&mut json!("aGVsbG8=")).is_ok());
        assert!(v.validate(&mut json!("")).is_ok());
        assert!(v.validate(&mut json!("abc")).is_err());
        assert!(v.validate(&mut json!("a===")).is_err());
    }

    #[test]
    fn uuid_format_is_checked() {
        let v = compile(json!({"type": "string", "format": "uuid"}));
        assert!(v.validate(&mut json!("3fa85f64-5717-4562-b3fc-2c963f66afa6")).is_ok());
        assert!(v.validate(&mut json!("3fa85f64-5717-4562-b3fc")).is_err());
        assert!(v.validate(&mut json!("zfa85f64-5717-4562-b3fc-2c963f66afa6")).is_err());
    }
}
