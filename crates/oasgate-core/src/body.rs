//! # Request Body Schemas
//!
//! Resolves the schema a request body is validated against, given the
//! operation and the request's content type. [`BodySchemaResolver`] is the
//! seam; [`RequestBodyResolver`] is the default implementation working
//! from the API document.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::content_type::{has_type, wildcard_type, ContentType};
use crate::document::{ApiDocument, Operation};
use crate::error::{ErrorKind, ValidationError};

/// The resolved body schema of one (operation, content type).
#[derive(Debug, Clone, PartialEq)]
pub struct BodySchema {
    /// Schema for the body.
    pub schema: Value,
    /// Whether a body must be sent.
    pub required: bool,
    /// The schema's `format`; `binary` bodies are not schema-validated.
    pub format: Option<String>,
}

impl BodySchema {
    /// No request body declared.
    pub fn none() -> Self {
        Self {
            schema: json!({}),
            required: false,
            format: None,
        }
    }

    /// `format: binary`.
    pub fn is_binary(&self) -> bool {
        self.format.as_deref() == Some("binary")
    }
}

/// Resolves request body schemas.
pub trait BodySchemaResolver: Send + Sync {
    /// The body schema of `operation` for `content_type`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::UnsupportedMediaType`] when the operation declares a
    /// body and no declared media type matches.
    fn resolve(
        &self,
        route: &str,
        operation: &Operation,
        content_type: &ContentType,
    ) -> Result<BodySchema, ValidationError>;
}

/// [`BodySchemaResolver`] over an [`ApiDocument`].
///
/// Media types match by [`ContentType::equivalents`] (case-insensitive),
/// then by wildcard keys, most specific first (`text/*` before `*/*`).
/// `readOnly` properties are dropped from `required` lists, since clients
/// do not send them.
#[derive(Debug, Clone)]
pub struct RequestBodyResolver {
    doc: Arc<ApiDocument>,
}

impl RequestBodyResolver {
    /// A resolver for `doc`.
    pub fn new(doc: Arc<ApiDocument>) -> Self {
        Self { doc }
    }

    fn match_media<'a>(
        content: &'a serde_json::Map<String, Value>,
        content_type: &ContentType,
    ) -> Option<&'a Value> {
        for equivalent in content_type.equivalents() {
            if let Some((_, media)) = content
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(&equivalent))
            {
                return Some(media);
            }
        }

        let media_type = content_type.media_type()?.to_ascii_lowercase();
        let mut wildcards: Vec<&String> = content
            .keys()
            .filter(|key| key.as_str() == "*/*" || wildcard_type(key).is_some())
            .collect();
        wildcards.sort_unstable_by(|a, b| b.cmp(a));

        wildcards
            .into_iter()
            .find(|key| match wildcard_type(key) {
                Some(kind) => has_type(&media_type, kind),
                None => true,
            })
            .and_then(|key| content.get(key))
    }
}

impl BodySchemaResolver for RequestBodyResolver {
    fn resolve(
        &self,
        route: &str,
        operation: &Operation,
        content_type: &ContentType,
    ) -> Result<BodySchema, ValidationError> {
        let Some(raw) = &operation.request_body else {
            return Ok(BodySchema::none());
        };
        let request_body = self.doc.dereference(raw);
        let required = request_body
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let content = request_body
            .get("content")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let Some(media) = Self::match_media(&content, content_type) else {
            if !content_type.is_provided() && !required {
                return Ok(BodySchema::none());
            }
            let message = match content_type.raw() {
                Some(raw) => format!("unsupported media type {raw}"),
                None => "media type not specified".to_string(),
            };
            tracing::debug!(route, %message, "no request body media type matched");
            return Err(ValidationError::new(
                ErrorKind::UnsupportedMediaType,
                ".headers.content-type",
                message,
            ));
        };

        let mut schema = media.get("schema").cloned().unwrap_or_else(|| json!({}));
        strip_read_only_required(&mut schema, &self.doc);
        let format = self
            .doc
            .dereference(&schema)
            .get("format")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(BodySchema {
            schema,
            required,
            format,
        })
    }
}

/// Remove `readOnly` properties from every `required` list in `schema`.
/// Property schemas are dereferenced against `doc` to see the flag.
pub fn strip_read_only_required(schema: &mut Value, doc: &ApiDocument) {
    match schema {
        Value::Object(map) => {
            let read_only: Vec<String> = map
                .get("properties")
                .and_then(Value::as_object)
                .map(|properties| {
                    properties
                        .iter()
                        .filter(|(_, p)| {
                            doc.dereference(p).get("readOnly").and_then(Value::as_bool) == Some(true)
                        })
                        .map(|(name, _)| name.clone())
                        .collect()
                })
                .unwrap_or_default();
            if !read_only.is_empty() {
                if let Some(Value::Array(required)) = map.get_mut("required") {
                    required.retain(|r| r.as_str().is_some_and(|r| !read_only.iter().any(|n| n == r)));
                }
            }
            for (key, child) in map.iter_mut() {
                if !matches!(key.as_str(), "enum" | "const" | "default" | "example" | "examples") {
                    strip_read_only_required(child, doc);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(|item| strip_read_only_required(item, doc)),
        _ => {}
    }
}
