//! # Validation Errors
//!
//! The error contract surfaced to the HTTP layer: a status code plus an
//! ordered list of `{path, message, errorCode}` items. Every failure the
//! engine can raise is one [`ValidationError`]; its [`ErrorKind`] fixes the
//! status code.
//!
//! Engine-native errors (see [`crate::compiler::EngineError`]) are
//! translated here, so the JSON Schema backend never leaks into the
//! contract.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compiler::EngineError;

/// Classification of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The request carries a context but no route matched (404).
    RouteNotFound,
    /// A route matched but declares no operation for the method (405).
    MethodNotAllowed,
    /// A parameter declares an `in` outside query/header/path/cookie (400).
    InvalidParameterLocation,
    /// An array parameter declares a style without a delimiter (400).
    MalformedArrayStyle,
    /// Strict mode and an undeclared query key is present (400).
    UnknownQueryParameter,
    /// Empty value for a query parameter without `allowEmptyValue` (400).
    EmptyQueryParameter,
    /// No request body media type matches the request (415).
    UnsupportedMediaType,
    /// The compiled request validator rejected the request (400).
    RequestSchemaViolation,
    /// The outgoing response breaks the contract (500).
    ResponseContractViolation,
    /// A schema taken from the document could not be compiled (500).
    SchemaCompilation,
}

impl ErrorKind {
    /// HTTP status code reported for this kind.
    pub fn status(self) -> u16 {
        match self {
            Self::RouteNotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::UnsupportedMediaType => 415,
            Self::InvalidParameterLocation
            | Self::MalformedArrayStyle
            | Self::UnknownQueryParameter
            | Self::EmptyQueryParameter
            | Self::RequestSchemaViolation => 400,
            Self::ResponseContractViolation | Self::SchemaCompilation => 500,
        }
    }

    /// Machine-readable code used in error envelopes.
    pub fn code(self) -> &'static str {
        match self {
            Self::RouteNotFound => "NOT_FOUND",
            Self::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            Self::InvalidParameterLocation => "INVALID_PARAMETER_LOCATION",
            Self::MalformedArrayStyle => "MALFORMED_ARRAY_STYLE",
            Self::UnknownQueryParameter => "UNKNOWN_QUERY_PARAMETER",
            Self::EmptyQueryParameter => "EMPTY_QUERY_PARAMETER",
            Self::UnsupportedMediaType => "UNSUPPORTED_MEDIA_TYPE",
            Self::RequestSchemaViolation => "REQUEST_VALIDATION_ERROR",
            Self::ResponseContractViolation => "RESPONSE_VALIDATION_ERROR",
            Self::SchemaCompilation => "SCHEMA_COMPILATION_ERROR",
        }
    }
}

/// One entry of a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorItem {
    /// Dotted data path, e.g. `.query.limit` or `.response.items[0].id`.
    pub path: String,
    /// Human-readable description.
    pub message: String,
    /// `<keyword>.openapi.validation` for schema failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

/// A validation failure: status, kind, summary message and the ordered
/// error list. Always constructed whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    /// HTTP status to report.
    pub status: u16,
    /// Failure classification.
    pub kind: ErrorKind,
    /// Summary message (all items joined for schema failures).
    pub message: String,
    /// Individual errors, in engine order.
    pub errors: Vec<ErrorItem>,
}

impl ValidationError {
    /// A failure with a single error item.
    pub fn new(kind: ErrorKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: kind.status(),
            kind,
            errors: vec![ErrorItem {
                path: path.into(),
                message: message.clone(),
                error_code: None,
            }],
            message,
        }
    }

    /// 404 for a request path no declared route matches.
    pub fn route_not_found(path: &str) -> Self {
        Self::new(ErrorKind::RouteNotFound, path, "not found")
    }

    /// 405 for a route without an operation for `method`.
    pub fn method_not_allowed(path: &str, method: &str) -> Self {
        Self::new(
            ErrorKind::MethodNotAllowed,
            path,
            format!("{method} method not allowed"),
        )
    }

    /// 500 for a schema the engine refused to compile.
    pub fn schema_compilation(path: &str, reason: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorKind::SchemaCompilation,
            path,
            format!("schema compilation failed: {reason}"),
        )
    }

    /// Translate engine errors into the contract.
    ///
    /// `enum` errors get their allowed values appended to the message;
    /// `required` and `additionalProperties` errors point at the offending
    /// property rather than its parent. `data_var` prefixes the summary
    /// message (`request`, or empty for responses).
    pub fn from_engine_errors(kind: ErrorKind, errors: &[EngineError], data_var: &str) -> Self {
        let items: Vec<ErrorItem> = errors.iter().map(translate_engine_error).collect();

        let message = items
            .iter()
            .map(|item| format!("{data_var}{} {}", item.path, item.message))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            status: kind.status(),
            kind,
            message,
            errors: items,
        }
    }

    /// Machine-readable code of the kind.
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }
}

fn translate_engine_error(error: &EngineError) -> ErrorItem {
    let data_path = pointer_to_dotted(&error.instance_path);

    let missing = error.params.get("missingProperty").and_then(|v| v.as_str());
    let additional = error
        .params
        .get("additionalProperty")
        .and_then(|v| v.as_str());

    let path = match (missing, additional) {
        (Some(property), _) | (None, Some(property)) => format!("{data_path}.{property}"),
        (None, None) if !data_path.is_empty() => data_path,
        (None, None) => pointer_to_dotted(&error.schema_path),
    };

    let message = match error.params.get("allowedValues").and_then(|v| v.as_array()) {
        Some(allowed) if error.keyword == "enum" => {
            let values: Vec<String> = allowed.iter().map(display_scalar).collect();
            format!("{}: {}", error.message, values.join(", "))
        }
        _ => error.message.clone(),
    };

    ErrorItem {
        path,
        message,
        error_code: Some(format!("{}.openapi.validation", error.keyword)),
    }
}

/// Convert a JSON pointer (`/query/items/0`) into the dotted form
/// (`.query.items[0]`) used in error paths.
pub fn pointer_to_dotted(pointer: &str) -> String {
    let mut out = String::new();
    for segment in pointer.split('/').skip(1) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(&segment);
            out.push(']');
        } else {
            out.push('.');
            out.push_str(&segment);
        }
    }
    out
}

fn display_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
