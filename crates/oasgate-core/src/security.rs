//! Query-carried API keys.
//!
//! Strict query checking must not reject the API key itself when a
//! security scheme carries it in the query string.

use serde_json::Value;

use crate::document::{ApiDocument, Operation};

/// Names of query parameters carrying API keys for `operation`.
///
/// The operation's own `security` applies when it declares a non-empty
/// list; otherwise the document's root `security`. Only `apiKey` schemes
/// with `in: query` contribute.
pub fn query_api_keys(doc: &ApiDocument, operation: &Operation) -> Vec<String> {
    let requirements: Vec<&serde_json::Map<String, Value>> = match &operation.security {
        Some(own) if !own.is_empty() => own.iter().collect(),
        _ => doc
            .security()
            .map(|root| root.iter().filter_map(Value::as_object).collect())
            .unwrap_or_default(),
    };
    let Some(schemes) = doc.security_schemes() else {
        return Vec::new();
    };

    let mut names = Vec::new();
    for scheme_name in requirements.iter().flat_map(|r| r.keys()) {
        let Some(scheme) = schemes.get(scheme_name).map(|s| doc.dereference(s)) else {
            continue;
        };
        let is_query_key = scheme.get("type").and_then(Value::as_str) == Some("apiKey")
            && scheme.get("in").and_then(Value::as_str) == Some("query");
        if let Some(name) = scheme.get("name").and_then(Value::as_str).filter(|_| is_query_key) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}
