//! # API Document
//!
//! Read-only access to a loaded OpenAPI 3 document. Loading and bundling
//! are the loader's job; this module only parses the loader's output
//! (JSON or YAML text, or an already-built value) and resolves local
//! `$ref` pointers on demand.
//!
//! YAML documents routinely key responses by bare integers (`200:`), which
//! `serde_json` cannot represent as map keys, so YAML is converted value by
//! value rather than deserialized straight into JSON.

use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

/// Nesting limit when following `$ref` chains.
const MAX_REF_DEPTH: usize = 32;

/// Errors loading an API document.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The document file could not be read.
    #[error("cannot read document '{path}': {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid JSON.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// The document is not valid YAML.
    #[error("invalid YAML document: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// YAML content without a JSON equivalent.
    #[error("YAML-to-JSON conversion failed: {0}")]
    Conversion(String),

    /// The document root is not an object.
    #[error("document root must be an object")]
    NotAnObject,
}

/// One operation (method on a path) of the document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    /// Operation identifier, if declared.
    #[serde(default)]
    pub operation_id: Option<String>,
    /// Parameter objects or `$ref`s, in declaration order.
    #[serde(default)]
    pub parameters: Vec<Value>,
    /// Request body object or `$ref`.
    #[serde(default)]
    pub request_body: Option<Value>,
    /// Status code / `NXX` / `default` → response object, in declaration order.
    #[serde(default)]
    pub responses: Map<String, Value>,
    /// Security requirements overriding the document's root requirements.
    #[serde(default)]
    pub security: Option<Vec<Map<String, Value>>>,
}

impl Operation {
    /// Deserialize an operation object.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

/// A loaded OpenAPI document.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiDocument {
    root: Value,
}

impl ApiDocument {
    /// Wrap an already-loaded document.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotAnObject`] if the root is not an object.
    pub fn new(root: Value) -> Result<Self, DocumentError> {
        if root.is_object() {
            Ok(Self { root })
        } else {
            Err(DocumentError::NotAnObject)
        }
    }

    /// Parse a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, DocumentError> {
        Self::new(serde_json::from_str(text)?)
    }

    /// Parse a YAML document.
    pub fn from_yaml_str(text: &str) -> Result<Self, DocumentError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(text)?;
        Self::new(yaml_to_json_value(&yaml).map_err(DocumentError::Conversion)?)
    }

    /// Load a document from disk; `.json` files are parsed as JSON,
    /// everything else as YAML.
    pub fn from_path(path: &Path) -> Result<Self, DocumentError> {
        let text = std::fs::read_to_string(path).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// The raw document.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// `components`, or an empty object.
    pub fn components(&self) -> Value {
        self.root
            .get("components")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()))
    }

    /// `paths`, if declared.
    pub fn paths(&self) -> Option<&Map<String, Value>> {
        self.root.get("paths").and_then(Value::as_object)
    }

    /// Root-level security requirements.
    pub fn security(&self) -> Option<&Vec<Value>> {
        self.root.get("security").and_then(Value::as_array)
    }

    /// `components.securitySchemes`.
    pub fn security_schemes(&self) -> Option<&Map<String, Value>> {
        self.root
            .pointer("/components/securitySchemes")
            .and_then(Value::as_object)
    }

    /// Path parts of the `servers[].url` entries, without trailing slashes.
    /// An empty base path is returned when no server declares one.
    pub fn base_paths(&self) -> Vec<String> {
        let mut bases: Vec<String> = self
            .root
            .get("servers")
            .and_then(Value::as_array)
            .map(|servers| {
                servers
                    .iter()
                    .filter_map(|s| s.get("url").and_then(Value::as_str))
                    .map(server_base_path)
                    .collect()
            })
            .unwrap_or_default();
        if bases.is_empty() {
            bases.push(String::new());
        }
        bases.sort();
        bases.dedup();
        bases
    }

    /// Resolve a local reference (`#/components/schemas/Pet`).
    pub fn resolve_ref(&self, reference: &str) -> Option<&Value> {
        let pointer = reference.strip_prefix('#')?;
        self.root.pointer(pointer)
    }

    /// Follow `$ref` until a non-reference value is reached. Unresolvable
    /// or cyclic references yield the last value reached.
    pub fn dereference<'a>(&'a self, mut value: &'a Value) -> &'a Value {
        for _ in 0..MAX_REF_DEPTH {
            let Some(target) = value
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| self.resolve_ref(r))
            else {
                return value;
            };
            value = target;
        }
        value
    }

    /// The operation declared for `method` on `path_template`.
    ///
    /// Path-item level parameters are merged in, unless the operation
    /// overrides them (same `name` and `in`).
    pub fn operation(&self, path_template: &str, method: &str) -> Option<Operation> {
        let item = self.paths()?.get(path_template)?;
        let item = self.dereference(item);
        let mut op = Operation::from_value(item.get(method.to_ascii_lowercase())?).ok()?;

        if let Some(shared) = item.get("parameters").and_then(Value::as_array) {
            let declared: Vec<(Option<&str>, Option<&str>)> =
                op.parameters.iter().map(|p| self.parameter_identity(p)).collect();
            let inherited: Vec<Value> = shared
                .iter()
                .filter(|p| !declared.contains(&self.parameter_identity(p)))
                .cloned()
                .collect();
            op.parameters.splice(0..0, inherited);
        }
        Some(op)
    }

    fn parameter_identity<'a>(&'a self, parameter: &'a Value) -> (Option<&'a str>, Option<&'a str>) {
        let parameter = self.dereference(parameter);
        (
            parameter.get("name").and_then(Value::as_str),
            parameter.get("in").and_then(Value::as_str),
        )
    }
}

fn server_base_path(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.to_string(),
    };
    path.trim_end_matches('/').to_string()
}

/// Convert a `serde_yaml::Value` to a `serde_json::Value`.
///
/// Non-string keys (integers and booleans) become their string form, tags
/// are dropped. Floats without a JSON representation are rejected.
pub(crate) fn yaml_to_json_value(yaml: &serde_yaml::Value) -> Result<Value, String> {
    match yaml {
        serde_yaml::Value::Null => Ok(Value::Null),
        serde_yaml::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Number(i.into()))
            } else if let Some(u) = n.as_u64() {
                Ok(Value::Number(u.into()))
            } else if let Some(f) = n.as_f64() {
                serde_json::Number::from_f64(f)
                    .map(Value::Number)
                    .ok_or_else(|| format!("cannot represent float {f} in JSON"))
            } else {
                Err(format!("unsupported YAML number: {n:?}"))
            }
        }
        serde_yaml::Value::String(s) => Ok(Value::String(s.clone())),
        serde_yaml::Value::Sequence(seq) => seq
            .iter()
            .map(yaml_to_json_value)
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        serde_yaml::Value::Mapping(map) => {
            let mut object = Map::new();
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    serde_yaml::Value::Number(n) => n.to_string(),
                    serde_yaml::Value::Bool(b) => b.to_string(),
                    other => return Err(format!("unsupported YAML map key type: {other:?}")),
                };
                object.insert(key, yaml_to_json_value(v)?);
            }
            Ok(Value::Object(object))
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json_value(&tagged.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PETSTORE_YAML: &str = r#"
openapi: 3.0.3
info: { title: pets, version: "1" }
servers:
  - url: https://api.example.com/v1/
  - url: /v1
paths:
  /pets:
    get:
      operationId: listPets
      parameters:
        - $ref: '#/components/parameters/Limit'
      responses:
        200:
          description: ok
components:
  parameters:
    Limit:
      name: limit
      in: query
      schema: { $ref: '#/components/schemas/Limit' }
  schemas:
    Limit: { type: integer }
"#;

    #[test]
    fn yaml_integer_keys_become_strings() {
        let doc = ApiDocument::from_yaml_str(PETSTORE_YAML).unwrap();
        let op = doc.operation("/pets", "GET").unwrap();
        assert!(op.responses.contains_key("200"));
        assert_eq!(op.operation_id.as_deref(), Some("listPets"));
    }

    #[test]
    fn dereference_follows_chains() {
        let doc = ApiDocument::from_yaml_str(PETSTORE_YAML).unwrap();
        let op = doc.operation("/pets", "get").unwrap();
        let param = doc.dereference(&op.parameters[0]);
        assert_eq!(param["name"], "limit");
        let schema = doc.dereference(&param["schema"]);
        assert_eq!(schema, &json!({"type": "integer"}));
    }

    #[test]
    fn cyclic_refs_terminate() {
        let doc = ApiDocument::new(json!({
            "components": {"schemas": {"A": {"$ref": "#/components/schemas/B"}, "B": {"$ref": "#/components/schemas/A"}}}
        }))
        .unwrap();
        let start = json!({"$ref": "#/components/schemas/A"});
        let end = doc.dereference(&start);
        assert!(end.get("$ref").is_some());
    }

    #[test]
    fn base_paths_from_servers() {
        let doc = ApiDocument::from_yaml_str(PETSTORE_YAML).unwrap();
        assert_eq!(doc.base_paths(), vec!["/v1".to_string()]);

        let bare = ApiDocument::new(json!({"paths": {}})).unwrap();
        assert_eq!(bare.base_paths(), vec![String::new()]);
    }

    #[test]
    fn path_level_parameters_are_inherited() {
        let doc = ApiDocument::new(json!({
            "paths": {"/pets/{id}": {
                "parameters": [
                    {"name": "id", "in": "path", "required": true, "schema": {"type": "string"}},
                    {"name": "trace", "in": "header", "schema": {"type": "string"}}
                ],
                "get": {
                    "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                    "responses": {}
                }
            }}
        }))
        .unwrap();
        let op = doc.operation("/pets/{id}", "get").unwrap();
        assert_eq!(op.parameters.len(), 2);
        assert_eq!(op.parameters[0]["name"], "trace");
        assert_eq!(op.parameters[1]["schema"]["type"], "integer");
    }

    #[test]
    fn non_object_root_rejected() {
        assert!(matches!(
            ApiDocument::new(json!([1, 2])),
            Err(DocumentError::NotAnObject)
        ));
    }

    #[test]
    fn from_path_selects_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let json_path = dir.path().join("api.json");
        std::fs::write(&json_path, r#"{"openapi":"3.0.0","paths":{}}"#).unwrap();
        assert!(ApiDocument::from_path(&json_path).is_ok());

        let yaml_path = dir.path().join("api.yaml");
        std::fs::write(&yaml_path, PETSTORE_YAML).unwrap();
        assert!(ApiDocument::from_path(&yaml_path).unwrap().paths().is_some());

        let missing = dir.path().join("missing.yaml");
        assert!(matches!(
            ApiDocument::from_path(&missing),
            Err(DocumentError::Io { .. })
        ));
    }
}
