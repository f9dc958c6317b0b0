//! # Schema-Guided Normalization
//!
//! Query strings, headers and path segments only carry strings, while the
//! contract declares integers, booleans and arrays. This pass walks an
//! instance alongside its schema and, depending on [`Normalization`]:
//!
//! - coerces scalars to the declared type (`"10"` → `10`, `"true"` →
//!   `true`, `""` → `null`, scalar → one-element array),
//! - fills `default` values of absent properties,
//! - drops properties rejected by `additionalProperties: false`.
//!
//! The walk never fails; anything it cannot normalize is left for the
//! validator to report.

use serde_json::{Map, Number, Value};

/// Depth limit when following `$ref`s and nested schemas.
const MAX_DEPTH: usize = 64;

/// Which normalizations to apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Normalization {
    /// Coerce scalars to the declared type.
    pub coerce_types: bool,
    /// Insert `default` values for absent properties.
    pub use_defaults: bool,
    /// Remove properties not allowed by `additionalProperties: false`.
    pub remove_additional: bool,
}

impl Normalization {
    /// Whether any normalization is enabled.
    pub fn is_enabled(&self) -> bool {
        self.coerce_types || self.use_defaults || self.remove_additional
    }
}

/// Applies a [`Normalization`] against schemas whose `$ref`s resolve in
/// `root`.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    root: &'a Value,
    options: Normalization,
}

impl<'a> Normalizer<'a> {
    /// A normalizer resolving references against `root`.
    pub fn new(root: &'a Value, options: Normalization) -> Self {
        Self { root, options }
    }

    /// Normalize `data` against the root schema.
    pub fn apply(&self, data: &mut Value) {
        if self.options.is_enabled() {
            self.walk(self.root, data, 0);
        }
    }

    fn resolve(&self, mut schema: &'a Value) -> &'a Value {
        for _ in 0..MAX_DEPTH {
            let Some(target) = schema
                .get("$ref")
                .and_then(Value::as_str)
                .and_then(|r| r.strip_prefix('#'))
                .and_then(|pointer| self.root.pointer(pointer))
            else {
                return schema;
            };
            schema = target;
        }
        schema
    }

    fn walk(&self, schema: &'a Value, data: &mut Value, depth: usize) {
        if depth >= MAX_DEPTH {
            return;
        }
        let schema = self.resolve(schema);
        let Some(keywords) = schema.as_object() else {
            return;
        };

        if self.options.coerce_types {
            if let Some(types) = keywords.get("type") {
                coerce_to_types(types, data);
            }
        }

        if let Some(branches) = keywords.get("allOf").and_then(Value::as_array) {
            for branch in branches {
                self.walk(branch, data, depth + 1);
            }
        }
        for keyword in ["oneOf", "anyOf"] {
            if let Some(branches) = keywords.get(keyword).and_then(Value::as_array) {
                self.walk_alternatives(branches, data, depth + 1);
            }
        }

        match data {
            Value::Object(object) => self.walk_object(keywords, object, depth),
            Value::Array(items) => {
                if let Some(item_schema) = keywords.get("items").filter(|s| s.is_object()) {
                    for item in items.iter_mut() {
                        self.walk(item_schema, item, depth + 1);
                    }
                }
            }
            _ => {}
        }
    }

    fn walk_object(&self, keywords: &'a Map<String, Value>, object: &mut Map<String, Value>, depth: usize) {
        let properties = keywords.get("properties").and_then(Value::as_object);

        if let Some(properties) = properties {
            if self.options.use_defaults {
                for (name, property) in properties {
                    if object.contains_key(name) {
                        continue;
                    }
                    if let Some(default) = self.resolve(property).get("default") {
                        object.insert(name.clone(), default.clone());
                    }
                }
            }
            for (name, property) in properties {
                if let Some(value) = object.get_mut(name) {
                    self.walk(property, value, depth + 1);
                }
            }
        }

        let closed = keywords.get("additionalProperties") == Some(&Value::Bool(false));
        if self.options.remove_additional && closed && !keywords.contains_key("patternProperties") {
            object.retain(|name, _| properties.is_some_and(|p| p.contains_key(name)));
        }
    }

    /// For `oneOf`/`anyOf`, scalars adopt the first branch whose declared
    /// type they can be coerced to; containers are walked by every branch.
    fn walk_alternatives(&self, branches: &'a [Value], data: &mut Value, depth: usize) {
        if data.is_object() || data.is_array() {
            for branch in branches {
                self.walk(branch, data, depth);
            }
            return;
        }
        if !self.options.coerce_types {
            return;
        }
        for branch in branches {
            let branch = self.resolve(branch);
            let Some(types) = branch.get("type") else {
                continue;
            };
            if matches_any(types, data) {
                return;
            }
            let mut candidate = data.clone();
            coerce_to_types(types, &mut candidate);
            if matches_any(types, &candidate) {
                *data = candidate;
                return;
            }
        }
    }
}

fn type_names(types: &Value) -> Vec<&str> {
    match types {
        Value::String(t) => vec![t.as_str()],
        Value::Array(ts) => ts.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn matches_any(types: &Value, data: &Value) -> bool {
    type_names(types).into_iter().any(|t| matches_type(t, data))
}

/// Whether `data` is an instance of JSON Schema type `name`.
pub fn matches_type(name: &str, data: &Value) -> bool {
    match name {
        "string" => data.is_string(),
        "number" => data.is_number(),
        "integer" => match data {
            Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
            _ => false,
        },
        "boolean" => data.is_boolean(),
        "null" => data.is_null(),
        "object" => data.is_object(),
        "array" => data.is_array(),
        _ => true,
    }
}

fn coerce_to_types(types: &Value, data: &mut Value) {
    let names = type_names(types);
    if names.is_empty() || names.iter().any(|t| matches_type(t, data)) {
        return;
    }
    for name in names {
        if let Some(coerced) = coerce_scalar(name, data) {
            *data = coerced;
            return;
        }
    }
}

fn coerce_scalar(target: &str, data: &Value) -> Option<Value> {
    match (target, data) {
        ("array", Value::Array(_) | Value::Object(_)) => None,
        ("array", scalar) => Some(Value::Array(vec![scalar.clone()])),
        (_, Value::Array(_) | Value::Object(_)) => None,
        ("number", Value::String(s)) => parse_number(s),
        ("integer", Value::String(s)) => parse_number(s).filter(|n| matches_type("integer", n)),
        ("number" | "integer", Value::Bool(b)) => Some(Value::Number(Number::from(u8::from(*b)))),
        ("number" | "integer", Value::Null) => Some(Value::Number(Number::from(0))),
        ("boolean", Value::String(s)) => match s.as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Null) => Some(Value::Bool(false)),
        ("null", Value::String(s)) if s.is_empty() => Some(Value::Null),
        ("null", Value::Number(n)) if n.as_f64() == Some(0.0) => Some(Value::Null),
        ("null", Value::Bool(false)) => Some(Value::Null),
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),
        ("string", Value::Null) => Some(Value::String(String::new())),
        _ => None,
    }
}

fn parse_number(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    if trimmed.is_empty() || trimmed != s {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::Number(Number::from(i)));
    }
    s.parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(Value::Number)
}
