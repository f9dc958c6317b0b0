//! # OpenAPI Schema Dialect
//!
//! OpenAPI 3.0 schema objects are a superset/subset of JSON Schema. Before
//! a schema reaches the engine, the OpenAPI-only constructs are rewritten
//! into their JSON Schema equivalents:
//!
//! - `nullable: true` adds `"null"` to `type` (and to `enum`, if present).
//! - Draft 4 style boolean `exclusiveMinimum`/`exclusiveMaximum` become the
//!   numeric form.
//!
//! Values under data-carrying keywords (`enum`, `const`, `default`,
//! `example`, `examples`) are left untouched.

use serde_json::{Map, Value};

const DATA_KEYWORDS: [&str; 5] = ["enum", "const", "default", "example", "examples"];

/// Rewrite `schema` in place.
pub fn translate(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            translate_nullable(map);
            translate_exclusive_bound(map, "exclusiveMinimum", "minimum");
            translate_exclusive_bound(map, "exclusiveMaximum", "maximum");
            for (key, child) in map.iter_mut() {
                if !DATA_KEYWORDS.contains(&key.as_str()) {
                    translate(child);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(translate),
        _ => {}
    }
}

fn translate_nullable(map: &mut Map<String, Value>) {
    if map.get("nullable").and_then(Value::as_bool) != Some(true) {
        return;
    }
    map.remove("nullable");

    match map.get_mut("type") {
        Some(Value::String(t)) => {
            let t = std::mem::take(t);
            map.insert(
                "type".to_string(),
                Value::Array(vec![Value::String(t), Value::String("null".into())]),
            );
        }
        Some(Value::Array(types)) => {
            if !types.iter().any(|t| t == "null") {
                types.push(Value::String("null".into()));
            }
        }
        _ => {}
    }

    if let Some(Value::Array(values)) = map.get_mut("enum") {
        if !values.iter().any(Value::is_null) {
            values.push(Value::Null);
        }
    }
}

fn translate_exclusive_bound(map: &mut Map<String, Value>, exclusive: &str, bound: &str) {
    match map.get(exclusive).and_then(Value::as_bool) {
        Some(true) => {
            if let Some(limit) = map.remove(bound) {
                map.insert(exclusive.to_string(), limit);
            } else {
                map.remove(exclusive);
            }
        }
        Some(false) => {
            map.remove(exclusive);
        }
        None => {}
    }
}
