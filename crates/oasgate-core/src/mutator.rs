//! # Parameter Mutator
//!
//! Rewrites a request's query, headers, path parameters and cookies in place
//! so that values serialized with an OpenAPI `style`/`explode` combination
//! become the structured JSON values their schemas describe. Runs before
//! validation.
//!
//! Every rewrite only fires on values that are still raw (strings, or
//! flattened sibling keys), and JSON decoding is recorded on the request,
//! so running the mutator on an already-normalized request changes nothing.

use serde_json::{Map, Value};

use crate::error::{ErrorKind, ValidationError};
use crate::parameters::{ParameterLocation, ResolvedParameter};
use crate::request::ApiRequest;
use crate::schema::SchemaNode;

/// Delimiter of a non-exploded array for `style`.
pub fn array_delimiter(style: &str) -> Option<char> {
    match style {
        "form" | "simple" => Some(','),
        "spaceDelimited" => Some(' '),
        "pipeDelimited" => Some('|'),
        _ => None,
    }
}

/// Parse `value` as JSON. Failure is not an error: the raw value stays and
/// the schema check reports the mismatch.
pub fn try_parse(value: &str) -> Option<Value> {
    serde_json::from_str(value).ok()
}

/// Applies a route's parameter declarations to requests.
#[derive(Debug, Clone, Copy)]
pub struct ParameterMutator<'a> {
    parameters: &'a [ResolvedParameter],
}

impl<'a> ParameterMutator<'a> {
    /// A mutator for the given declarations.
    pub fn new(parameters: &'a [ResolvedParameter]) -> Self {
        Self { parameters }
    }

    /// Normalize `request` in declaration order.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::MalformedArrayStyle`] when a non-exploded array declares
    /// a style without a delimiter.
    pub fn mutate(&self, request: &mut ApiRequest) -> Result<(), ValidationError> {
        for parameter in self.parameters {
            let location = parameter.location;
            let undecoded = !request.is_decoded(location, &parameter.name);
            let field = request.location_mut(location);
            let is_form_explode = parameter.style == "form" && parameter.explode;
            let is_array = parameter.schema_type.as_deref() == Some("array");
            let mut decoded = false;

            if parameter.json_content {
                decoded = undecoded && parse_json_in_place(field, &parameter.name);
            } else if location == ParameterLocation::Query && parameter.node.is_object_like() {
                decoded = undecoded && parse_json_in_place(field, &parameter.name);
                if is_form_explode {
                    explode_object(field, &parameter.name, &parameter.node);
                }
                // deepObject values arrive bracket-decoded already.
            } else if is_array && !parameter.explode {
                let delimiter = array_delimiter(&parameter.style).ok_or_else(|| {
                    ValidationError::new(
                        ErrorKind::MalformedArrayStyle,
                        format!(".{}.{}", location.field(), parameter.name),
                        format!(
                            "Parameter 'style' has incorrect value '{}' for [{}]",
                            parameter.style, parameter.name
                        ),
                    )
                })?;
                split_array(field, &parameter.name, delimiter);
            } else if is_array {
                wrap_array(field, &parameter.name);
            } else if is_form_explode {
                explode_object(field, &parameter.name, &parameter.node);
            }

            if decoded {
                request.decoded.insert((location, parameter.name.clone()));
            }
        }
        Ok(())
    }
}

/// Replace a raw string with its JSON parse; true when it was replaced.
fn parse_json_in_place(field: &mut Map<String, Value>, name: &str) -> bool {
    let Some(Value::String(raw)) = field.get(name) else {
        return false;
    };
    if raw.is_empty() {
        return false;
    }
    match try_parse(raw) {
        Some(parsed) => {
            field.insert(name.to_string(), parsed);
            true
        }
        None => false,
    }
}

fn split_array(field: &mut Map<String, Value>, name: &str, delimiter: char) {
    if let Some(value) = field.get_mut(name) {
        if let Value::String(raw) = value {
            if !raw.is_empty() {
                let items = raw
                    .split(delimiter)
                    .map(|item| Value::String(item.to_string()))
                    .collect();
                *value = Value::Array(items);
            }
        }
    }
}

fn wrap_array(field: &mut Map<String, Value>, name: &str) {
    if let Some(value) = field.get_mut(name) {
        let is_raw = match value {
            Value::Array(_) => false,
            Value::String(raw) => !raw.is_empty(),
            _ => true,
        };
        if is_raw {
            let single = std::mem::take(value);
            *value = Value::Array(vec![single]);
        }
    }
}

/// Gather flattened sibling keys (`?r=1&g=2` for an exploded `color`) into
/// the named object. Nothing is synthesized when no sibling is present.
fn explode_object(field: &mut Map<String, Value>, name: &str, node: &SchemaNode) {
    let properties = node.exploded_property_names();
    if !properties.iter().any(|p| p != name && field.contains_key(p)) {
        return;
    }

    let mut object = Map::new();
    for property in &properties {
        if property == name {
            continue;
        }
        let Some(value) = field.remove(property) else {
            continue;
        };
        let value = match (node.property_type(property), value) {
            (Some("array"), Value::Array(items)) => Value::Array(items),
            (Some("array"), scalar) => Value::Array(vec![scalar]),
            (_, value) => value,
        };
        object.insert(property.clone(), value);
    }
    field.insert(name.to_string(), Value::Object(object));
}
