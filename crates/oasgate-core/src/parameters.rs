//! # Parameter Schemas
//!
//! Turns an operation's raw parameter list into:
//!
//! - one [`ResolvedParameter`] per declaration, with `$ref`s followed and the
//!   OpenAPI `style`/`explode` defaults applied, for the mutator;
//! - one [`LocationSchema`] per request location (`query`, `headers`,
//!   `params`, `cookies`), for the compiled request validator.
//!
//! Header names are lower-cased, matching how requests carry them.

use std::collections::BTreeSet;
use std::fmt;

use serde_json::{json, Map, Value};

use crate::content_type::MediaType;
use crate::document::ApiDocument;
use crate::error::{ErrorKind, ValidationError};
use crate::schema::SchemaNode;

/// Where a parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ParameterLocation {
    /// `in: query`
    Query,
    /// `in: header`
    Header,
    /// `in: path`
    Path,
    /// `in: cookie`
    Cookie,
}

impl ParameterLocation {
    /// All locations, in validation order.
    pub const ALL: [ParameterLocation; 4] = [Self::Query, Self::Header, Self::Path, Self::Cookie];

    /// Parse an OpenAPI `in` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "header" => Some(Self::Header),
            "path" => Some(Self::Path),
            "cookie" => Some(Self::Cookie),
            _ => None,
        }
    }

    /// Name of the request field holding this location's values.
    pub fn field(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Header => "headers",
            Self::Path => "params",
            Self::Cookie => "cookies",
        }
    }

    /// Serialization style used when a parameter declares none.
    pub fn default_style(self) -> &'static str {
        match self {
            Self::Query | Self::Cookie => "form",
            Self::Header | Self::Path => "simple",
        }
    }
}

impl fmt::Display for ParameterLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Query => "query",
            Self::Header => "header",
            Self::Path => "path",
            Self::Cookie => "cookie",
        })
    }
}

/// A dereferenced parameter declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParameter {
    /// Name as carried by the request (lower-cased for headers).
    pub name: String,
    /// Location.
    pub location: ParameterLocation,
    /// `style`, defaulted per location.
    pub style: String,
    /// `explode`, defaulted per style.
    pub explode: bool,
    /// `required`.
    pub required: bool,
    /// `allowEmptyValue`.
    pub allow_empty_value: bool,
    /// The value schema: `schema`, or the schema of the sole `content` entry.
    pub schema: Value,
    /// Shape of [`schema`](Self::schema).
    pub node: SchemaNode,
    /// The value schema's own `type`, kept even when the schema also
    /// composes others.
    pub schema_type: Option<String>,
    /// The parameter uses `content` with a JSON media type.
    pub json_content: bool,
}

impl ResolvedParameter {
    /// Resolve one raw declaration.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::InvalidParameterLocation`] for an `in` outside the four
    /// locations.
    pub fn resolve(raw: &Value, doc: &ApiDocument) -> Result<Self, ValidationError> {
        let parameter = doc.dereference(raw);
        let declared_name = parameter.get("name").and_then(Value::as_str).unwrap_or_default();
        let declared_in = parameter.get("in").and_then(Value::as_str).unwrap_or_default();

        let location = ParameterLocation::parse(declared_in).ok_or_else(|| {
            ValidationError::new(
                ErrorKind::InvalidParameterLocation,
                format!(".{declared_in}.{declared_name}"),
                format!("Parameter 'in' has incorrect value '{declared_in}' for [{declared_name}]"),
            )
        })?;

        let name = match location {
            ParameterLocation::Header => declared_name.to_ascii_lowercase(),
            _ => declared_name.to_string(),
        };

        let style = parameter
            .get("style")
            .and_then(Value::as_str)
            .unwrap_or_else(|| location.default_style())
            .to_string();
        let explode = parameter
            .get("explode")
            .and_then(Value::as_bool)
            .unwrap_or(style == "form");

        let (schema, json_content) = match parameter.get("content").and_then(Value::as_object) {
            Some(content) => {
                let first = content.iter().next();
                let schema = first
                    .and_then(|(_, entry)| entry.get("schema"))
                    .cloned()
                    .unwrap_or_else(|| json!({}));
                let json = first.is_some_and(|(media, _)| {
                    MediaType::parse(media).is_ok_and(|m| m.is_json())
                });
                (schema, json)
            }
            None => (
                parameter.get("schema").cloned().unwrap_or_else(|| json!({})),
                false,
            ),
        };
        let node = SchemaNode::from_schema(&schema, doc);
        let schema_type = doc
            .dereference(&schema)
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);

        Ok(Self {
            name,
            location,
            style,
            explode,
            required: parameter.get("required").and_then(Value::as_bool).unwrap_or(false),
            allow_empty_value: parameter
                .get("allowEmptyValue")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            schema,
            node,
            schema_type,
            json_content,
        })
    }
}

/// The parameters of one location.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocationSchema {
    /// Parameter name → value schema, in declaration order.
    pub properties: Map<String, Value>,
    /// Required parameter names.
    pub required: Vec<String>,
    /// Names accepting an empty value (`allowEmptyValue`).
    pub allow_empty: BTreeSet<String>,
}

impl LocationSchema {
    /// Whether `name` is declared here.
    pub fn declares(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// The JSON Schema for this location; `{}` when nothing is declared.
    pub fn to_schema(&self) -> Value {
        if self.properties.is_empty() {
            return json!({});
        }
        let mut schema = json!({
            "type": "object",
            "properties": self.properties,
        });
        if !self.required.is_empty() {
            schema["required"] = json!(self.required);
        }
        schema
    }
}

/// Normalized parameter declarations of one operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSchemas {
    parameters: Vec<ResolvedParameter>,
    query: LocationSchema,
    headers: LocationSchema,
    params: LocationSchema,
    cookies: LocationSchema,
}

impl ParameterSchemas {
    /// Normalize an operation's raw parameter list.
    ///
    /// Later declarations of the same name and location replace earlier
    /// ones in the location schema; all declarations are kept, in order,
    /// for the mutator.
    pub fn parse(raw_parameters: &[Value], doc: &ApiDocument) -> Result<Self, ValidationError> {
        let mut schemas = Self::default();
        for raw in raw_parameters {
            let parameter = ResolvedParameter::resolve(raw, doc)?;
            let location = schemas.location_mut(parameter.location);

            location
                .properties
                .insert(parameter.name.clone(), parameter.schema.clone());
            if parameter.required && !location.required.contains(&parameter.name) {
                location.required.push(parameter.name.clone());
            }
            if parameter.location == ParameterLocation::Query && parameter.allow_empty_value {
                location.allow_empty.insert(parameter.name.clone());
            }
            schemas.parameters.push(parameter);
        }
        Ok(schemas)
    }

    /// Declarations, in order.
    pub fn parameters(&self) -> &[ResolvedParameter] {
        &self.parameters
    }

    /// The schema of one location.
    pub fn location(&self, location: ParameterLocation) -> &LocationSchema {
        match location {
            ParameterLocation::Query => &self.query,
            ParameterLocation::Header => &self.headers,
            ParameterLocation::Path => &self.params,
            ParameterLocation::Cookie => &self.cookies,
        }
    }

    fn location_mut(&mut self, location: ParameterLocation) -> &mut LocationSchema {
        match location {
            ParameterLocation::Query => &mut self.query,
            ParameterLocation::Header => &mut self.headers,
            ParameterLocation::Path => &mut self.params,
            ParameterLocation::Cookie => &mut self.cookies,
        }
    }

    /// `{query, headers, params, cookies}` → location schema, ready to be
    /// merged into a request schema's `properties`.
    pub fn to_properties(&self) -> Map<String, Value> {
        ParameterLocation::ALL
            .iter()
            .map(|&l| (l.field().to_string(), self.location(l).to_schema()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> ApiDocument {
        ApiDocument::new(json!({
            "components": {
                "parameters": {
                    "Limit": {"name": "limit", "in": "query", "required": true, "schema": {"type": "integer"}}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn locations_and_defaults() {
        let params = ParameterSchemas::parse(
            &[
                json!({"$ref": "#/components/parameters/Limit"}),
                json!({"name": "X-Request-ID", "in": "header", "schema": {"type": "string"}}),
                json!({"name": "id", "in": "path", "required": true, "schema": {"type": "string"}}),
                json!({"name": "tags", "in": "query", "style": "pipeDelimited", "schema": {"type": "array"}}),
                json!({"name": "q", "in": "query", "allowEmptyValue": true, "schema": {"type": "string"}}),
            ],
            &doc(),
        )
        .unwrap();

        let query = params.location(ParameterLocation::Query);
        assert!(query.declares("limit") && query.declares("tags") && query.declares("q"));
        assert_eq!(query.required, vec!["limit"]);
        assert!(query.allow_empty.contains("q"));
        assert!(params.location(ParameterLocation::Header).declares("x-request-id"));

        let by_name = |n: &str| params.parameters().iter().find(|p| p.name == n).unwrap();
        assert_eq!(by_name("limit").style, "form");
        assert!(by_name("limit").explode);
        assert_eq!(by_name("tags").style, "pipeDelimited");
        assert!(!by_name("tags").explode);
        assert_eq!(by_name("id").style, "simple");
        assert!(!by_name("id").explode);
    }

    #[test]
    fn location_schema_shape() {
        let params = ParameterSchemas::parse(
            &[json!({"$ref": "#/components/parameters/Limit"})],
            &doc(),
        )
        .unwrap();
        let properties = params.to_properties();
        assert_eq!(
            properties["query"],
            json!({"type": "object", "properties": {"limit": {"type": "integer"}}, "required": ["limit"]})
        );
        assert_eq!(properties["headers"], json!({}));
        assert_eq!(properties.len(), 4);
    }

    #[test]
    fn content_parameters_use_media_schema() {
        let params = ParameterSchemas::parse(
            &[json!({
                "name": "filter",
                "in": "query",
                "content": {"application/json": {"schema": {"type": "object", "properties": {"a": {}}}}}
            })],
            &doc(),
        )
        .unwrap();
        let filter = &params.parameters()[0];
        assert!(filter.json_content);
        assert!(filter.node.is_object_like());
    }

    #[test]
    fn invalid_location_is_400() {
        let err = ParameterSchemas::parse(&[json!({"name": "x", "in": "body"})], &doc()).unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.kind, ErrorKind::InvalidParameterLocation);
        assert_eq!(err.errors[0].path, ".body.x");
    }
}
