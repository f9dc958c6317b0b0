//! # Schema Shapes
//!
//! A shape-only view of a JSON Schema used by the parameter mutator: which
//! schemas describe objects, which property names an exploded object may
//! carry, and the declared type of each property. Composition keywords
//! become explicit nodes instead of being probed ad hoc.

use serde_json::Value;

use crate::document::ApiDocument;

/// Depth limit when descending through composed or referenced schemas.
const MAX_DEPTH: usize = 16;

/// A composition keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Composition {
    /// `allOf`
    AllOf,
    /// `oneOf`
    OneOf,
    /// `anyOf`
    AnyOf,
}

impl Composition {
    /// All keywords, in the order they are inspected.
    pub const ALL: [Composition; 3] = [Self::AllOf, Self::OneOf, Self::AnyOf];

    /// The JSON Schema keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            Self::AllOf => "allOf",
            Self::OneOf => "oneOf",
            Self::AnyOf => "anyOf",
        }
    }
}

/// A declared property of an object schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Property name.
    pub name: String,
    /// Declared `type` of the (dereferenced) property schema.
    pub schema_type: Option<String>,
}

/// Shape of a schema: a plain schema, or a composition of shapes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    /// A schema without composition keywords.
    Leaf {
        /// Declared `type`, when it is a single string.
        schema_type: Option<String>,
        /// Declared `properties`, in document order.
        properties: Vec<Property>,
    },
    /// `allOf` / `oneOf` / `anyOf` over child shapes.
    Composite {
        /// The keyword.
        kind: Composition,
        /// One child per branch.
        children: Vec<SchemaNode>,
    },
}

impl SchemaNode {
    /// Build the shape of `schema`, resolving `$ref`s against `doc`.
    ///
    /// A schema mixing its own keywords with compositions, or using several
    /// composition keywords at once, becomes an `allOf` of its parts, which
    /// is what JSON Schema evaluates anyway.
    pub fn from_schema(schema: &Value, doc: &ApiDocument) -> Self {
        Self::build(schema, doc, 0)
    }

    fn build(schema: &Value, doc: &ApiDocument, depth: usize) -> Self {
        let schema = doc.dereference(schema);
        let own = Self::leaf(schema, doc);
        if depth >= MAX_DEPTH {
            return own;
        }

        let mut parts: Vec<SchemaNode> = Composition::ALL
            .iter()
            .filter_map(|&kind| {
                let branches = schema.get(kind.keyword())?.as_array()?;
                Some(SchemaNode::Composite {
                    kind,
                    children: branches
                        .iter()
                        .map(|b| Self::build(b, doc, depth + 1))
                        .collect(),
                })
            })
            .collect();

        match parts.len() {
            0 => own,
            1 if own.is_empty_leaf() => parts.remove(0),
            _ => {
                if !own.is_empty_leaf() {
                    parts.insert(0, own);
                }
                SchemaNode::Composite {
                    kind: Composition::AllOf,
                    children: parts,
                }
            }
        }
    }

    fn leaf(schema: &Value, doc: &ApiDocument) -> Self {
        let properties = schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| {
                props
                    .iter()
                    .map(|(name, prop)| Property {
                        name: name.clone(),
                        schema_type: declared_type(doc.dereference(prop)),
                    })
                    .collect()
            })
            .unwrap_or_default();
        SchemaNode::Leaf {
            schema_type: declared_type(schema),
            properties,
        }
    }

    fn is_empty_leaf(&self) -> bool {
        matches!(self, SchemaNode::Leaf { schema_type: None, properties } if properties.is_empty())
    }

    /// The leaf's declared type; `None` for compositions.
    pub fn schema_type(&self) -> Option<&str> {
        match self {
            SchemaNode::Leaf { schema_type, .. } => schema_type.as_deref(),
            SchemaNode::Composite { .. } => None,
        }
    }

    /// True for an `object` leaf or a composition with an object branch.
    pub fn is_object_like(&self) -> bool {
        match self {
            SchemaNode::Leaf { schema_type, .. } => schema_type.as_deref() == Some("object"),
            SchemaNode::Composite { children, .. } => children.iter().any(Self::is_object_like),
        }
    }

    /// Property names an exploded form object may carry: the properties of
    /// an object leaf, or of every object branch of a composition, without
    /// duplicates and in first-seen order.
    pub fn exploded_property_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_property_names(&mut names);
        names
    }

    fn collect_property_names(&self, names: &mut Vec<String>) {
        match self {
            SchemaNode::Leaf {
                schema_type,
                properties,
            } => {
                if schema_type.as_deref() == Some("object") {
                    for property in properties {
                        if !names.contains(&property.name) {
                            names.push(property.name.clone());
                        }
                    }
                }
            }
            SchemaNode::Composite { children, .. } => {
                for child in children {
                    child.collect_property_names(names);
                }
            }
        }
    }

    /// Declared type of property `name`, from the first branch declaring it.
    pub fn property_type(&self, name: &str) -> Option<&str> {
        match self {
            SchemaNode::Leaf { properties, .. } => properties
                .iter()
                .find(|p| p.name == name)
                .and_then(|p| p.schema_type.as_deref()),
            SchemaNode::Composite { children, .. } => {
                children.iter().find_map(|c| c.property_type(name))
            }
        }
    }
}

fn declared_type(schema: &Value) -> Option<String> {
    schema.get("type").and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> ApiDocument {
        ApiDocument::new(json!({
            "components": {"schemas": {
                "Color": {"type": "object", "properties": {"r": {"type": "integer"}, "g": {"type": "integer"}}},
                "Tags": {"type": "array", "items": {"type": "string"}}
            }}
        }))
        .unwrap()
    }

    #[test]
    fn plain_object_is_leaf() {
        let node = SchemaNode::from_schema(
            &json!({"type": "object", "properties": {"a": {"type": "string"}, "b": {"type": "array"}}}),
            &doc(),
        );
        assert!(node.is_object_like());
        assert_eq!(node.schema_type(), Some("object"));
        assert_eq!(node.exploded_property_names(), vec!["a", "b"]);
        assert_eq!(node.property_type("b"), Some("array"));
    }

    #[test]
    fn composition_collects_branch_properties() {
        let node = SchemaNode::from_schema(
            &json!({"oneOf": [
                {"$ref": "#/components/schemas/Color"},
                {"type": "object", "properties": {"b": {"type": "integer"}, "r": {}}},
                {"type": "string"}
            ]}),
            &doc(),
        );
        assert!(matches!(node, SchemaNode::Composite { kind: Composition::OneOf, .. }));
        assert!(node.is_object_like());
        assert_eq!(node.exploded_property_names(), vec!["r", "g", "b"]);
        assert_eq!(node.property_type("r"), Some("integer"));
    }

    #[test]
    fn mixed_keywords_become_all_of() {
        let node = SchemaNode::from_schema(
            &json!({
                "type": "object",
                "properties": {"x": {"type": "string"}},
                "allOf": [{"type": "object", "properties": {"y": {"$ref": "#/components/schemas/Tags"}}}],
                "anyOf": [{"type": "object", "properties": {"z": {}}}]
            }),
            &doc(),
        );
        let SchemaNode::Composite { kind, children } = &node else {
            panic!("expected composite, got {node:?}");
        };
        assert_eq!(*kind, Composition::AllOf);
        assert_eq!(children.len(), 3);
        assert_eq!(node.exploded_property_names(), vec!["x", "y", "z"]);
        assert_eq!(node.property_type("y"), Some("array"));
    }

    #[test]
    fn scalar_composition_is_not_object_like() {
        let node = SchemaNode::from_schema(
            &json!({"anyOf": [{"type": "string"}, {"type": "integer"}]}),
            &doc(),
        );
        assert!(!node.is_object_like());
        assert!(node.exploded_property_names().is_empty());
    }
}
