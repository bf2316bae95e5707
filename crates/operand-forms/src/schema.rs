//! The structural schema of an edited resource.
//!
//! Custom resources describe their shape with a subset of OpenAPI v3. This
//! module models the part of that subset the form engine interprets: node
//! kinds, nested properties (order-preserving), array item schemas, required
//! sets, enumerations and defaults. Vendor extensions and keywords outside
//! this subset are ignored during deserialization, with the exception of the
//! schema combinators, which are captured so the renderer can report them.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

/// The kind of a single schema node.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchemaKind {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,

    /// Any `type` value this engine does not interpret. Kept instead of
    /// failing deserialization so a single exotic field cannot block editing
    /// the rest of the resource.
    #[serde(other)]
    Unknown,
}

impl SchemaKind {
    /// Group kinds contain further nodes and render as (possibly labelled)
    /// containers instead of fields.
    pub fn is_group(self) -> bool {
        matches!(self, SchemaKind::Object | SchemaKind::Array)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, SchemaKind::Number | SchemaKind::Integer)
    }

    /// Checks whether a data value is of this kind.
    pub fn matches(self, value: &Value) -> bool {
        match self {
            SchemaKind::Object => value.is_object(),
            SchemaKind::Array => value.is_array(),
            SchemaKind::String => value.is_string(),
            SchemaKind::Number => value.is_number(),
            SchemaKind::Integer => value.is_i64() || value.is_u64(),
            SchemaKind::Boolean => value.is_boolean(),
            SchemaKind::Unknown => true,
        }
    }
}

/// One node of the resource's structural schema.
///
/// Property order is preserved as declared, since it defines the natural
/// rendering order of children.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct StructuralSchema {
    #[serde(rename = "type")]
    pub kind: Option<SchemaKind>,

    pub title: Option<String>,
    pub description: Option<String>,

    pub properties: IndexMap<String, StructuralSchema>,
    pub items: Option<Box<StructuralSchema>>,
    pub required: Vec<String>,

    #[serde(rename = "enum")]
    pub enum_values: Vec<Value>,
    pub default: Option<Value>,

    // Combinators are not interpreted, only detected.
    pub one_of: Option<Value>,
    pub any_of: Option<Value>,
    pub all_of: Option<Value>,
    pub not: Option<Value>,
}

impl StructuralSchema {
    /// The kind used for rendering decisions. Nodes without a usable `type`
    /// fall back to what their other keywords imply.
    pub fn effective_kind(&self) -> SchemaKind {
        match self.kind {
            Some(kind) if kind != SchemaKind::Unknown => kind,
            _ if !self.properties.is_empty() => SchemaKind::Object,
            _ if self.items.is_some() => SchemaKind::Array,
            _ => SchemaKind::String,
        }
    }

    /// A schema that declares no shape at all. Rendering such a schema is a
    /// structural error.
    pub fn is_vacant(&self) -> bool {
        self.kind.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.enum_values.is_empty()
    }

    /// Returns the name of the first schema combinator this node declares,
    /// if any. Combinators cannot be rendered as form fields.
    pub fn combinator(&self) -> Option<&'static str> {
        if self.one_of.is_some() {
            Some("oneOf")
        } else if self.any_of.is_some() {
            Some("anyOf")
        } else if self.all_of.is_some() {
            Some("allOf")
        } else if self.not.is_some() {
            Some("not")
        } else {
            None
        }
    }

    pub fn is_required(&self, key: &str) -> bool {
        self.required.iter().any(|required| required == key)
    }

    /// Derives an initial data tree from declared `default` values.
    ///
    /// An explicit default wins over anything derived from children. Objects
    /// without their own default collect the defaults of their properties and
    /// are omitted entirely when no property contributes one.
    pub fn default_tree(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.clone());
        }

        match self.effective_kind() {
            SchemaKind::Object => {
                let mut tree = serde_json::Map::new();
                for (key, child) in &self.properties {
                    if let Some(value) = child.default_tree() {
                        tree.insert(key.clone(), value);
                    }
                }
                (!tree.is_empty()).then(|| Value::Object(tree))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    fn cluster_schema() -> StructuralSchema {
        serde_yaml::from_str(indoc! {"
            type: object
            properties:
              spec:
                type: object
                required:
                  - image
                properties:
                  image:
                    type: string
                  replicas:
                    type: integer
                    default: 1
                  mode:
                    type: string
                    enum:
                      - Auto
                      - Manual
                    default: Auto
                  nodes:
                    type: array
                    items:
                      type: object
                      properties:
                        name:
                          type: string
              status:
                type: object
        "})
        .expect("test YAML is valid")
    }

    #[test]
    fn property_order_is_preserved() {
        let schema = cluster_schema();
        let spec = &schema.properties["spec"];

        let keys = spec.properties.keys().cloned().collect::<Vec<_>>();
        assert_eq!(keys, ["image", "replicas", "mode", "nodes"]);
    }

    #[test]
    fn unknown_type_does_not_fail_deserialization() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            type: object
            properties:
              raw:
                type: bytes
        "})
        .expect("test YAML is valid");

        assert_eq!(schema.properties["raw"].kind, Some(SchemaKind::Unknown));
        // An unknown leaf still renders, as a string field
        assert_eq!(schema.properties["raw"].effective_kind(), SchemaKind::String);
    }

    #[test]
    fn effective_kind_falls_back_to_shape() {
        let object: StructuralSchema = serde_yaml::from_str(indoc! {"
            properties:
              name:
                type: string
        "})
        .expect("test YAML is valid");
        assert_eq!(object.effective_kind(), SchemaKind::Object);

        let array: StructuralSchema = serde_yaml::from_str(indoc! {"
            items:
              type: string
        "})
        .expect("test YAML is valid");
        assert_eq!(array.effective_kind(), SchemaKind::Array);
    }

    #[test]
    fn combinators_are_detected() {
        let schema: StructuralSchema = serde_yaml::from_str(indoc! {"
            oneOf:
              - type: string
              - type: integer
        "})
        .expect("test YAML is valid");

        assert_eq!(schema.combinator(), Some("oneOf"));
    }

    #[test]
    fn vacant_schema_is_detected() {
        assert!(StructuralSchema::default().is_vacant());
        assert!(!cluster_schema().is_vacant());
    }

    #[test]
    fn default_tree_collects_nested_defaults() {
        let schema = cluster_schema();

        assert_eq!(
            schema.default_tree(),
            Some(serde_json::json!({"spec": {"replicas": 1, "mode": "Auto"}}))
        );
    }

    #[test]
    fn kind_matches_data_values() {
        use serde_json::json;

        assert!(SchemaKind::Integer.matches(&json!(3)));
        assert!(!SchemaKind::Integer.matches(&json!(3.5)));
        assert!(SchemaKind::Number.matches(&json!(3.5)));
        assert!(SchemaKind::Boolean.matches(&json!(true)));
        assert!(!SchemaKind::String.matches(&json!(3)));
    }
}
