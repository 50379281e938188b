//! Document types and schema-format vocabularies
//!
//! `classify` maps any JSON value onto the closed [`JsonType`] set. The two
//! schema-format versions spell the same types and container keys differently;
//! [`SchemaFormat`] holds both vocabularies so the parser, the emitter and the
//! converter share one table.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Type Classifier
// =============================================================================

/// Closed set of document types, plus `Any` which only schemas use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
    Any,
}

impl JsonType {
    pub fn is_container(self) -> bool {
        matches!(self, JsonType::Object | JsonType::Array)
    }

    /// Whether a document value of type `self` may sit at a schema position of type `schema`
    pub fn is_compatible_with(self, schema: JsonType) -> bool {
        schema == JsonType::Any
            || schema == self
            || self == JsonType::Null
            || (self == JsonType::Integer && schema == JsonType::Number)
    }

    /// Value used when a field of this type has to be synthesized
    pub fn blank_value(self) -> Value {
        match self {
            JsonType::Object => Value::Object(serde_json::Map::new()),
            JsonType::Array => Value::Array(Vec::new()),
            JsonType::Integer | JsonType::Number => Value::from(0),
            JsonType::Boolean => Value::Bool(false),
            JsonType::String => Value::String(String::new()),
            JsonType::Null | JsonType::Any => Value::Null,
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(SchemaFormat::V2.type_token(*self))
    }
}

/// Classify a value. Booleans are checked before numbers and integers before
/// floats, so `true` is never an integer and `1.5` is never an integer.
pub fn classify(value: &Value) -> JsonType {
    match value {
        Value::String(_) => JsonType::String,
        Value::Bool(_) => JsonType::Boolean,
        Value::Number(n) if n.is_i64() || n.is_u64() => JsonType::Integer,
        Value::Number(_) => JsonType::Number,
        Value::Object(_) => JsonType::Object,
        Value::Array(_) => JsonType::Array,
        Value::Null => JsonType::Null,
    }
}

// =============================================================================
// Schema-format vocabularies
// =============================================================================

/// Schema-format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SchemaFormat {
    /// `map`/`mapping`, `seq`/`sequence`, `required`, `user_key`
    V1,
    /// `object`/`properties`, `array`/`items`, `optional`, `additionalProperties`
    #[default]
    V2,
}

const V1_TOKENS: &[(JsonType, &str)] = &[
    (JsonType::String, "str"),
    (JsonType::Integer, "int"),
    (JsonType::Number, "number"),
    (JsonType::Boolean, "bool"),
    (JsonType::Object, "map"),
    (JsonType::Array, "seq"),
    (JsonType::Null, "none"),
    (JsonType::Any, "any"),
];

const V2_TOKENS: &[(JsonType, &str)] = &[
    (JsonType::String, "string"),
    (JsonType::Integer, "integer"),
    (JsonType::Number, "number"),
    (JsonType::Boolean, "boolean"),
    (JsonType::Object, "object"),
    (JsonType::Array, "array"),
    (JsonType::Null, "null"),
    (JsonType::Any, "any"),
];

impl SchemaFormat {
    pub fn version(self) -> u8 {
        match self {
            SchemaFormat::V1 => 1,
            SchemaFormat::V2 => 2,
        }
    }

    pub fn from_version(version: u8) -> Option<Self> {
        match version {
            1 => Some(SchemaFormat::V1),
            2 => Some(SchemaFormat::V2),
            _ => None,
        }
    }

    fn tokens(self) -> &'static [(JsonType, &'static str)] {
        match self {
            SchemaFormat::V1 => V1_TOKENS,
            SchemaFormat::V2 => V2_TOKENS,
        }
    }

    /// Spelling of a type in this vocabulary
    pub fn type_token(self, ty: JsonType) -> &'static str {
        self.tokens()
            .iter()
            .find(|(t, _)| *t == ty)
            .map(|(_, token)| *token)
            .unwrap_or("any")
    }

    /// Parse a type token of this vocabulary
    pub fn parse_type(self, token: &str) -> Option<JsonType> {
        self.tokens()
            .iter()
            .find(|(_, t)| *t == token)
            .map(|(ty, _)| *ty)
    }

    /// Key holding an object's child schemas
    pub fn properties_key(self) -> &'static str {
        match self {
            SchemaFormat::V1 => "mapping",
            SchemaFormat::V2 => "properties",
        }
    }

    /// Key holding an array's item schema
    pub fn items_key(self) -> &'static str {
        match self {
            SchemaFormat::V1 => "sequence",
            SchemaFormat::V2 => "items",
        }
    }

    /// Guess the vocabulary of a raw schema from the first version-specific
    /// token found in a depth-first walk.
    pub fn detect(schema: &Value) -> Option<Self> {
        let obj = schema.as_object()?;

        if let Some(Value::String(token)) = obj.get("type") {
            match token.as_str() {
                "str" | "int" | "bool" | "map" | "seq" | "none" | "idref" => {
                    return Some(SchemaFormat::V1)
                }
                "string" | "integer" | "boolean" | "object" | "array" | "null" => {
                    return Some(SchemaFormat::V2)
                }
                _ => {}
            }
        }
        if obj.contains_key("mapping") || obj.contains_key("sequence") || obj.contains_key("user_key") {
            return Some(SchemaFormat::V1);
        }
        if obj.contains_key("properties")
            || obj.contains_key("items")
            || obj.contains_key("$ref")
            || obj.contains_key("additionalProperties")
            || obj.contains_key("optional")
        {
            return Some(SchemaFormat::V2);
        }

        obj.values().find_map(|child| match child {
            Value::Array(items) => items.iter().find_map(Self::detect),
            other => Self::detect(other),
        })
    }
}

impl TryFrom<u8> for SchemaFormat {
    type Error = String;

    fn try_from(version: u8) -> Result<Self, Self::Error> {
        Self::from_version(version).ok_or_else(|| format!("unknown schema format version {}", version))
    }
}

impl From<SchemaFormat> for u8 {
    fn from(format: SchemaFormat) -> u8 {
        format.version()
    }
}

impl fmt::Display for SchemaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.version())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_checks_boolean_before_integer() {
        assert_eq!(classify(&json!(true)), JsonType::Boolean);
        assert_eq!(classify(&json!(1)), JsonType::Integer);
        assert_eq!(classify(&json!(-7)), JsonType::Integer);
        assert_eq!(classify(&json!(1.5)), JsonType::Number);
        assert_eq!(classify(&json!("x")), JsonType::String);
        assert_eq!(classify(&json!({})), JsonType::Object);
        assert_eq!(classify(&json!([])), JsonType::Array);
        assert_eq!(classify(&json!(null)), JsonType::Null);
    }

    #[test]
    fn test_compatibility_rules() {
        assert!(JsonType::Integer.is_compatible_with(JsonType::Number));
        assert!(!JsonType::Number.is_compatible_with(JsonType::Integer));
        assert!(JsonType::Null.is_compatible_with(JsonType::Object));
        assert!(JsonType::String.is_compatible_with(JsonType::Any));
        assert!(!JsonType::String.is_compatible_with(JsonType::Integer));
    }

    #[test]
    fn test_token_tables() {
        assert_eq!(SchemaFormat::V1.type_token(JsonType::Object), "map");
        assert_eq!(SchemaFormat::V2.type_token(JsonType::Object), "object");
        assert_eq!(SchemaFormat::V1.parse_type("seq"), Some(JsonType::Array));
        assert_eq!(SchemaFormat::V2.parse_type("seq"), None);
        assert_eq!(SchemaFormat::V1.properties_key(), "mapping");
        assert_eq!(SchemaFormat::V2.items_key(), "items");
    }

    #[test]
    fn test_detect_format() {
        assert_eq!(
            SchemaFormat::detect(&json!({"type": "map", "mapping": {}})),
            Some(SchemaFormat::V1)
        );
        assert_eq!(
            SchemaFormat::detect(&json!({"type": "object", "properties": {}})),
            Some(SchemaFormat::V2)
        );
        assert_eq!(
            SchemaFormat::detect(&json!({"type": "any", "title": "x"})),
            None
        );
    }

    #[test]
    fn test_blank_values() {
        assert_eq!(JsonType::Object.blank_value(), json!({}));
        assert_eq!(JsonType::Array.blank_value(), json!([]));
        assert_eq!(JsonType::Number.blank_value(), json!(0));
        assert_eq!(JsonType::Boolean.blank_value(), json!(false));
        assert_eq!(JsonType::String.blank_value(), json!(""));
        assert_eq!(JsonType::Any.blank_value(), json!(null));
    }
}
