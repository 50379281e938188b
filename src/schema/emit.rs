//! Schema emission and format conversion
//!
//! A parsed tree is format-neutral, so converting between vocabularies is
//! emit-in-the-target-format. Output keeps `type` first and properties in
//! declared order by returning an [`OrderMap`] next to the raw value.

use serde_json::{Map, Value};
use tracing::debug;

use super::parse::WILDCARD_KEY;
use super::{SchemaId, SchemaTree};
use crate::error::Result;
use crate::order::OrderMap;
use crate::storage::{self, OutputOptions, StorageFormat};
use crate::types::{JsonType, SchemaFormat};

/// Raw object under construction, tracking insertion order
#[derive(Default)]
pub(crate) struct RawObject {
    map: Map<String, Value>,
    order: Vec<(String, OrderMap)>,
}

impl RawObject {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, (value, order): (Value, OrderMap)) {
        let key = key.into();
        self.map.insert(key.clone(), value);
        self.order.retain(|(k, _)| *k != key);
        self.order.push((key, order));
    }

    pub(crate) fn scalar(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.insert(key, (value.into(), OrderMap::Leaf));
    }

    pub(crate) fn finish(self) -> (Value, OrderMap) {
        (Value::Object(self.map), OrderMap::Object(self.order))
    }
}

impl SchemaTree {
    /// Raw schema in `format`, with its key order
    pub fn to_document(&self, format: SchemaFormat) -> (Value, OrderMap) {
        self.emit(self.root, format)
    }

    /// Schema text in `format`
    pub fn dumps(&self, format: SchemaFormat, output: &OutputOptions) -> Result<String> {
        let (raw, order) = self.to_document(format);
        storage::render(&raw, &order, StorageFormat::Json, output)
    }

    /// Same schema expressed in another vocabulary
    pub fn convert(&self, target: SchemaFormat) -> Result<SchemaTree> {
        debug!(from = %self.format, to = %target, "converting schema");
        let (raw, order) = self.to_document(target);
        SchemaTree::from_value(&raw, &order, target)
    }

    fn emit(&self, id: SchemaId, format: SchemaFormat) -> (Value, OrderMap) {
        let node = self.node(id);
        let mut out = RawObject::new();

        if let Some(target) = &node.fragment_ref {
            match format {
                SchemaFormat::V1 => {
                    out.scalar("type", "idref");
                    out.scalar("idref", target.as_str());
                }
                SchemaFormat::V2 => out.scalar("$ref", target.as_str()),
            }
        } else {
            out.scalar("type", format.type_token(node.ty));
        }

        if let Some(fragment_id) = &node.fragment_id {
            out.scalar("id", fragment_id.as_str());
        }
        if let Some(title) = &node.title {
            out.scalar("title", title.as_str());
        }
        if let Some(description) = &node.description {
            out.scalar("description", description.as_str());
        }
        if node.required {
            match format {
                SchemaFormat::V1 => out.scalar("required", true),
                SchemaFormat::V2 => out.scalar("optional", false),
            }
        }
        if let Some(values) = &node.enum_values {
            out.insert("enum", (Value::Array(values.clone()), OrderMap::Leaf));
        }

        if node.fragment_ref.is_none() {
            match node.ty {
                JsonType::Object => self.emit_object(id, format, &mut out),
                JsonType::Array => {
                    if let Some(item) = self.items(id) {
                        let (value, order) = self.emit(item, format);
                        match format {
                            SchemaFormat::V1 => out.insert(
                                "sequence",
                                (Value::Array(vec![value]), OrderMap::Array(vec![order])),
                            ),
                            SchemaFormat::V2 => out.insert("items", (value, order)),
                        }
                    }
                }
                _ => {}
            }
        }

        out.finish()
    }

    fn emit_object(&self, id: SchemaId, format: SchemaFormat, out: &mut RawObject) {
        let mut props = RawObject::new();
        for (name, child) in self.properties(id) {
            props.insert(name, self.emit(child, format));
        }

        let additional = self.additional_properties(id);
        match (format, additional) {
            (SchemaFormat::V1, Some(extra)) => {
                let name = self.wildcard_name(id);
                props.insert(name.clone(), self.emit(extra, format));
                out.insert(format.properties_key(), props.finish());
                out.scalar("user_key", name);
            }
            (SchemaFormat::V1, None) => out.insert(format.properties_key(), props.finish()),
            (SchemaFormat::V2, extra) => {
                out.insert(format.properties_key(), props.finish());
                match extra {
                    None => out.scalar("additionalProperties", false),
                    Some(extra) if self.is_plain_any(extra) => out.scalar("additionalProperties", true),
                    Some(extra) => out.insert("additionalProperties", self.emit(extra, format)),
                }
            }
        }
    }

    /// Mapping-entry name for the additional-property schema in v1 output
    fn wildcard_name(&self, id: SchemaId) -> String {
        let preferred = self
            .node(id)
            .wildcard_key
            .clone()
            .unwrap_or_else(|| WILDCARD_KEY.to_string());
        let mut name = preferred.clone();
        let mut n = 1;
        while self.is_declared(id, &name) {
            name = format!("{}{}", preferred, n);
            n += 1;
        }
        name
    }

    fn is_plain_any(&self, id: SchemaId) -> bool {
        let node = self.node(id);
        node.ty == JsonType::Any
            && node.fragment_ref.is_none()
            && node.fragment_id.is_none()
            && node.title.is_none()
            && node.description.is_none()
            && node.enum_values.is_none()
            && !node.required
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Key;
    use serde_json::json;

    fn v1_schema() -> SchemaTree {
        let raw = json!({
            "type": "map",
            "title": "Contact",
            "user_key": "custom",
            "mapping": {
                "name": {"type": "str", "required": true},
                "kind": {"type": "str", "enum": ["home", "work"]},
                "phones": {"type": "seq", "sequence": [{"type": "str"}]},
                "custom": {"type": "str", "title": "Custom field"}
            }
        });
        SchemaTree::from_value(&raw, &OrderMap::from_value(&raw), SchemaFormat::V1).unwrap()
    }

    #[test]
    fn test_v1_to_v2_tokens() {
        let (raw, _) = v1_schema().to_document(SchemaFormat::V2);
        assert_eq!(raw["type"], "object");
        assert_eq!(raw["properties"]["name"]["type"], "string");
        assert_eq!(raw["properties"]["name"]["optional"], false);
        assert_eq!(raw["properties"]["phones"]["items"]["type"], "string");
        assert_eq!(raw["additionalProperties"]["title"], "Custom field");
        assert!(raw["properties"].get("custom").is_none());
        assert!(raw.get("user_key").is_none());
    }

    #[test]
    fn test_round_trip_keeps_semantics() {
        let original = v1_schema();
        let back = original.convert(SchemaFormat::V2).unwrap().convert(SchemaFormat::V1).unwrap();

        let (raw, _) = back.to_document(SchemaFormat::V1);
        let wildcard = raw["user_key"].as_str().unwrap();
        assert_eq!(raw["mapping"][wildcard]["title"], "Custom field");
        assert_eq!(raw["mapping"]["name"]["required"], true);
        assert_eq!(raw["mapping"]["kind"]["enum"], json!(["home", "work"]));

        let root = back.root();
        assert_eq!(back.property_keys(root), original.property_keys(original.root()));
        let kind = back.get_child(root, &Key::field("kind")).unwrap();
        assert_eq!(back.enum_options(kind).unwrap().len(), 2);
    }

    #[test]
    fn test_dumps_puts_type_first() {
        let text = v1_schema()
            .dumps(SchemaFormat::V2, &OutputOptions::compact())
            .unwrap();
        assert!(text.starts_with(r#"{"type":"object","title":"Contact""#));
    }

    #[test]
    fn test_closed_object_emits_false() {
        let raw = json!({"type": "map", "mapping": {}});
        let tree = SchemaTree::from_value(&raw, &OrderMap::from_value(&raw), SchemaFormat::V1).unwrap();
        let (v2, _) = tree.to_document(SchemaFormat::V2);
        assert_eq!(v2["additionalProperties"], false);
    }
}
