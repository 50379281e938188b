//! Order Map
//!
//! Records the key order of every object as it was authored in text. The map
//! is built by deserializing the same text a second time with a visitor that
//! only remembers structure, so it works for every serde format the storage
//! layer reads (JSON, YAML).
//!
//! ```text
//! {"b": 1, "a": {"z": 0, "y": 0}}   ->   Object[ b: Leaf, a: Object[ z: Leaf, y: Leaf ] ]
//! ```

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use serde_json::Value;
use std::fmt;

use crate::path::Key;

/// Authored key order of a document, mirroring its container structure
#[derive(Debug, Clone, Default, PartialEq)]
pub enum OrderMap {
    /// Scalar, or a position with no recorded order
    #[default]
    Leaf,
    /// Object keys in authored order, each with the order of its value
    Object(Vec<(String, OrderMap)>),
    /// Order of each array element
    Array(Vec<OrderMap>),
}

impl OrderMap {
    /// Order map of an in-memory value, following its iteration order
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => OrderMap::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), OrderMap::from_value(v)))
                    .collect(),
            ),
            Value::Array(items) => OrderMap::Array(items.iter().map(OrderMap::from_value).collect()),
            _ => OrderMap::Leaf,
        }
    }

    /// Authored object keys, empty for anything that is not an object
    pub fn keys(&self) -> Vec<String> {
        match self {
            OrderMap::Object(entries) => entries.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&OrderMap> {
        match self {
            OrderMap::Object(entries) => entries.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn item(&self, index: usize) -> Option<&OrderMap> {
        match self {
            OrderMap::Array(items) => items.get(index),
            _ => None,
        }
    }

    pub fn child(&self, key: &Key) -> Option<&OrderMap> {
        match key {
            Key::Field(name) => self.field(name),
            Key::Index(i) => self.item(*i),
        }
    }
}

/// Arrange `present` keys: keys named in `order` first, in that order, then
/// the remaining keys lexically.
pub(crate) fn arrange_keys<'a, I>(present: I, order: &[String]) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut rest: Vec<&'a str> = present.into_iter().collect();
    let mut arranged = Vec::with_capacity(rest.len());

    for key in order {
        if let Some(pos) = rest.iter().position(|k| *k == key.as_str()) {
            arranged.push(rest.remove(pos));
        }
    }
    rest.sort_unstable();
    arranged.extend(rest);
    arranged
}

// =============================================================================
// Deserialization: record structure only
// =============================================================================

struct OrderMapVisitor;

impl<'de> Visitor<'de> for OrderMapVisitor {
    type Value = OrderMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any structured value")
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_i64<E: de::Error>(self, _: i64) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_u64<E: de::Error>(self, _: u64) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_f64<E: de::Error>(self, _: f64) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_str<E: de::Error>(self, _: &str) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_unit<E: de::Error>(self) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_none<E: de::Error>(self) -> Result<OrderMap, E> {
        Ok(OrderMap::Leaf)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<OrderMap, D::Error> {
        OrderMap::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<OrderMap, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element::<OrderMap>()? {
            items.push(item);
        }
        Ok(OrderMap::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<OrderMap, A::Error> {
        let mut entries: Vec<(String, OrderMap)> = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            let child = map.next_value::<OrderMap>()?;
            // a repeated key keeps its first position and its last value
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = child,
                None => entries.push((key, child)),
            }
        }
        Ok(OrderMap::Object(entries))
    }
}

impl<'de> Deserialize<'de> for OrderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(OrderMapVisitor)
    }
}

// =============================================================================
// Serialization: a value written in authored order
// =============================================================================

/// A value paired with its order map; serializes objects in authored order
/// with unknown keys appended lexically.
pub struct OrderedValue<'a> {
    value: &'a Value,
    order: &'a OrderMap,
}

impl<'a> OrderedValue<'a> {
    pub fn new(value: &'a Value, order: &'a OrderMap) -> Self {
        Self { value, order }
    }
}

static LEAF: OrderMap = OrderMap::Leaf;

impl Serialize for OrderedValue<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Object(map) => {
                let order_keys = self.order.keys();
                let keys = arrange_keys(map.keys().map(String::as_str), &order_keys);
                let mut out = serializer.serialize_map(Some(keys.len()))?;
                for key in keys {
                    if let Some(value) = map.get(key) {
                        let order = self.order.field(key).unwrap_or(&LEAF);
                        out.serialize_entry(key, &OrderedValue::new(value, order))?;
                    }
                }
                out.end()
            }
            Value::Array(items) => {
                let mut out = serializer.serialize_seq(Some(items.len()))?;
                for (i, item) in items.iter().enumerate() {
                    let order = self.order.item(i).unwrap_or(&LEAF);
                    out.serialize_element(&OrderedValue::new(item, order))?;
                }
                out.end()
            }
            scalar => scalar.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_authored_order() {
        let text = r#"{"zeta": 1, "alpha": {"b": [ {"y": 1, "x": 2} ], "a": null}, "mid": "s"}"#;
        let order: OrderMap = serde_json::from_str(text).unwrap();

        assert_eq!(order.keys(), vec!["zeta", "alpha", "mid"]);
        let alpha = order.field("alpha").unwrap();
        assert_eq!(alpha.keys(), vec!["b", "a"]);
        let first = alpha.field("b").unwrap().item(0).unwrap();
        assert_eq!(first.keys(), vec!["y", "x"]);
        assert_eq!(order.field("mid"), Some(&OrderMap::Leaf));
    }

    #[test]
    fn test_repeated_key_keeps_first_position() {
        let order: OrderMap = serde_json::from_str(r#"{"a": 1, "b": 2, "a": {"c": 3}}"#).unwrap();
        assert_eq!(order.keys(), vec!["a", "b"]);
        assert_eq!(order.field("a").unwrap().keys(), vec!["c"]);
    }

    #[test]
    fn test_yaml_order() {
        let order: OrderMap = serde_yaml::from_str("second: 1\nfirst:\n  - q: 1\n    p: 2\n").unwrap();
        assert_eq!(order.keys(), vec!["second", "first"]);
        assert_eq!(order.field("first").unwrap().item(0).unwrap().keys(), vec!["q", "p"]);
    }

    #[test]
    fn test_arrange_keys_appends_unknown_lexically() {
        let order = vec!["c".to_string(), "a".to_string(), "gone".to_string()];
        let arranged = arrange_keys(["a", "z", "b", "c"], &order);
        assert_eq!(arranged, vec!["c", "a", "b", "z"]);
    }

    #[test]
    fn test_ordered_value_serializes_in_order() {
        let text = r#"{"b": 1, "a": [ {"d": 1, "c": 2} ], "new": true}"#;
        let value: Value = serde_json::from_str(text).unwrap();
        let order: OrderMap = serde_json::from_str(r#"{"b": 1, "a": [ {"d": 1, "c": 2} ]}"#).unwrap();

        let out = serde_json::to_string(&OrderedValue::new(&value, &order)).unwrap();
        assert_eq!(out, r#"{"b":1,"a":[{"d":1,"c":2}],"new":true}"#);
    }
}
