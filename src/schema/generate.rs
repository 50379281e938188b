//! Schema generation from an example document
//!
//! Objects get one property per observed key, in authored order. Arrays get an
//! item schema from their first element only; later elements are not
//! consulted, so an array with mixed shapes yields a schema its later
//! elements may fail to bind against.

use serde_json::Value;
use tracing::warn;

use super::emit::RawObject;
use super::SchemaTree;
use crate::error::Result;
use crate::order::{arrange_keys, OrderMap};
use crate::types::{classify, JsonType, SchemaFormat};

static LEAF: OrderMap = OrderMap::Leaf;

/// Infer a schema from `example`
pub fn generate_from_example(example: &Value, order: &OrderMap, format: SchemaFormat) -> Result<SchemaTree> {
    let (raw, raw_order) = generate_raw(example, order, format);
    SchemaTree::from_value(&raw, &raw_order, format)
}

fn generate_raw(example: &Value, order: &OrderMap, format: SchemaFormat) -> (Value, OrderMap) {
    let ty = classify(example);
    let mut out = RawObject::new();
    out.scalar("type", format.type_token(ty));

    match example {
        Value::Object(map) => {
            let mut props = RawObject::new();
            for key in arrange_keys(map.keys().map(String::as_str), &order.keys()) {
                let child_order = order.field(key).unwrap_or(&LEAF);
                props.insert(key, generate_raw(&map[key], child_order, format));
            }
            out.insert(format.properties_key(), props.finish());
        }
        Value::Array(items) => {
            let item = match items.first() {
                Some(first) => {
                    let first_ty = classify(first);
                    if items.iter().skip(1).any(|other| classify(other) != first_ty) {
                        warn!(
                            first = %first_ty,
                            "array elements differ in type; schema follows the first element"
                        );
                    }
                    generate_raw(first, order.item(0).unwrap_or(&LEAF), format)
                }
                None => {
                    let mut any = RawObject::new();
                    any.scalar("type", format.type_token(JsonType::Any));
                    any.finish()
                }
            };
            match format {
                SchemaFormat::V1 => {
                    let (value, item_order) = item;
                    out.insert(
                        format.items_key(),
                        (Value::Array(vec![value]), OrderMap::Array(vec![item_order])),
                    );
                }
                SchemaFormat::V2 => out.insert(format.items_key(), item),
            }
        }
        _ => {}
    }

    out.finish()
}
