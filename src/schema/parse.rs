//! Two-pass schema parsing
//!
//! Pass 1 builds every node top-down and records fragment ids in a table owned
//! by the tree being built. Pass 2 links aliases to their targets, so an alias
//! may refer to a fragment declared anywhere in the document, before or after
//! it, and rejects unknown ids and alias chains that loop.

use petgraph::graph::DiGraph;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::{SchemaEdge, SchemaId, SchemaNode, SchemaTree};
use crate::error::{JsonWidgetError, Result};
use crate::order::{arrange_keys, OrderMap};
use crate::path::{Key, NodePath};
use crate::types::{JsonType, SchemaFormat};

/// Key used for an additional-property schema that has no v1 wildcard name
pub(crate) const WILDCARD_KEY: &str = "*";

static LEAF: OrderMap = OrderMap::Leaf;

pub(crate) fn parse_schema(raw: &Value, order: &OrderMap, format: SchemaFormat) -> Result<SchemaTree> {
    let mut parser = Parser {
        format,
        graph: DiGraph::new(),
        fragments: HashMap::new(),
        aliases: Vec::new(),
    };

    let mut path = NodePath::root();
    let root = parser.build(raw, order, None, 0, &mut path)?;
    parser.link_aliases()?;

    debug!(
        nodes = parser.graph.node_count(),
        fragments = parser.fragments.len(),
        %format,
        "parsed schema"
    );

    Ok(SchemaTree {
        graph: parser.graph,
        root,
        fragments: parser.fragments,
        format,
    })
}

struct Parser {
    format: SchemaFormat,
    graph: DiGraph<SchemaNode, SchemaEdge>,
    fragments: HashMap<String, SchemaId>,
    /// (alias node, referenced fragment id) awaiting pass 2
    aliases: Vec<(SchemaId, String)>,
}

impl Parser {
    // ========== Pass 1 ==========

    fn build(
        &mut self,
        raw: &Value,
        order: &OrderMap,
        key: Option<Key>,
        depth: usize,
        path: &mut NodePath,
    ) -> Result<SchemaId> {
        let obj = raw.as_object().ok_or_else(|| {
            JsonWidgetError::Schema(format!("schema node at {} must be an object", path))
        })?;

        let reference = self.fragment_ref(obj, path)?;
        let ty = match &reference {
            Some(_) => JsonType::Any,
            None => self.declared_type(obj, path)?,
        };

        let mut node = SchemaNode::new(key, depth, ty);
        node.title = string_field(obj, "title", path)?;
        node.description = string_field(obj, "description", path)?;
        node.required = self.required_flag(obj);
        node.enum_values = match obj.get("enum") {
            None => None,
            Some(Value::Array(values)) => Some(values.clone()),
            Some(_) => {
                return Err(JsonWidgetError::Schema(format!("enum at {} must be a list", path)))
            }
        };
        node.fragment_id = string_field(obj, "id", path)?;
        node.fragment_ref = reference.clone();

        let id = self.graph.add_node(node);

        if let Some(fragment_id) = self.graph[id].fragment_id.clone() {
            if self.fragments.insert(fragment_id.clone(), id).is_some() {
                return Err(JsonWidgetError::Schema(format!(
                    "fragment id {:?} declared twice (again at {})",
                    fragment_id, path
                )));
            }
        }

        if let Some(target) = reference {
            self.aliases.push((id, target));
            return Ok(id);
        }

        match ty {
            JsonType::Object => self.build_object(id, obj, order, depth, path)?,
            JsonType::Array => self.build_array(id, obj, order, depth, path)?,
            _ => {}
        }

        Ok(id)
    }

    fn build_object(
        &mut self,
        id: SchemaId,
        obj: &Map<String, Value>,
        order: &OrderMap,
        depth: usize,
        path: &mut NodePath,
    ) -> Result<()> {
        let props_key = self.format.properties_key();
        let props = match obj.get(props_key) {
            None => None,
            Some(Value::Object(props)) => Some(props),
            Some(_) => {
                return Err(JsonWidgetError::Schema(format!(
                    "{} at {} must be an object",
                    props_key, path
                )))
            }
        };
        let props_order = order.field(props_key).unwrap_or(&LEAF);

        let wildcard = match self.format {
            SchemaFormat::V1 => string_field(obj, "user_key", path)?,
            SchemaFormat::V2 => None,
        };

        let mut declared = Vec::new();
        if let Some(props) = props {
            let keys = arrange_keys(props.keys().map(String::as_str), &props_order.keys());
            for name in keys {
                let child_raw = &props[name];
                let child_order = props_order.field(name).unwrap_or(&LEAF);

                path.push(Key::field(name));
                let child = self.build(child_raw, child_order, Some(Key::field(name)), depth + 1, path)?;
                path.pop();

                if wildcard.as_deref() == Some(name) {
                    self.graph.add_edge(id, child, SchemaEdge::AdditionalProperties);
                } else {
                    self.graph.add_edge(id, child, SchemaEdge::Property(name.to_string()));
                    declared.push(name.to_string());
                }
            }
        }

        if let Some(name) = &wildcard {
            if !props.map(|p| p.contains_key(name)).unwrap_or(false) {
                return Err(JsonWidgetError::Schema(format!(
                    "user_key {:?} at {} names no {} entry",
                    name, path, props_key
                )));
            }
        }

        if self.format == SchemaFormat::V2 {
            match obj.get("additionalProperties") {
                None | Some(Value::Bool(false)) => {}
                Some(Value::Bool(true)) => {
                    let child = self.graph.add_node(SchemaNode::new(
                        Some(Key::field(WILDCARD_KEY)),
                        depth + 1,
                        JsonType::Any,
                    ));
                    self.graph.add_edge(id, child, SchemaEdge::AdditionalProperties);
                }
                Some(raw @ Value::Object(_)) => {
                    let child_order = order.field("additionalProperties").unwrap_or(&LEAF);
                    path.push(Key::field(WILDCARD_KEY));
                    let child = self.build(raw, child_order, Some(Key::field(WILDCARD_KEY)), depth + 1, path)?;
                    path.pop();
                    self.graph.add_edge(id, child, SchemaEdge::AdditionalProperties);
                }
                Some(_) => {
                    return Err(JsonWidgetError::Schema(format!(
                        "additionalProperties at {} must be a boolean or a schema",
                        path
                    )))
                }
            }
        }

        let node = &mut self.graph[id];
        node.property_order = declared;
        node.wildcard_key = wildcard;
        Ok(())
    }

    fn build_array(
        &mut self,
        id: SchemaId,
        obj: &Map<String, Value>,
        order: &OrderMap,
        depth: usize,
        path: &mut NodePath,
    ) -> Result<()> {
        let items_key = self.format.items_key();
        let items_order = order.field(items_key).unwrap_or(&LEAF);

        // v1 always wraps the item schema in a one-element list; v2 allows a
        // bare schema, and a tuple list is reduced to its first entry
        let (item_raw, item_order) = match (obj.get(items_key), self.format) {
            (Some(Value::Array(list)), _) if !list.is_empty() => {
                (Some(&list[0]), items_order.item(0).unwrap_or(&LEAF))
            }
            (Some(raw @ Value::Object(_)), SchemaFormat::V2) => (Some(raw), items_order),
            (None, SchemaFormat::V2) => (None, &LEAF),
            _ => {
                return Err(JsonWidgetError::Schema(format!(
                    "{} at {} must hold exactly one item schema",
                    items_key, path
                )))
            }
        };

        path.push(Key::Index(0));
        let child = match item_raw {
            Some(raw) => self.build(raw, item_order, Some(Key::Index(0)), depth + 1, path)?,
            None => self
                .graph
                .add_node(SchemaNode::new(Some(Key::Index(0)), depth + 1, JsonType::Any)),
        };
        path.pop();

        self.graph.add_edge(id, child, SchemaEdge::Items);
        Ok(())
    }

    fn declared_type(&self, obj: &Map<String, Value>, path: &NodePath) -> Result<JsonType> {
        match obj.get("type") {
            None => Ok(JsonType::Any),
            Some(Value::String(token)) => self.format.parse_type(token).ok_or_else(|| {
                JsonWidgetError::Schema(format!(
                    "unknown {} type {:?} at {}",
                    self.format, token, path
                ))
            }),
            Some(other) => Err(JsonWidgetError::Schema(format!(
                "type at {} must be a string, found {}",
                path, other
            ))),
        }
    }

    fn fragment_ref(&self, obj: &Map<String, Value>, path: &NodePath) -> Result<Option<String>> {
        let reference = match self.format {
            SchemaFormat::V1 => {
                if obj.get("type").and_then(Value::as_str) != Some("idref") {
                    return Ok(None);
                }
                obj.get("idref")
            }
            SchemaFormat::V2 => match obj.get("$ref") {
                None => return Ok(None),
                some => some,
            },
        };

        match reference.and_then(Value::as_str) {
            Some(target) => Ok(Some(target.trim_start_matches('#').to_string())),
            None => Err(JsonWidgetError::Schema(format!(
                "fragment reference at {} must name a fragment id",
                path
            ))),
        }
    }

    /// v1: `required: true` marks a required position, default optional.
    /// v2: `optional: false` (or draft-style `required: true`) marks it
    /// required, default optional as well.
    fn required_flag(&self, obj: &Map<String, Value>) -> bool {
        match self.format {
            SchemaFormat::V1 => obj.get("required").and_then(Value::as_bool).unwrap_or(false),
            SchemaFormat::V2 => match obj.get("optional").and_then(Value::as_bool) {
                Some(optional) => !optional,
                None => obj.get("required").and_then(Value::as_bool).unwrap_or(false),
            },
        }
    }

    // ========== Pass 2 ==========

    fn link_aliases(&mut self) -> Result<()> {
        for (alias, target_id) in &self.aliases {
            let target = self
                .fragments
                .get(target_id)
                .copied()
                .ok_or_else(|| JsonWidgetError::UnresolvedFragment(target_id.clone()))?;
            self.graph.add_edge(*alias, target, SchemaEdge::Fragment);
        }

        for (alias, target_id) in &self.aliases {
            let mut seen = HashSet::new();
            let mut current = *alias;
            while let Some(next) = self.fragment_target(current) {
                if !seen.insert(current) {
                    return Err(JsonWidgetError::FragmentCycle(target_id.clone()));
                }
                current = next;
            }
        }
        Ok(())
    }

    fn fragment_target(&self, id: SchemaId) -> Option<SchemaId> {
        use petgraph::visit::EdgeRef;
        self.graph
            .edges(id)
            .find(|e| *e.weight() == SchemaEdge::Fragment)
            .map(|e| e.target())
    }
}

fn string_field(obj: &Map<String, Value>, name: &str, path: &NodePath) -> Result<Option<String>> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(JsonWidgetError::Schema(format!(
            "{} at {} must be a string, found {}",
            name, path, other
        ))),
    }
}
