//! Schema Tree
//!
//! A parsed schema stored as a petgraph arena. Structural edges (`Property`,
//! `Items`, `AdditionalProperties`) form a tree rooted at [`SchemaTree::root`];
//! `Fragment` edges point from an alias node to the node carrying the matching
//! fragment id, which is how recursive shapes are expressed.
//!
//! ```text
//! root (object) --Property("name")--> (string)
//!               --Property("kids")--> (array) --Items--> alias --Fragment--> root
//! ```
//!
//! Every query that depends on the shape of a position (`ty`, `properties`,
//! `items`, `enum_options`) looks through aliases. Position-specific data
//! (`key`, `required`, an alias's own `title`) stays on the alias.

pub mod emit;
pub mod generate;
pub mod parse;

pub use generate::generate_from_example;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

use crate::error::{JsonWidgetError, Result};
use crate::order::OrderMap;
use crate::path::{Key, NodePath};
use crate::storage::{self, StorageFormat};
use crate::types::{JsonType, SchemaFormat};

/// Index of a node in a [`SchemaTree`]
pub type SchemaId = NodeIndex;

/// Relationship between two schema nodes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SchemaEdge {
    /// Declared object property
    Property(String),
    /// Array item schema
    Items,
    /// Schema for object keys that are not declared
    AdditionalProperties,
    /// Alias to the node registered under a fragment id
    Fragment,
}

/// One position in the schema
#[derive(Debug, Clone)]
pub struct SchemaNode {
    /// Field name, `Index(0)` for an item schema, `None` for the root
    pub key: Option<Key>,
    pub depth: usize,
    /// Declared type; `Any` on alias nodes, whose type comes from the target
    pub ty: JsonType,
    pub title: Option<String>,
    pub description: Option<String>,
    pub required: bool,
    pub enum_values: Option<Vec<Value>>,
    /// Id other nodes can alias
    pub fragment_id: Option<String>,
    /// Id this node aliases
    pub fragment_ref: Option<String>,
    /// Declared property keys in authored order
    pub property_order: Vec<String>,
    /// Name of the v1 mapping entry that held the additional-property schema
    pub wildcard_key: Option<String>,
}

impl SchemaNode {
    pub(crate) fn new(key: Option<Key>, depth: usize, ty: JsonType) -> Self {
        Self {
            key,
            depth,
            ty,
            title: None,
            description: None,
            required: false,
            enum_values: None,
            fragment_id: None,
            fragment_ref: None,
            property_order: Vec::new(),
            wildcard_key: None,
        }
    }

    pub fn is_fragment_ref(&self) -> bool {
        self.fragment_ref.is_some()
    }
}

/// A parsed schema
#[derive(Debug, Clone)]
pub struct SchemaTree {
    pub(crate) graph: DiGraph<SchemaNode, SchemaEdge>,
    pub(crate) root: SchemaId,
    pub(crate) fragments: HashMap<String, SchemaId>,
    pub(crate) format: SchemaFormat,
}

impl SchemaTree {
    // ========== Construction ==========

    /// Parse a raw schema written in `format`
    pub fn from_value(raw: &Value, order: &OrderMap, format: SchemaFormat) -> Result<Self> {
        parse::parse_schema(raw, order, format)
    }

    /// Parse a raw schema, detecting its format (`fallback` when undecidable)
    pub fn parse(raw: &Value, order: &OrderMap, fallback: SchemaFormat) -> Result<Self> {
        let format = SchemaFormat::detect(raw).unwrap_or(fallback);
        Self::from_value(raw, order, format)
    }

    /// Parse schema text (JSON or YAML, detected format)
    pub fn from_text(text: &str, storage_format: StorageFormat, fallback: SchemaFormat) -> Result<Self> {
        let (raw, order) = storage::parse_str(text, storage_format)?;
        Self::parse(&raw, &order, fallback)
    }

    /// Read and parse a schema file
    pub fn from_file(path: impl AsRef<Path>, fallback: SchemaFormat) -> Result<Self> {
        let (raw, order) = storage::read(path)?;
        Self::parse(&raw, &order, fallback)
    }

    // ========== Public API ==========

    pub fn root(&self) -> SchemaId {
        self.root
    }

    /// Vocabulary the schema was parsed from
    pub fn format(&self) -> SchemaFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.graph[id]
    }

    /// Node registered under a fragment id
    pub fn fragment(&self, fragment_id: &str) -> Option<SchemaId> {
        self.fragments.get(fragment_id).copied()
    }

    /// Follow aliases until a node that is not a fragment reference
    pub fn resolve(&self, id: SchemaId) -> SchemaId {
        let mut current = id;
        // alias chains are checked for loops at parse time; the bound is a backstop
        for _ in 0..=self.graph.node_count() {
            match self.fragment_target(current) {
                Some(target) => current = target,
                None => return current,
            }
        }
        current
    }

    pub(crate) fn fragment_target(&self, id: SchemaId) -> Option<SchemaId> {
        self.graph
            .edges(id)
            .find(|e| *e.weight() == SchemaEdge::Fragment)
            .map(|e| e.target())
    }

    /// Type at this position
    pub fn ty(&self, id: SchemaId) -> JsonType {
        self.graph[self.resolve(id)].ty
    }

    pub fn is_type(&self, id: SchemaId, ty: JsonType) -> bool {
        self.ty(id) == ty
    }

    /// Whether this position must be present in a document
    pub fn is_required(&self, id: SchemaId) -> bool {
        self.graph[id].required
    }

    /// Explicit title, the alias's own title winning over its target's
    pub fn title(&self, id: SchemaId) -> Option<&str> {
        self.graph[id]
            .title
            .as_deref()
            .or_else(|| self.graph[self.resolve(id)].title.as_deref())
    }

    pub fn description(&self, id: SchemaId) -> Option<&str> {
        self.graph[id]
            .description
            .as_deref()
            .or_else(|| self.graph[self.resolve(id)].description.as_deref())
    }

    pub fn is_enum(&self, id: SchemaId) -> bool {
        self.enum_options(id).is_some()
    }

    pub fn enum_options(&self, id: SchemaId) -> Option<&[Value]> {
        self.graph[self.resolve(id)].enum_values.as_deref()
    }

    pub fn blank_value(&self, id: SchemaId) -> Value {
        self.ty(id).blank_value()
    }

    /// Declared properties of an object position, in authored order
    pub fn properties(&self, id: SchemaId) -> Vec<(String, SchemaId)> {
        let target = self.resolve(id);
        let mut declared: HashMap<&str, SchemaId> = self
            .graph
            .edges(target)
            .filter_map(|e| match e.weight() {
                SchemaEdge::Property(name) => Some((name.as_str(), e.target())),
                _ => None,
            })
            .collect();

        self.graph[target]
            .property_order
            .iter()
            .filter_map(|name| declared.remove(name.as_str()).map(|child| (name.clone(), child)))
            .collect()
    }

    /// Declared property names of an object position, in authored order
    pub fn property_keys(&self, id: SchemaId) -> Vec<String> {
        self.graph[self.resolve(id)].property_order.clone()
    }

    pub fn is_declared(&self, id: SchemaId, name: &str) -> bool {
        self.child_by_edge(id, |edge| matches!(edge, SchemaEdge::Property(n) if n == name))
            .is_some()
    }

    /// Item schema of an array position
    pub fn items(&self, id: SchemaId) -> Option<SchemaId> {
        self.child_by_edge(id, |edge| *edge == SchemaEdge::Items)
    }

    /// Schema for undeclared keys of an object position, if any are allowed
    pub fn additional_properties(&self, id: SchemaId) -> Option<SchemaId> {
        self.child_by_edge(id, |edge| *edge == SchemaEdge::AdditionalProperties)
    }

    pub fn allows_additional(&self, id: SchemaId) -> bool {
        self.additional_properties(id).is_some()
    }

    fn child_by_edge(&self, id: SchemaId, pred: impl Fn(&SchemaEdge) -> bool) -> Option<SchemaId> {
        self.graph
            .edges(self.resolve(id))
            .find(|e| pred(e.weight()))
            .map(|e| e.target())
    }

    /// Schema for the child at `key`: the declared property or, failing that,
    /// the additional-property schema for objects; the item schema for arrays
    /// regardless of index.
    pub fn child_schema(&self, id: SchemaId, key: &Key) -> Option<SchemaId> {
        match (self.ty(id), key) {
            (JsonType::Object, Key::Field(name)) => self
                .child_by_edge(id, |edge| matches!(edge, SchemaEdge::Property(n) if n == name))
                .or_else(|| self.additional_properties(id)),
            (JsonType::Array, _) => self.items(id),
            _ => None,
        }
    }

    /// Like [`child_schema`](Self::child_schema), failing with `InvalidKey`
    pub fn get_child(&self, id: SchemaId, key: &Key) -> Result<SchemaId> {
        self.child_schema(id, key).ok_or_else(|| JsonWidgetError::InvalidKey {
            path: self.schema_path(id),
            key: key.to_string(),
        })
    }

    /// Structural parent (aliases pointing at a node are not parents)
    pub fn parent(&self, id: SchemaId) -> Option<SchemaId> {
        self.graph
            .edges_directed(id, Direction::Incoming)
            .find(|e| *e.weight() != SchemaEdge::Fragment)
            .map(|e| e.source())
    }

    /// Keys from the schema root to `id`
    pub fn schema_path(&self, id: SchemaId) -> NodePath {
        let mut keys = Vec::new();
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            if let Some(key) = &self.graph[current].key {
                keys.push(key.clone());
            }
            current = parent;
        }
        keys.reverse();
        NodePath::new(keys)
    }

    /// Whether `id` is the additional-property schema of its parent
    pub fn is_additional(&self, id: SchemaId) -> bool {
        self.graph
            .edges_directed(id, Direction::Incoming)
            .any(|e| *e.weight() == SchemaEdge::AdditionalProperties)
    }
}
