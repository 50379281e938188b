//! Document Tree
//!
//! A document bound to its schema. Nodes live in an arena indexed by
//! [`NodeId`]; each node records its parent, its key within the parent and the
//! schema position it is bound to. Container values are never stored whole:
//! [`DocumentTree::data`] assembles them from the children, so the tree is the
//! only copy of the document.
//!
//! Binding walks the value and the schema together. Every value must be
//! type-compatible with its schema position, every object key must be
//! declared or covered by the additional-property schema, and any required
//! field missing from the input is synthesized with its type's blank value.
//!
//! A position typed `any` accepts any value; containers found there bind
//! their children to the same `any` schema, so they stay editable.

pub mod mutate;

pub use mutate::Command;

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::error::{JsonWidgetError, Result};
use crate::order::{arrange_keys, OrderMap};
use crate::path::{Key, NodePath};
use crate::schema::{SchemaId, SchemaTree};
use crate::types::{classify, JsonType};

static LEAF: OrderMap = OrderMap::Leaf;

const DEFAULT_PLACEHOLDER_KEY: &str = "newkey";

/// Index of a node in a [`DocumentTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a node holds
#[derive(Debug, Clone)]
pub(crate) enum Content {
    Scalar(Value),
    Object {
        children: BTreeMap<String, NodeId>,
        /// Child keys in display order; always the same set as `children`
        order: Vec<String>,
    },
    Array(Vec<NodeId>),
}

/// One bound position in the document
#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub(crate) key: Option<Key>,
    pub(crate) depth: usize,
    pub(crate) parent: Option<NodeId>,
    pub(crate) schema: SchemaId,
    pub(crate) content: Content,
}

impl DocumentNode {
    /// Key within the parent, `None` for the root
    pub fn key(&self) -> Option<&Key> {
        self.key.as_ref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Schema position this node is bound to
    pub fn schema(&self) -> SchemaId {
        self.schema
    }

    pub fn is_container(&self) -> bool {
        !matches!(self.content, Content::Scalar(_))
    }

    /// Scalar value, `None` for containers
    pub fn scalar(&self) -> Option<&Value> {
        match &self.content {
            Content::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

/// Where a node being bound will sit
pub(crate) struct Slot {
    pub(crate) key: Option<Key>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) depth: usize,
}

/// A document bound to a schema
#[derive(Debug, Clone)]
pub struct DocumentTree {
    pub(crate) schema: Arc<SchemaTree>,
    /// Node arena. Removed subtrees and the scratch slot used by container
    /// `set_data` leave `None` entries behind, so ids stay stable and the
    /// arena only grows over a session.
    pub(crate) nodes: Vec<Option<DocumentNode>>,
    pub(crate) root: NodeId,
    pub(crate) edit_count: u64,
    pub(crate) saved_edit_count: u64,
    pub(crate) cursor: Option<NodeId>,
    pub(crate) placeholder_key: String,
}

impl DocumentTree {
    // ========== Binding ==========

    /// Bind `data` to `schema`. `order` supplies the authored key order; keys
    /// it does not mention are arranged lexically.
    pub fn new(data: &Value, schema: Arc<SchemaTree>, order: Option<&OrderMap>) -> Result<Self> {
        let mut tree = Self {
            schema,
            nodes: Vec::new(),
            root: NodeId(0),
            edit_count: 0,
            saved_edit_count: 0,
            cursor: None,
            placeholder_key: DEFAULT_PLACEHOLDER_KEY.to_string(),
        };

        let root_schema = tree.schema.root();
        let slot = Slot {
            key: None,
            parent: None,
            depth: 0,
        };
        tree.root = tree.bind_value(data, root_schema, slot, order.unwrap_or(&LEAF), &mut Vec::new())?;
        debug!(nodes = tree.len(), "bound document");
        Ok(tree)
    }

    /// Stem used for generated additional-property keys
    pub fn with_placeholder_key(mut self, stem: impl Into<String>) -> Self {
        self.placeholder_key = stem.into();
        self
    }

    /// Bind `value` at `slot`. `chain` holds the resolved schemas of the
    /// ancestors being bound, which stops blank-value synthesis from
    /// recursing through self-referencing schemas.
    pub(crate) fn bind_value(
        &mut self,
        value: &Value,
        schema_id: SchemaId,
        slot: Slot,
        order: &OrderMap,
        chain: &mut Vec<SchemaId>,
    ) -> Result<NodeId> {
        let schema = Arc::clone(&self.schema);
        let found = classify(value);
        let expected = schema.ty(schema_id);
        if !found.is_compatible_with(expected) {
            return Err(JsonWidgetError::Validation {
                path: self.slot_path(&slot),
                found: found.to_string(),
                expected: expected.to_string(),
            });
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(DocumentNode {
            key: slot.key,
            depth: slot.depth,
            parent: slot.parent,
            schema: schema_id,
            content: Content::Scalar(Value::Null),
        }));

        chain.push(schema.resolve(schema_id));
        let content = match value {
            Value::Object(map) => self.bind_object(id, map, schema_id, order, chain),
            Value::Array(items) => self.bind_array(id, items, schema_id, order, chain),
            scalar => Ok(Content::Scalar(scalar.clone())),
        };
        chain.pop();

        self.node_mut(id)?.content = content?;
        Ok(id)
    }

    fn bind_object(
        &mut self,
        id: NodeId,
        map: &Map<String, Value>,
        schema_id: SchemaId,
        order: &OrderMap,
        chain: &mut Vec<SchemaId>,
    ) -> Result<Content> {
        let schema = Arc::clone(&self.schema);
        let depth = self.node(id)?.depth + 1;
        let mut children = BTreeMap::new();
        let mut keys = Vec::with_capacity(map.len());

        let authored = order.keys();
        for name in arrange_keys(map.keys().map(String::as_str), &authored) {
            let key = Key::field(name);
            let child_schema = self
                .child_schema(schema_id, &key)
                .ok_or_else(|| JsonWidgetError::InvalidKey {
                    path: self.path(id),
                    key: name.to_string(),
                })?;
            let slot = Slot {
                key: Some(key),
                parent: Some(id),
                depth,
            };
            let child_order = order.field(name).unwrap_or(&LEAF);
            let child = self.bind_value(&map[name], child_schema, slot, child_order, chain)?;
            children.insert(name.to_string(), child);
            keys.push(name.to_string());
        }

        for (name, child_schema) in schema.properties(schema_id) {
            if self.is_required_position(child_schema, schema_id) && !children.contains_key(&name) {
                let child = self.synthesize(id, Key::field(name.as_str()), child_schema, depth, chain)?;
                children.insert(name.clone(), child);
                keys.push(name);
            }
        }

        // synthesized keys join the unordered tail, which stays lexical
        let keys = arrange_keys(keys.iter().map(String::as_str), &authored)
            .into_iter()
            .map(String::from)
            .collect();
        Ok(Content::Object {
            children,
            order: keys,
        })
    }

    fn bind_array(
        &mut self,
        id: NodeId,
        items: &[Value],
        schema_id: SchemaId,
        order: &OrderMap,
        chain: &mut Vec<SchemaId>,
    ) -> Result<Content> {
        let depth = self.node(id)?.depth + 1;
        let item_schema = self.child_schema(schema_id, &Key::Index(0));
        let mut ids = Vec::with_capacity(items.len());

        for (i, item) in items.iter().enumerate() {
            let item_schema = item_schema.ok_or_else(|| JsonWidgetError::InvalidKey {
                path: self.path(id),
                key: i.to_string(),
            })?;
            let slot = Slot {
                key: Some(Key::Index(i)),
                parent: Some(id),
                depth,
            };
            ids.push(self.bind_value(item, item_schema, slot, order.item(i).unwrap_or(&LEAF), chain)?);
        }

        if let Some(item_schema) = item_schema {
            if ids.is_empty() && self.is_required_position(item_schema, schema_id) {
                ids.push(self.synthesize(id, Key::Index(0), item_schema, depth, chain)?);
            }
        }

        Ok(Content::Array(ids))
    }

    /// Bind a blank value for a missing required position
    fn synthesize(
        &mut self,
        parent: NodeId,
        key: Key,
        schema_id: SchemaId,
        depth: usize,
        chain: &mut Vec<SchemaId>,
    ) -> Result<NodeId> {
        let value = self.blank_for(schema_id, chain);
        debug!(parent = %self.path(parent), key = %key, "synthesizing required field");
        let slot = Slot {
            key: Some(key),
            parent: Some(parent),
            depth,
        };
        self.bind_value(&value, schema_id, slot, &LEAF, chain)
    }

    /// Blank value for a new node, `null` where a blank container would
    /// re-enter a schema already on `chain`
    pub(crate) fn blank_for(&self, schema_id: SchemaId, chain: &[SchemaId]) -> Value {
        if chain.contains(&self.schema.resolve(schema_id)) {
            Value::Null
        } else {
            self.schema.blank_value(schema_id)
        }
    }

    /// Whether a child bound to `schema_id` under `parent_schema` must be
    /// present. Children of an `any` container share its schema id and never
    /// inherit its own requiredness.
    pub(crate) fn is_required_position(&self, schema_id: SchemaId, parent_schema: SchemaId) -> bool {
        schema_id != parent_schema && self.schema.is_required(schema_id)
    }

    /// Schema for the child at `key`; `any` positions are open all the way down
    pub(crate) fn child_schema(&self, schema_id: SchemaId, key: &Key) -> Option<SchemaId> {
        if self.schema.ty(schema_id) == JsonType::Any {
            Some(schema_id)
        } else {
            self.schema.child_schema(schema_id, key)
        }
    }

    /// Resolved schemas from the root down to `id`
    pub(crate) fn schema_chain(&self, id: NodeId) -> Vec<SchemaId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current.and_then(|c| self.get(c)) {
            chain.push(self.schema.resolve(node.schema));
            current = node.parent;
        }
        chain.reverse();
        chain
    }

    fn slot_path(&self, slot: &Slot) -> NodePath {
        let base = slot.parent.map(|p| self.path(p)).unwrap_or_default();
        match &slot.key {
            Some(key) => base.child(key.clone()),
            None => base,
        }
    }

    // ========== Node access ==========

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn schema(&self) -> &SchemaTree {
        &self.schema
    }

    pub fn schema_arc(&self) -> Arc<SchemaTree> {
        Arc::clone(&self.schema)
    }

    /// Number of live nodes
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Result<&DocumentNode> {
        self.get(id)
            .ok_or_else(|| JsonWidgetError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut DocumentNode> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| JsonWidgetError::NodeNotFound(id.to_string()))
    }

    /// Document type of the node's current value
    pub fn ty(&self, id: NodeId) -> Result<JsonType> {
        Ok(match &self.node(id)?.content {
            Content::Scalar(value) => classify(value),
            Content::Object { .. } => JsonType::Object,
            Content::Array(_) => JsonType::Array,
        })
    }

    /// Children in display order: authored keys first, then the rest lexically;
    /// array elements by index
    pub fn children(&self, id: NodeId) -> Result<Vec<NodeId>> {
        Ok(match &self.node(id)?.content {
            Content::Scalar(_) => Vec::new(),
            Content::Object { children, order } => order
                .iter()
                .filter_map(|key| children.get(key).copied())
                .collect(),
            Content::Array(items) => items.clone(),
        })
    }

    pub fn child_keys(&self, id: NodeId) -> Result<Vec<Key>> {
        Ok(match &self.node(id)?.content {
            Content::Scalar(_) => Vec::new(),
            Content::Object { order, .. } => order.iter().map(|k| Key::field(k.as_str())).collect(),
            Content::Array(items) => (0..items.len()).map(Key::Index).collect(),
        })
    }

    /// Child at `key`. A digit field addresses an array element.
    pub fn child(&self, id: NodeId, key: &Key) -> Result<NodeId> {
        let found = match (&self.node(id)?.content, key) {
            (Content::Object { children, .. }, Key::Field(name)) => children.get(name).copied(),
            (Content::Object { children, .. }, Key::Index(i)) => children.get(&i.to_string()).copied(),
            (Content::Array(items), Key::Index(i)) => items.get(*i).copied(),
            (Content::Array(items), Key::Field(name)) => {
                name.parse::<usize>().ok().and_then(|i| items.get(i).copied())
            }
            (Content::Scalar(_), _) => None,
        };
        found.ok_or_else(|| JsonWidgetError::NodeNotFound(self.path(id).child(key.clone()).to_string()))
    }

    /// Key as the container at `id` understands it
    pub(crate) fn container_key(&self, id: NodeId, key: &Key) -> Result<Key> {
        let is_array = match &self.node(id)?.content {
            Content::Array(_) => true,
            Content::Scalar(Value::Null) => self.schema.ty(self.node(id)?.schema) == JsonType::Array,
            _ => false,
        };
        Ok(match key {
            Key::Field(name) if is_array => name.parse::<usize>().map(Key::Index).unwrap_or_else(|_| key.clone()),
            Key::Index(i) if !is_array => Key::Field(i.to_string()),
            _ => key.clone(),
        })
    }

    /// Node addressed by `path`
    pub fn lookup(&self, path: &NodePath) -> Result<NodeId> {
        path.keys()
            .iter()
            .try_fold(self.root, |current, key| self.child(current, key))
    }

    /// Keys from the root to `id`
    pub fn path(&self, id: NodeId) -> NodePath {
        let mut keys = Vec::new();
        let mut current = self.get(id);
        while let Some(node) = current {
            if let Some(key) = &node.key {
                keys.push(key.clone());
            }
            current = node.parent.and_then(|p| self.get(p));
        }
        keys.reverse();
        NodePath::new(keys)
    }

    /// Nodes in display order, parents before children
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Ok(children) = self.children(id) {
                stack.extend(children.into_iter().rev());
            }
        }
        out
    }

    // ========== Data ==========

    /// Value at `id`, assembled from the subtree
    pub fn data(&self, id: NodeId) -> Result<Value> {
        Ok(match &self.node(id)?.content {
            Content::Scalar(value) => value.clone(),
            Content::Object { children, .. } => {
                let mut map = Map::new();
                for (key, child) in children {
                    map.insert(key.clone(), self.data(*child)?);
                }
                Value::Object(map)
            }
            Content::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|child| self.data(*child))
                    .collect::<Result<Vec<_>>>()?,
            ),
        })
    }

    /// The whole document
    pub fn to_value(&self) -> Result<Value> {
        self.data(self.root)
    }

    /// Display order of the subtree at `id`, for serialization
    pub fn order_map(&self, id: NodeId) -> OrderMap {
        match self.get(id).map(|n| &n.content) {
            Some(Content::Object { children, order }) => OrderMap::Object(
                order
                    .iter()
                    .filter_map(|key| children.get(key).map(|c| (key.clone(), self.order_map(*c))))
                    .collect(),
            ),
            Some(Content::Array(items)) => OrderMap::Array(items.iter().map(|c| self.order_map(*c)).collect()),
            _ => OrderMap::Leaf,
        }
    }

    // ========== Editing affordances ==========

    /// Keys that could be added under `id`: undeclared-yet-missing schema keys
    /// plus one fresh placeholder when additional properties are allowed; for
    /// arrays, the append index.
    pub fn available_keys(&self, id: NodeId) -> Result<Vec<Key>> {
        let node = self.node(id)?;
        let schema_ty = self.schema.ty(node.schema);

        match (&node.content, schema_ty) {
            (Content::Array(items), _) => Ok(vec![Key::Index(items.len())]),
            (Content::Scalar(Value::Null), JsonType::Array) => Ok(vec![Key::Index(0)]),
            (Content::Object { children, .. }, _) => Ok(self.object_available_keys(node.schema, |k| children.contains_key(k))),
            (Content::Scalar(Value::Null), JsonType::Object) => Ok(self.object_available_keys(node.schema, |_| false)),
            _ => Ok(Vec::new()),
        }
    }

    fn object_available_keys(&self, schema_id: SchemaId, present: impl Fn(&str) -> bool) -> Vec<Key> {
        let mut keys: Vec<Key> = self
            .schema
            .property_keys(schema_id)
            .into_iter()
            .filter(|k| !present(k))
            .map(Key::Field)
            .collect();

        let open = self.schema.ty(schema_id) == JsonType::Any || self.schema.allows_additional(schema_id);
        if open {
            let stem = self.placeholder_key.as_str();
            let taken = |name: &str| present(name) || self.schema.is_declared(schema_id, name);
            let mut candidate = stem.to_string();
            let mut n = 1;
            while taken(&candidate) {
                candidate = format!("{}{}", stem, n);
                n += 1;
            }
            keys.push(Key::Field(candidate));
        }
        keys
    }

    /// Whether removing `id` keeps every required position filled
    pub fn is_deletable(&self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        let Some(parent) = node.parent else {
            return Ok(false);
        };
        let parent_schema = self.node(parent)?.schema;
        if !self.is_required_position(node.schema, parent_schema) {
            return Ok(true);
        }
        Ok(match &self.node(parent)?.content {
            Content::Array(items) => items.len() > 1,
            _ => false,
        })
    }

    /// Array elements accept an insert before them
    pub fn is_insertable(&self, id: NodeId) -> Result<bool> {
        let node = self.node(id)?;
        Ok(match node.parent {
            Some(parent) => matches!(self.node(parent)?.content, Content::Array(_)),
            None => false,
        })
    }

    /// Display title: the schema title, else the key; array elements are
    /// numbered from 1
    pub fn title(&self, id: NodeId) -> Result<String> {
        let node = self.node(id)?;
        let Some(parent_id) = node.parent else {
            return Ok(self.schema.title(node.schema).unwrap_or("root").to_string());
        };
        let parent = self.node(parent_id)?;
        // children of an open `any` container share its schema, and its title
        let own_title = if parent.schema == node.schema {
            None
        } else {
            self.schema.title(node.schema)
        };

        Ok(match (&parent.content, &node.key) {
            (Content::Array(_), Some(Key::Index(i))) => {
                let base = match own_title {
                    Some(title) => title.to_string(),
                    None => self.title(parent_id)?,
                };
                format!("{} #{}", base, i + 1)
            }
            (_, key) => match (own_title, key) {
                (Some(title), _) => title.to_string(),
                (None, Some(key)) => key.to_string(),
                (None, None) => String::new(),
            },
        })
    }

    // ========== Cursor ==========

    /// Mark a node as the target of a pending destructive operation
    pub fn set_cursor(&mut self, id: Option<NodeId>) {
        self.cursor = id;
    }

    pub fn cursor(&self) -> Option<NodeId> {
        self.cursor
    }

    /// Whether `id` or one of its ancestors is the cursor
    pub fn is_selected(&self, id: NodeId) -> bool {
        let Some(cursor) = self.cursor else {
            return false;
        };
        self.is_within(id, cursor)
    }

    /// Whether `ancestor` is `id` or above it
    pub(crate) fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(c) = current {
            if c == ancestor {
                return true;
            }
            current = self.get(c).and_then(|n| n.parent);
        }
        false
    }

    // ========== Save state ==========

    /// Mutations since load
    pub fn edit_count(&self) -> u64 {
        self.edit_count
    }

    pub fn is_saved(&self) -> bool {
        self.saved_edit_count == self.edit_count
    }

    pub fn mark_saved(&mut self) {
        self.saved_edit_count = self.edit_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SchemaFormat;
    use serde_json::json;

    fn schema(raw: Value) -> Arc<SchemaTree> {
        let order = OrderMap::from_value(&raw);
        Arc::new(SchemaTree::parse(&raw, &order, SchemaFormat::V2).unwrap())
    }

    fn contacts_schema() -> Arc<SchemaTree> {
        schema(json!({
            "type": "object",
            "title": "Contacts",
            "properties": {
                "owner": {"type": "string", "title": "Owner", "optional": false},
                "count": {"type": "integer"},
                "ratio": {"type": "number"},
                "people": {
                    "type": "array",
                    "title": "People",
                    "items": {"type": "string", "title": "Person", "optional": false}
                },
                "meta": {"type": "object", "properties": {"tag": {"type": "string"}}}
            },
            "additionalProperties": {"type": "string"}
        }))
    }

    #[test]
    fn test_bind_round_trips_data() {
        let data = json!({"owner": "ann", "count": 2, "people": ["x", "y"], "extra": "e", "meta": {"tag": "t"}});
        let tree = DocumentTree::new(&data, contacts_schema(), None).unwrap();
        assert_eq!(tree.to_value().unwrap(), data);
        assert!(tree.is_saved());
        assert_eq!(tree.edit_count(), 0);
    }

    #[test]
    fn test_bind_synthesizes_required_fields() {
        let tree = DocumentTree::new(&json!({"people": []}), contacts_schema(), None).unwrap();
        assert_eq!(tree.to_value().unwrap(), json!({"owner": "", "people": [""]}));
    }

    #[test]
    fn test_required_any_keeps_empty_containers() {
        let schema = schema(json!({
            "type": "object",
            "properties": {"meta": {"type": "any", "optional": false}}
        }));
        for data in [json!({"meta": []}), json!({"meta": {}}), json!({"meta": {"list": []}})] {
            let tree = DocumentTree::new(&data, Arc::clone(&schema), None).unwrap();
            assert_eq!(tree.to_value().unwrap(), data);
        }
        let tree = DocumentTree::new(&json!({}), schema, None).unwrap();
        assert_eq!(tree.to_value().unwrap(), json!({"meta": null}));
    }

    #[test]
    fn test_synthesized_keys_sort_with_unordered_tail() {
        let data: Value = serde_json::from_str(r#"{"zz": "1", "people": ["p"], "count": 2}"#).unwrap();
        let order: OrderMap = serde_json::from_str(r#"{"zz": 0}"#).unwrap();
        let tree = DocumentTree::new(&data, contacts_schema(), Some(&order)).unwrap();

        let keys: Vec<String> = tree
            .child_keys(tree.root())
            .unwrap()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["zz", "count", "owner", "people"]);
    }

    #[test]
    fn test_type_mismatch_names_path() {
        let err = DocumentTree::new(&json!({"meta": {"tag": 5}}), contacts_schema(), None).unwrap_err();
        match err {
            JsonWidgetError::Validation { path, found, expected } => {
                assert_eq!(path.to_string(), "/meta/tag");
                assert_eq!(found, "integer");
                assert_eq!(expected, "string");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_integer_fits_number_and_null_fits_anything() {
        let data = json!({"owner": null, "ratio": 3, "meta": null});
        let tree = DocumentTree::new(&data, contacts_schema(), None).unwrap();
        assert_eq!(tree.to_value().unwrap(), data);
    }

    #[test]
    fn test_undeclared_key_rejected_when_closed() {
        let closed = schema(json!({"type": "object", "properties": {"a": {"type": "string"}}}));
        let err = DocumentTree::new(&json!({"b": "x"}), closed, None).unwrap_err();
        assert!(matches!(err, JsonWidgetError::InvalidKey { ref key, .. } if key == "b"));
    }

    #[test]
    fn test_children_follow_authored_order_then_lexical() {
        let text = r#"{"people": [], "owner": "o", "zz": "1", "aa": "2"}"#;
        let data: Value = serde_json::from_str(text).unwrap();
        let order: OrderMap = serde_json::from_str(r#"{"people": 0, "owner": 0}"#).unwrap();
        let tree = DocumentTree::new(&data, contacts_schema(), Some(&order)).unwrap();

        let keys: Vec<String> = tree
            .child_keys(tree.root())
            .unwrap()
            .iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["people", "owner", "aa", "zz"]);
    }

    #[test]
    fn test_lookup_and_path() {
        let data = json!({"owner": "o", "people": ["a", "b"]});
        let tree = DocumentTree::new(&data, contacts_schema(), None).unwrap();
        let b = tree.lookup(&NodePath::parse("/people/1")).unwrap();
        assert_eq!(tree.data(b).unwrap(), json!("b"));
        assert_eq!(tree.path(b).to_string(), "/people/1");
        assert!(matches!(
            tree.lookup(&NodePath::parse("/people/7")),
            Err(JsonWidgetError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_available_keys_never_collide() {
        let data = json!({"owner": "o", "newkey": "a", "newkey1": "b"});
        let tree = DocumentTree::new(&data, contacts_schema(), None).unwrap();
        let keys = tree.available_keys(tree.root()).unwrap();
        let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        // declared order of a schema built from an in-memory value is lexical
        assert_eq!(names, vec!["count", "meta", "people", "ratio", "newkey2"]);
    }

    #[test]
    fn test_available_keys_for_array_is_append_index() {
        let tree = DocumentTree::new(&json!({"owner": "o", "people": ["a"]}), contacts_schema(), None).unwrap();
        let people = tree.lookup(&NodePath::parse("/people")).unwrap();
        assert_eq!(tree.available_keys(people).unwrap(), vec![Key::Index(1)]);
    }

    #[test]
    fn test_titles() {
        let tree = DocumentTree::new(&json!({"owner": "o", "people": ["a", "b"], "extra": "x"}), contacts_schema(), None)
            .unwrap();
        let title = |p: &str| tree.title(tree.lookup(&NodePath::parse(p)).unwrap()).unwrap();
        assert_eq!(title("/"), "Contacts");
        assert_eq!(title("/owner"), "Owner");
        assert_eq!(title("/people/1"), "Person #2");
        assert_eq!(title("/extra"), "extra");
    }

    #[test]
    fn test_required_sole_item_not_deletable() {
        let tree = DocumentTree::new(&json!({"owner": "o", "people": ["a"], "count": 1}), contacts_schema(), None).unwrap();
        let only = tree.lookup(&NodePath::parse("/people/0")).unwrap();
        let owner = tree.lookup(&NodePath::parse("/owner")).unwrap();
        let count = tree.lookup(&NodePath::parse("/count")).unwrap();
        assert!(!tree.is_deletable(only).unwrap());
        assert!(!tree.is_deletable(owner).unwrap());
        assert!(tree.is_deletable(count).unwrap());
        assert!(!tree.is_deletable(tree.root()).unwrap());
        assert!(tree.is_insertable(only).unwrap());
    }

    #[test]
    fn test_recursive_required_synthesis_terminates() {
        let recursive = schema(json!({
            "id": "node",
            "type": "object",
            "properties": {
                "label": {"type": "string", "optional": false},
                "next": {"$ref": "#node", "optional": false}
            }
        }));
        let tree = DocumentTree::new(&json!({}), recursive, None).unwrap();
        assert_eq!(tree.to_value().unwrap(), json!({"label": "", "next": null}));
    }

    #[test]
    fn test_any_schema_accepts_nested_containers() {
        let open = schema(json!({"type": "any"}));
        let data = json!({"a": [1, {"b": null}], "c": "s"});
        let tree = DocumentTree::new(&data, open, None).unwrap();
        assert_eq!(tree.to_value().unwrap(), data);
        let b = tree.lookup(&NodePath::parse("/a/1/b")).unwrap();
        assert_eq!(tree.title(b).unwrap(), "b");
    }

    #[test]
    fn test_cursor_selects_subtree() {
        let mut tree = DocumentTree::new(&json!({"owner": "o", "people": ["a"]}), contacts_schema(), None).unwrap();
        let people = tree.lookup(&NodePath::parse("/people")).unwrap();
        let item = tree.lookup(&NodePath::parse("/people/0")).unwrap();
        let owner = tree.lookup(&NodePath::parse("/owner")).unwrap();
        tree.set_cursor(Some(people));
        assert!(tree.is_selected(item));
        assert!(!tree.is_selected(owner));
    }
}
