//! Mutation Engine
//!
//! Every operation validates against the bound schema before touching the
//! tree, so a failed mutation leaves the document exactly as it was. A
//! successful structural mutation counts as one edit however many nodes it
//! touches; `set_data` counts only when the value actually changes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

use super::{Content, DocumentTree, NodeId, Slot, LEAF};
use crate::error::{JsonWidgetError, Result};
use crate::path::{Key, NodePath};
use crate::schema::SchemaId;
use crate::storage::{self, OutputOptions};
use crate::types::{classify, JsonType};

/// A single editing request, addressed by path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    SetValue { path: NodePath, value: Value },
    AddChild { path: NodePath, key: Key },
    InsertChild { path: NodePath, index: usize },
    DeleteChild { path: NodePath, key: Key },
    RenameKey { path: NodePath, from: String, to: String },
}

impl Command {
    /// Node the command operates on
    pub fn path(&self) -> &NodePath {
        match self {
            Command::SetValue { path, .. }
            | Command::AddChild { path, .. }
            | Command::InsertChild { path, .. }
            | Command::DeleteChild { path, .. }
            | Command::RenameKey { path, .. } => path,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetValue { path, value } => write!(f, "set {} = {}", path, value),
            Command::AddChild { path, key } => write!(f, "add {} under {}", key, path),
            Command::InsertChild { path, index } => write!(f, "insert at {} in {}", index, path),
            Command::DeleteChild { path, key } => write!(f, "delete {} from {}", key, path),
            Command::RenameKey { path, from, to } => write!(f, "rename {} to {} in {}", from, to, path),
        }
    }
}

fn child_ids(content: &Content) -> Vec<NodeId> {
    match content {
        Content::Scalar(_) => Vec::new(),
        Content::Object { children, .. } => children.values().copied().collect(),
        Content::Array(items) => items.clone(),
    }
}

impl DocumentTree {
    /// Run one command; returns the node it created or changed, if any
    pub fn apply(&mut self, command: &Command) -> Result<Option<NodeId>> {
        debug!(%command, "applying command");
        match command {
            Command::SetValue { path, value } => {
                let id = self.lookup(path)?;
                self.set_data(id, value.clone())?;
                Ok(Some(id))
            }
            Command::AddChild { path, key } => {
                let parent = self.lookup(path)?;
                self.add_child(parent, key.clone()).map(Some)
            }
            Command::InsertChild { path, index } => {
                let parent = self.lookup(path)?;
                self.insert_child(parent, *index).map(Some)
            }
            Command::DeleteChild { path, key } => {
                let parent = self.lookup(path)?;
                self.delete_child(parent, key.clone())?;
                Ok(None)
            }
            Command::RenameKey { path, from, to } => {
                let parent = self.lookup(path)?;
                self.change_child_key(parent, from, to)?;
                self.child(parent, &Key::field(to.as_str())).map(Some)
            }
        }
    }

    // ========== Values ==========

    /// Replace the value at `id`. Container values rebind the subtree in
    /// place, so `id` stays valid. Returns whether anything changed.
    pub fn set_data(&mut self, id: NodeId, value: Value) -> Result<bool> {
        let schema_id = self.node(id)?.schema;
        let found = classify(&value);
        let expected = self.schema.ty(schema_id);
        if !found.is_compatible_with(expected) {
            return Err(JsonWidgetError::Validation {
                path: self.path(id),
                found: found.to_string(),
                expected: expected.to_string(),
            });
        }
        if let Some(options) = self.schema.enum_options(schema_id) {
            if !value.is_null() && !options.contains(&value) {
                return Err(JsonWidgetError::EnumViolation {
                    path: self.path(id),
                    value: value.to_string(),
                    options: Value::Array(options.to_vec()).to_string(),
                });
            }
        }

        if self.data(id)? == value {
            return Ok(false);
        }

        self.replace_value(id, &value)?;
        self.edit_count += 1;
        debug!(path = %self.path(id), edits = self.edit_count, "set value");
        Ok(true)
    }

    /// Rebind `id` to `value` without counting an edit
    fn replace_value(&mut self, id: NodeId, value: &Value) -> Result<()> {
        let node = self.node(id)?;
        let schema_id = node.schema;
        let slot = Slot {
            key: node.key.clone(),
            parent: node.parent,
            depth: node.depth,
        };
        let mut chain = match node.parent {
            Some(parent) => self.schema_chain(parent),
            None => Vec::new(),
        };
        // keep the current key order for keys the new value shares
        let order = self.order_map(id);

        let mark = self.nodes.len();
        let fresh = match self.bind_value(value, schema_id, slot, &order, &mut chain) {
            Ok(fresh) => fresh,
            Err(e) => {
                self.nodes.truncate(mark);
                return Err(e);
            }
        };
        let fresh_node = self
            .nodes
            .get_mut(fresh.index())
            .and_then(Option::take)
            .ok_or_else(|| JsonWidgetError::NodeNotFound(fresh.to_string()))?;

        for child in child_ids(&fresh_node.content) {
            self.node_mut(child)?.parent = Some(id);
        }
        for stale in child_ids(&self.node(id)?.content) {
            self.remove_subtree(stale)?;
        }
        self.node_mut(id)?.content = fresh_node.content;
        Ok(())
    }

    // ========== Structure ==========

    /// Add a blank child at `key`: a declared or additional key of an object,
    /// or the append index of an array. A null container is first turned into
    /// its blank container.
    pub fn add_child(&mut self, parent: NodeId, key: Key) -> Result<NodeId> {
        let key = self.container_key(parent, &key)?;
        let schema_id = self.node(parent)?.schema;

        if matches!(self.node(parent)?.content, Content::Scalar(Value::Null)) {
            let ty = self.schema.ty(schema_id);
            if !ty.is_container() {
                return Err(JsonWidgetError::mutation(
                    self.path(parent),
                    format!("null {} cannot hold children", ty),
                ));
            }
            self.check_new_key(parent, schema_id, ty, &key)?;
            self.replace_value(parent, &ty.blank_value())?;
            // required children synthesized by the conversion already exist
            let id = match self.child(parent, &key) {
                Ok(existing) => existing,
                Err(_) => self.attach_child(parent, key)?,
            };
            self.edit_count += 1;
            return Ok(id);
        }

        let id = self.attach_child(parent, key)?;
        self.edit_count += 1;
        Ok(id)
    }

    /// Key checks `attach_child` would make, for a container that is still null
    fn check_new_key(&self, parent: NodeId, schema_id: SchemaId, ty: JsonType, key: &Key) -> Result<()> {
        match (ty, key) {
            (JsonType::Array, Key::Index(0)) => Ok(()),
            (JsonType::Array, _) => Err(JsonWidgetError::mutation(
                self.path(parent),
                format!("arrays grow at index 0, not {}", key),
            )),
            (_, Key::Field(_)) if self.child_schema(schema_id, key).is_some() => Ok(()),
            _ => Err(JsonWidgetError::InvalidKey {
                path: self.path(parent),
                key: key.to_string(),
            }),
        }
    }

    fn attach_child(&mut self, parent: NodeId, key: Key) -> Result<NodeId> {
        let path = self.path(parent);
        let schema_id = self.node(parent)?.schema;

        match &self.node(parent)?.content {
            Content::Object { children, .. } => {
                let name = key.to_string();
                if children.contains_key(&name) {
                    return Err(JsonWidgetError::KeyCollision { path, key: name });
                }
                let child_schema = self
                    .child_schema(schema_id, &key)
                    .ok_or_else(|| JsonWidgetError::InvalidKey {
                        path: path.clone(),
                        key: name.clone(),
                    })?;
                let id = self.bind_blank(parent, Key::field(name.as_str()), child_schema)?;
                if let Content::Object { children, order } = &mut self.node_mut(parent)?.content {
                    children.insert(name.clone(), id);
                    order.push(name);
                }
                debug!(%path, key = %key, "added child");
                Ok(id)
            }
            Content::Array(items) => {
                let len = items.len();
                if key != Key::Index(len) {
                    return Err(JsonWidgetError::mutation(
                        path,
                        format!("arrays grow at index {}, not {}", len, key),
                    ));
                }
                self.insert_item(parent, len)
            }
            Content::Scalar(_) => Err(JsonWidgetError::mutation(path, "not a container")),
        }
    }

    /// Insert a blank element before `index`, shifting later elements
    pub fn insert_child(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let len = match &self.node(parent)?.content {
            Content::Array(items) => items.len(),
            _ => {
                return Err(JsonWidgetError::mutation(
                    self.path(parent),
                    "insert is only supported in arrays",
                ))
            }
        };
        if index > len {
            return Err(JsonWidgetError::mutation(
                self.path(parent),
                format!("index {} is past the end ({} elements)", index, len),
            ));
        }

        let id = self.insert_item(parent, index)?;
        self.edit_count += 1;
        Ok(id)
    }

    fn insert_item(&mut self, parent: NodeId, index: usize) -> Result<NodeId> {
        let schema_id = self.node(parent)?.schema;
        let item_schema = self
            .child_schema(schema_id, &Key::Index(index))
            .ok_or_else(|| JsonWidgetError::InvalidKey {
                path: self.path(parent),
                key: index.to_string(),
            })?;

        let id = self.bind_blank(parent, Key::Index(index), item_schema)?;
        if let Content::Array(items) = &mut self.node_mut(parent)?.content {
            items.insert(index, id);
        }
        self.renumber(parent, index + 1)?;
        debug!(path = %self.path(parent), index, "inserted element");
        Ok(id)
    }

    /// Bind a blank value for a new child; nothing is left behind on failure
    fn bind_blank(&mut self, parent: NodeId, key: Key, schema_id: SchemaId) -> Result<NodeId> {
        let mut chain = self.schema_chain(parent);
        let value = self.blank_for(schema_id, &chain);
        let slot = Slot {
            key: Some(key),
            parent: Some(parent),
            depth: self.node(parent)?.depth + 1,
        };

        let mark = self.nodes.len();
        match self.bind_value(&value, schema_id, slot, &LEAF, &mut chain) {
            Ok(id) => Ok(id),
            Err(e) => {
                self.nodes.truncate(mark);
                Err(e)
            }
        }
    }

    /// Refresh the keys of array elements from `from` on
    fn renumber(&mut self, parent: NodeId, from: usize) -> Result<()> {
        let items = match &self.node(parent)?.content {
            Content::Array(items) => items.clone(),
            _ => return Ok(()),
        };
        for (i, item) in items.into_iter().enumerate().skip(from) {
            self.node_mut(item)?.key = Some(Key::Index(i));
        }
        Ok(())
    }

    /// Remove the child at `key`. Fails if the child is required and no other
    /// element can stand in for it.
    pub fn delete_child(&mut self, parent: NodeId, key: Key) -> Result<()> {
        let key = self.container_key(parent, &key)?;
        let child = self.child(parent, &key)?;
        if !self.is_deletable(child)? {
            return Err(JsonWidgetError::mutation(
                self.path(child),
                "required and cannot be removed",
            ));
        }

        let mut shifted_from = None;
        match &mut self.node_mut(parent)?.content {
            Content::Object { children, order } => {
                let name = key.to_string();
                children.remove(&name);
                order.retain(|k| *k != name);
            }
            Content::Array(items) => {
                if let Some(pos) = items.iter().position(|c| *c == child) {
                    items.remove(pos);
                    shifted_from = Some(pos);
                }
            }
            Content::Scalar(_) => {}
        }
        if let Some(pos) = shifted_from {
            self.renumber(parent, pos)?;
        }

        self.remove_subtree(child)?;
        self.edit_count += 1;
        debug!(path = %self.path(parent), key = %key, edits = self.edit_count, "deleted child");
        Ok(())
    }

    /// Drop `id` and its descendants from the arena, clearing the cursor if it
    /// pointed into them
    fn remove_subtree(&mut self, id: NodeId) -> Result<()> {
        if let Some(cursor) = self.cursor {
            if self.is_within(cursor, id) {
                self.cursor = None;
            }
        }

        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let node = self
                .nodes
                .get_mut(current.index())
                .and_then(Option::take)
                .ok_or_else(|| JsonWidgetError::NodeNotFound(current.to_string()))?;
            stack.extend(child_ids(&node.content));
        }
        Ok(())
    }

    /// Rename an additional-property entry, keeping its place in the order
    pub fn change_child_key(&mut self, parent: NodeId, from: &str, to: &str) -> Result<()> {
        let path = self.path(parent);
        let parent_schema = self.node(parent)?.schema;
        let Content::Object { children, .. } = &self.node(parent)?.content else {
            return Err(JsonWidgetError::mutation(path, "only object keys can be renamed"));
        };
        let child = children
            .get(from)
            .copied()
            .ok_or_else(|| JsonWidgetError::NodeNotFound(path.child(Key::field(from)).to_string()))?;
        if from == to {
            return Ok(());
        }

        let open = self.schema.ty(parent_schema) == JsonType::Any;
        if !open && !self.schema.is_additional(self.node(child)?.schema) {
            return Err(JsonWidgetError::mutation(
                self.path(child),
                "only additional properties can be renamed",
            ));
        }
        if children.contains_key(to) || self.schema.is_declared(parent_schema, to) {
            return Err(JsonWidgetError::KeyCollision {
                path,
                key: to.to_string(),
            });
        }

        if let Content::Object { children, order } = &mut self.node_mut(parent)?.content {
            children.remove(from);
            children.insert(to.to_string(), child);
            if let Some(slot) = order.iter_mut().find(|k| k.as_str() == from) {
                *slot = to.to_string();
            }
        }
        self.node_mut(child)?.key = Some(Key::field(to));
        self.edit_count += 1;
        debug!(%path, from, to, "renamed key");
        Ok(())
    }

    // ========== Persistence ==========

    /// Write the document to `path`; on success the tree counts as saved
    pub fn save(&mut self, path: impl AsRef<Path>, options: &OutputOptions) -> Result<()> {
        let path = path.as_ref();
        let data = self.to_value()?;
        storage::write(&data, &self.order_map(self.root), path, options)?;
        self.mark_saved();
        info!(path = %path.display(), edits = self.edit_count, "saved document");
        Ok(())
    }
}
