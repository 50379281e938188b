//! Keys and paths addressing positions inside a document

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Local identifier of a node within its parent container
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    /// Array position
    Index(usize),
    /// Object field name
    Field(String),
}

impl Key {
    pub fn field(name: impl Into<String>) -> Self {
        Key::Field(name.into())
    }

    pub fn as_field(&self) -> Option<&str> {
        match self {
            Key::Field(name) => Some(name),
            Key::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Field(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{}", i),
            Key::Field(name) => write!(f, "{}", name),
        }
    }
}

impl From<usize> for Key {
    fn from(i: usize) -> Self {
        Key::Index(i)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::Field(s.to_string())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::Field(s)
    }
}

/// Chain of keys from the document root, displayed as a JSON Pointer.
///
/// Segments parsed from text are kept as fields; whether a digit segment
/// names an array index is decided against the document during lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<Key>);

impl NodePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn new(keys: Vec<Key>) -> Self {
        Self(keys)
    }

    pub fn keys(&self) -> &[Key] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, key: Key) {
        self.0.push(key);
    }

    pub fn pop(&mut self) -> Option<Key> {
        self.0.pop()
    }

    /// Path of a child of this path
    pub fn child(&self, key: Key) -> Self {
        let mut keys = self.0.clone();
        keys.push(key);
        Self(keys)
    }

    /// Parse a JSON Pointer (`/a/0/b`); an empty string or `/` is the root
    pub fn parse(pointer: &str) -> Self {
        if pointer.is_empty() || pointer == "/" {
            return Self::root();
        }
        let trimmed = pointer.strip_prefix('/').unwrap_or(pointer);
        let keys = trimmed
            .split('/')
            .map(|segment| Key::Field(segment.replace("~1", "/").replace("~0", "~")))
            .collect();
        Self(keys)
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "/");
        }
        for key in &self.0 {
            let segment = key.to_string().replace('~', "~0").replace('/', "~1");
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl Serialize for NodePath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodePath {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pointer = String::deserialize(deserializer)?;
        Ok(Self::parse(&pointer))
    }
}
