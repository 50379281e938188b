//! Editing session
//!
//! Ties a document file, its schema and the footer together: opening reads
//! and binds, every command goes through [`EditSession::apply`], and saving
//! writes back to the file the session was opened on.

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::bundled;
use crate::config::EditorConfig;
use crate::document::{Command, DocumentTree, NodeId};
use crate::error::{JsonWidgetError, Result};
use crate::order::OrderMap;
use crate::present::Footer;
use crate::schema::{generate_from_example, SchemaTree};
use crate::storage::{self, OutputOptions, StorageFormat};

/// Where the schema for a document comes from
#[derive(Debug, Clone)]
pub enum SchemaSource {
    /// Already parsed
    Tree(Arc<SchemaTree>),
    /// Schema file (JSON or YAML by extension)
    File(PathBuf),
    /// Schema text
    Literal(String),
    /// Path, search-path entry or bundled schema name
    Named(String),
    /// Inferred from the document itself
    Generated,
}

impl SchemaSource {
    /// A `--schema` argument: an existing file, else a name to look up
    pub fn from_arg(arg: Option<&str>) -> Self {
        match arg {
            Some(name) if Path::new(name).is_file() => SchemaSource::File(PathBuf::from(name)),
            Some(name) => SchemaSource::Named(name.to_string()),
            None => SchemaSource::Generated,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, SchemaSource::Generated)
    }

    /// Produce the schema; `document` is needed only for generation
    pub fn resolve(&self, document: Option<(&Value, &OrderMap)>, config: &EditorConfig) -> Result<Arc<SchemaTree>> {
        let fallback = config.schema.format;
        let tree = match self {
            SchemaSource::Tree(tree) => return Ok(Arc::clone(tree)),
            SchemaSource::File(path) => SchemaTree::from_file(path, fallback)?,
            SchemaSource::Literal(text) => {
                let format = if text.trim_start().starts_with('{') {
                    StorageFormat::Json
                } else {
                    StorageFormat::Yaml
                };
                SchemaTree::from_text(text, format, fallback)?
            }
            SchemaSource::Named(name) => bundled::find_schema(name, &config.schema.search_path)?.load(fallback)?,
            SchemaSource::Generated => {
                let (value, order) = document.ok_or_else(|| {
                    JsonWidgetError::Schema("a schema can only be generated from an existing document".to_string())
                })?;
                generate_from_example(value, order, fallback)?
            }
        };
        Ok(Arc::new(tree))
    }
}

/// One document being edited
pub struct EditSession {
    tree: DocumentTree,
    filename: PathBuf,
    config: EditorConfig,
    footer: Footer,
}

impl EditSession {
    /// Read `filename` (or start from the schema's blank value when it does
    /// not exist yet), resolve the schema and bind. Validation errors are
    /// returned as-is; a document that does not bind cannot be edited.
    pub fn open(filename: impl AsRef<Path>, source: SchemaSource, config: EditorConfig) -> Result<Self> {
        let filename = filename.as_ref().to_path_buf();
        let existing = if filename.exists() {
            Some(storage::read(&filename)?)
        } else {
            None
        };

        let schema = source.resolve(existing.as_ref().map(|(value, order)| (value, order)), &config)?;
        let (data, order) = match existing {
            Some(document) => document,
            None => (schema.blank_value(schema.root()), OrderMap::Leaf),
        };

        let tree = DocumentTree::new(&data, schema, Some(&order))?
            .with_placeholder_key(config.editor.placeholder_key.as_str());

        let mut footer = Footer::new(filename.display().to_string(), config.notification_timeout());
        if source.is_generated() {
            footer.notify_persistent("Using schema derived from the document; pass --schema to use another");
        }

        info!(path = %filename.display(), nodes = tree.len(), "opened document");
        Ok(Self {
            tree,
            filename,
            config,
            footer,
        })
    }

    pub fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DocumentTree {
        &mut self.tree
    }

    pub fn filename(&self) -> &Path {
        &self.filename
    }

    pub fn footer(&self) -> &Footer {
        &self.footer
    }

    pub fn footer_mut(&mut self) -> &mut Footer {
        &mut self.footer
    }

    pub fn is_saved(&self) -> bool {
        self.tree.is_saved()
    }

    /// Apply one command; a failure is posted to the footer and returned
    pub fn apply(&mut self, command: &Command) -> Result<Option<NodeId>> {
        match self.tree.apply(command) {
            Ok(affected) => Ok(affected),
            Err(e) => {
                warn!(%command, error = %e, "command rejected");
                self.footer.notify(e.to_string(), Instant::now());
                Err(e)
            }
        }
    }

    /// Apply commands in order, stopping at the first failure
    pub fn apply_all(&mut self, commands: &[Command]) -> Result<usize> {
        for command in commands {
            self.apply(command)?;
        }
        Ok(commands.len())
    }

    /// Write back to the session's file
    pub fn save(&mut self) -> Result<()> {
        let filename = self.filename.clone();
        self.save_as(filename)
    }

    /// Write to `path`, which becomes the session's file
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        let options = OutputOptions::from_config(&self.config);
        if let Err(e) = self.tree.save(&path, &options) {
            self.footer.notify(format!("Save failed: {}", e), Instant::now());
            return Err(e);
        }
        self.footer.notify(format!("Saved {}", path.display()), Instant::now());
        self.filename = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::{Key, NodePath};
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_open_missing_file_starts_blank() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.json");
        let session = EditSession::open(
            &path,
            SchemaSource::Named("datatype-example".to_string()),
            EditorConfig::default(),
        )
        .unwrap();

        assert_eq!(session.tree().to_value().unwrap(), json!({"name": ""}));
        assert!(session.is_saved());
    }

    #[test]
    fn test_generated_schema_requires_document() {
        let dir = tempfile::tempdir().unwrap();
        let err = EditSession::open(dir.path().join("absent.json"), SchemaSource::Generated, EditorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, JsonWidgetError::Schema(_)));
    }

    #[test]
    fn test_apply_reports_on_footer_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, r#"{"b": 1, "a": "x"}"#).unwrap();

        let mut session = EditSession::open(&path, SchemaSource::Generated, EditorConfig::default()).unwrap();
        let bad = Command::SetValue {
            path: NodePath::parse("/b"),
            value: json!("not a number"),
        };
        assert!(session.apply(&bad).is_err());
        assert!(session.footer().text().contains("Validation error at /b"));

        let good = Command::SetValue {
            path: NodePath::parse("/b"),
            value: json!(2),
        };
        session.apply(&good).unwrap();
        assert!(!session.is_saved());
        session.save().unwrap();
        assert!(session.is_saved());

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\n    \"b\": 2,\n    \"a\": \"x\"\n}\n");
    }

    #[test]
    fn test_literal_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.yaml");
        fs::write(&path, "- one\n- two\n").unwrap();

        let source = SchemaSource::Literal("type: seq\nsequence:\n  - type: str\n".to_string());
        let mut session = EditSession::open(&path, source, EditorConfig::default()).unwrap();
        let root = session.tree().root();
        session.tree_mut().add_child(root, Key::Index(2)).unwrap();
        session.save().unwrap();

        let (saved, _) = storage::read(&path).unwrap();
        assert_eq!(saved, json!(["one", "two", ""]));
    }
}
