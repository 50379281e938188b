//! jsonwidget
//!
//! Schema-driven editing of JSON and YAML documents. A document is bound to a
//! schema on load, edited through type-checked mutations and written back in
//! the key order it was authored in.
//!
//! ## Features
//!
//! - **Two schema vocabularies**: v1 (`map`/`seq`/`user_key`) and v2
//!   (`object`/`array`/`additionalProperties`), with conversion between them
//! - **Validated binding**: type mismatches and undeclared keys are reported
//!   with the full path of the offending node
//! - **Required-field completion**: missing required fields get blank values
//! - **Order preservation**: authored key order survives a load/save cycle
//! - **Edit tracking**: an edit counter tells saved and unsaved state apart
//! - **Schema generation**: infer a schema from an example document
//!
//! ## Architecture
//!
//! ```text
//! storage ──(Value, OrderMap)──> DocumentTree::new ──binds against──> SchemaTree
//!                                      │                                  │
//!                                 mutate / Command                  parse / emit / generate
//!                                      │
//!                               present (titles, editors, footer) ── session ── bin/jsonwidget
//! ```

pub mod bundled;
pub mod config;
pub mod document;
pub mod error;
pub mod order;
pub mod path;
pub mod present;
pub mod schema;
pub mod session;
pub mod storage;
pub mod types;

pub use config::{EditorConfig, OutputFormat};
pub use document::{Command, DocumentNode, DocumentTree, NodeId};
pub use error::{JsonWidgetError, Result};
pub use order::{OrderMap, OrderedValue};
pub use path::{Key, NodePath};
pub use present::{editor_for, Footer, NodeView, Renderable, ScalarEditor, Titled};
pub use schema::{generate_from_example, SchemaEdge, SchemaId, SchemaNode, SchemaTree};
pub use session::{EditSession, SchemaSource};
pub use storage::{OutputOptions, StorageFormat};
pub use types::{classify, JsonType, SchemaFormat};
