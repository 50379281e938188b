//! Named schema lookup
//!
//! Schemas shipped with the crate are compiled in from `schemas/`. A name is
//! resolved as an existing path first, then against each configured search
//! directory, then against the bundled set; `.json` may be omitted.

use include_dir::{include_dir, Dir};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{JsonWidgetError, Result};
use crate::schema::SchemaTree;
use crate::storage::StorageFormat;
use crate::types::SchemaFormat;

static BUNDLED: Dir<'static> = include_dir!("$CARGO_MANIFEST_DIR/schemas");

/// Schema shown when validating without an explicit schema
pub const OPEN_SCHEMA: &str = "openschema.json";

/// Where a named schema was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLocation {
    File(PathBuf),
    Bundled {
        name: &'static str,
        text: &'static str,
    },
}

impl SchemaLocation {
    pub fn load(&self, fallback: SchemaFormat) -> Result<SchemaTree> {
        match self {
            SchemaLocation::File(path) => SchemaTree::from_file(path, fallback),
            SchemaLocation::Bundled { name, text } => {
                SchemaTree::from_text(text, StorageFormat::from_path(Path::new(name)), fallback)
            }
        }
    }
}

/// File names of the bundled schemas
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = BUNDLED
        .files()
        .filter_map(|file| file.path().to_str())
        .collect();
    names.sort_unstable();
    names
}

fn candidates(name: &str) -> Vec<String> {
    if Path::new(name).extension().is_some() {
        vec![name.to_string()]
    } else {
        vec![name.to_string(), format!("{}.json", name)]
    }
}

/// Bundled schema text by name
pub fn bundled(name: &str) -> Option<SchemaLocation> {
    candidates(name).into_iter().find_map(|candidate| {
        let file = BUNDLED.get_file(&candidate)?;
        Some(SchemaLocation::Bundled {
            name: file.path().to_str()?,
            text: file.contents_utf8()?,
        })
    })
}

/// Resolve a schema name or path
pub fn find_schema(name: &str, search_path: &[PathBuf]) -> Result<SchemaLocation> {
    let direct = Path::new(name);
    if direct.is_file() {
        return Ok(SchemaLocation::File(direct.to_path_buf()));
    }

    for dir in search_path {
        for candidate in candidates(name) {
            let path = dir.join(&candidate);
            if path.is_file() {
                debug!(path = %path.display(), "schema found on search path");
                return Ok(SchemaLocation::File(path));
            }
        }
    }

    bundled(name).ok_or_else(|| {
        JsonWidgetError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no schema named {:?} (bundled: {})", name, names().join(", ")),
        ))
    })
}
