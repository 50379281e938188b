//! Persistence Adapter
//!
//! Reads JSON or YAML into a raw value plus its [`OrderMap`], and writes a
//! value back in authored order. Writing renames the existing file aside
//! first and puts it back if the write fails, so a failed save never leaves a
//! truncated document behind.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{EditorConfig, OutputFormat};
use crate::error::{JsonWidgetError, Result};
use crate::order::{OrderMap, OrderedValue};

/// On-disk representation of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageFormat {
    Json,
    Yaml,
}

impl StorageFormat {
    /// `.yaml` / `.yml` are YAML, everything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                StorageFormat::Yaml
            }
            _ => StorageFormat::Json,
        }
    }
}

/// How documents are rendered and replaced on disk
#[derive(Debug, Clone)]
pub struct OutputOptions {
    pub output_format: OutputFormat,
    /// Spaces per indentation level for pretty JSON
    pub indent: usize,
    /// Suffix of the temporary backup taken while saving
    pub backup_suffix: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Pretty,
            indent: 4,
            backup_suffix: ".bak".to_string(),
        }
    }
}

impl OutputOptions {
    pub fn compact() -> Self {
        Self {
            output_format: OutputFormat::Compact,
            ..Self::default()
        }
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            output_format: config.output.output_format,
            indent: config.output.indent,
            backup_suffix: config.editor.backup_suffix.clone(),
        }
    }
}

/// Parse document text
pub fn parse_str(text: &str, format: StorageFormat) -> Result<(Value, OrderMap)> {
    match format {
        StorageFormat::Json => {
            let value: Value = serde_json::from_str(text)?;
            let order: OrderMap = serde_json::from_str(text)?;
            Ok((value, order))
        }
        StorageFormat::Yaml => {
            let value: Value = serde_yaml::from_str(text)?;
            let order: OrderMap = serde_yaml::from_str(text)?;
            Ok((value, order))
        }
    }
}

/// Read and parse a document file
pub fn read(path: impl AsRef<Path>) -> Result<(Value, OrderMap)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    debug!(path = %path.display(), bytes = text.len(), "read document");
    parse_str(&text, StorageFormat::from_path(path))
}

/// Render a value in authored order
pub fn render(data: &Value, order: &OrderMap, format: StorageFormat, options: &OutputOptions) -> Result<String> {
    let ordered = OrderedValue::new(data, order);
    match format {
        StorageFormat::Yaml => Ok(serde_yaml::to_string(&ordered)?),
        StorageFormat::Json => match options.output_format {
            OutputFormat::Compact => Ok(serde_json::to_string(&ordered)?),
            OutputFormat::Pretty => {
                let indent = vec![b' '; options.indent];
                let formatter = serde_json::ser::PrettyFormatter::with_indent(&indent);
                let mut buf = Vec::new();
                let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
                ordered.serialize(&mut ser)?;
                buf.push(b'\n');
                String::from_utf8(buf).map_err(|e| {
                    JsonWidgetError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
                })
            }
        },
    }
}

/// Path of the backup taken while `path` is being replaced: `path` plus
/// `suffix`, numbered when that name is already taken by another file
pub fn backup_path(path: &Path, suffix: &str) -> PathBuf {
    let base = path.file_name().unwrap_or_default().to_os_string();
    let mut n = 0;
    loop {
        let mut name = base.clone();
        name.push(suffix);
        if n > 0 {
            name.push(n.to_string());
        }
        let candidate = path.with_file_name(name);
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

/// Write a document, format chosen by extension.
///
/// The existing file is renamed to a free backup path before writing. If the
/// write fails the backup is renamed back and the error returned; otherwise
/// the original permissions are copied to the new file and the backup removed.
pub fn write(data: &Value, order: &OrderMap, path: impl AsRef<Path>, options: &OutputOptions) -> Result<()> {
    let path = path.as_ref();
    let text = render(data, order, StorageFormat::from_path(path), options)?;
    replace_file(path, text.as_bytes(), &options.backup_suffix, |target, contents| {
        fs::write(target, contents)
    })?;
    info!(path = %path.display(), "wrote document");
    Ok(())
}

fn replace_file<F>(path: &Path, contents: &[u8], suffix: &str, write_fn: F) -> io::Result<()>
where
    F: FnOnce(&Path, &[u8]) -> io::Result<()>,
{
    let backup = if path.exists() {
        let backup = backup_path(path, suffix);
        fs::rename(path, &backup)?;
        Some(backup)
    } else {
        None
    };

    if let Err(e) = write_fn(path, contents) {
        if let Some(backup) = &backup {
            warn!(path = %path.display(), error = %e, "write failed, restoring original");
            if let Err(restore) = fs::rename(backup, path) {
                warn!(backup = %backup.display(), error = %restore, "could not restore backup");
            }
        }
        return Err(e);
    }

    if let Some(backup) = &backup {
        let permissions = fs::metadata(backup)?.permissions();
        fs::set_permissions(path, permissions)?;
        fs::remove_file(backup)?;
    }
    Ok(())
}
