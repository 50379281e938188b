//! Configuration management for the editor
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (jsonwidget.toml)
//! - Environment variables (JSONWIDGET__*)
//!
//! ## Example config file (jsonwidget.toml):
//! ```toml
//! [schema]
//! format = 2
//! search_path = ["./schemas", "~/share/jsonwidget"]
//!
//! [output]
//! output_format = "pretty"
//! indent = 4
//!
//! [editor]
//! notification_ms = 3000
//! placeholder_key = "newkey"
//! backup_suffix = ".bak"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::types::SchemaFormat;

/// Main configuration for the editor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EditorConfig {
    /// Schema settings
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,

    /// Interactive editing settings
    #[serde(default)]
    pub editor: EditingConfig,
}

/// Schema configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Vocabulary used when generating or converting without an explicit target
    #[serde(default)]
    pub format: SchemaFormat,

    /// Directories searched for named schemas before the bundled set
    #[serde(default)]
    pub search_path: Vec<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output format (pretty or compact)
    #[serde(default = "default_output_format")]
    pub output_format: OutputFormat,

    /// Spaces per indentation level in pretty JSON
    #[serde(default = "default_indent")]
    pub indent: usize,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Editing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditingConfig {
    /// How long a footer notification stays up, in milliseconds
    #[serde(default = "default_notification_ms")]
    pub notification_ms: u64,

    /// Stem for generated additional-property keys
    #[serde(default = "default_placeholder_key")]
    pub placeholder_key: String,

    /// Suffix of the backup file kept while saving
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
}

// Default value functions
fn default_output_format() -> OutputFormat {
    OutputFormat::Pretty
}

fn default_indent() -> usize {
    4
}

fn default_notification_ms() -> u64 {
    3000
}

fn default_placeholder_key() -> String {
    "newkey".to_string()
}

fn default_backup_suffix() -> String {
    ".bak".to_string()
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            format: SchemaFormat::default(),
            search_path: Vec::new(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_format: default_output_format(),
            indent: default_indent(),
        }
    }
}

impl Default for EditingConfig {
    fn default() -> Self {
        Self {
            notification_ms: default_notification_ms(),
            placeholder_key: default_placeholder_key(),
            backup_suffix: default_backup_suffix(),
        }
    }
}

impl EditorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, adding a required file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "jsonwidget.toml",
            ".jsonwidget.toml",
            "config/jsonwidget.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("org", "jsonwidget", "jsonwidget") {
            let xdg_config = config_dir.config_dir().join("jsonwidget.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // JSONWIDGET__EDITOR__PLACEHOLDER_KEY=field
        builder = builder.add_source(
            Environment::with_prefix("JSONWIDGET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    pub fn notification_timeout(&self) -> Duration {
        Duration::from_millis(self.editor.notification_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EditorConfig::default();
        assert_eq!(config.schema.format, SchemaFormat::V2);
        assert_eq!(config.output.indent, 4);
        assert_eq!(config.editor.placeholder_key, "newkey");
        assert_eq!(config.notification_timeout(), Duration::from_secs(3));
    }

    #[test]
    fn test_serialize_config() {
        let config = EditorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[schema]"));
        assert!(toml_str.contains("[output]"));
        assert!(toml_str.contains("[editor]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[schema]\nformat = 1\n\n[output]\noutput_format = \"compact\"\n\n[editor]\nplaceholder_key = \"field\"\n",
        )
        .unwrap();

        let config = EditorConfig::load_from(path.to_str()).unwrap();
        assert_eq!(config.schema.format, SchemaFormat::V1);
        assert_eq!(config.output.output_format, OutputFormat::Compact);
        assert_eq!(config.output.indent, 4);
        assert_eq!(config.editor.placeholder_key, "field");
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.toml");
        let mut config = EditorConfig::default();
        config.editor.notification_ms = 500;
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = EditorConfig::load_from(path.to_str()).unwrap();
        assert_eq!(loaded.editor.notification_ms, 500);
    }
}
