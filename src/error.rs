//! Error types for schema parsing, document binding and editing

use thiserror::Error;

use crate::path::NodePath;

/// Result type for jsonwidget operations
pub type Result<T> = std::result::Result<T, JsonWidgetError>;

/// Errors raised while loading, validating, editing or saving documents
#[derive(Error, Debug)]
pub enum JsonWidgetError {
    #[error("Validation error at {path}: found {found}, expected {expected}")]
    Validation {
        path: NodePath,
        found: String,
        expected: String,
    },

    #[error("Validation error at {path}: {key:?} is not a valid key")]
    InvalidKey { path: NodePath, key: String },

    #[error("Validation error at {path}: {value} is not one of {options}")]
    EnumViolation {
        path: NodePath,
        value: String,
        options: String,
    },

    #[error("Invalid schema: {0}")]
    Schema(String),

    #[error("Unresolved fragment reference: {0}")]
    UnresolvedFragment(String),

    #[error("Fragment reference cycle through: {0}")]
    FragmentCycle(String),

    #[error("Key already in use at {path}: {key:?}")]
    KeyCollision { path: NodePath, key: String },

    #[error("Cannot modify {path}: {reason}")]
    Mutation { path: NodePath, reason: String },

    #[error("No node at {0}")]
    NodeNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl JsonWidgetError {
    pub(crate) fn mutation(path: NodePath, reason: impl Into<String>) -> Self {
        JsonWidgetError::Mutation {
            path,
            reason: reason.into(),
        }
    }

    /// Whether this error means the document does not match its schema
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            JsonWidgetError::Validation { .. }
                | JsonWidgetError::InvalidKey { .. }
                | JsonWidgetError::EnumViolation { .. }
        )
    }
}
