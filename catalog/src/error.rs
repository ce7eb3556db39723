//! Error types for catalog loading and recognition.

use argspec_core::SpecError;
use thiserror::Error;

/// Errors that can occur while loading, validating or using a catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Structural problem in the catalog, e.g. a duplicate command name.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// A mode's usage grammar does not compile.
    #[error("invalid spec for '{command}' mode '{mode}': {source}")]
    InvalidSpec {
        command: String,
        mode: String,
        #[source]
        source: SpecError,
    },

    /// A grammar failed to compile outside validation.
    #[error(transparent)]
    Spec(#[from] SpecError),

    /// No command has this name or alias.
    #[error("unknown command: '{0}'")]
    UnknownCommand(String),
}

/// Convenience alias for results with [`CatalogError`].
pub type Result<T> = std::result::Result<T, CatalogError>;
