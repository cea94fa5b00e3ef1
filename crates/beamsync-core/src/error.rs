//! Error types for the core domain model
use thiserror::Error;

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// TOML deserialization error
    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A fixture type definition is inconsistent
    #[error("Invalid fixture type '{name}': {reason}")]
    InvalidFixtureType { name: String, reason: String },

    /// A fixture definition is inconsistent
    #[error("Invalid fixture '{name}': {reason}")]
    InvalidFixture { name: String, reason: String },

    /// Two definitions share the same name
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    /// File extension is neither `.toml` nor `.json`
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
