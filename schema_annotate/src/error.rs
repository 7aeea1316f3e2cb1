//! Error types for schema_annotate

use thiserror::Error;

/// Result type for schema_annotate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_annotate
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Introspection error: {0}")]
    IntrospectionError(String),

    #[error("Model resolution error: {0}")]
    ModelResolutionError(String),

    #[error("Pattern error: {0}")]
    PatternError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Convert Serde JSON errors to schema_annotate errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_annotate errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Error::PatternError(error.to_string())
    }
}
