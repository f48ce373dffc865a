use thiserror::Error;

/// Top-level error type for the Frontdesk system.
///
/// Subsystem crates define their own error types and implement
/// `From<FrontdeskError>` so that the `?` operator works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FrontdeskError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for FrontdeskError {
    fn from(err: toml::de::Error) -> Self {
        FrontdeskError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for FrontdeskError {
    fn from(err: toml::ser::Error) -> Self {
        FrontdeskError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for FrontdeskError {
    fn from(err: serde_json::Error) -> Self {
        FrontdeskError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Frontdesk operations.
pub type Result<T> = std::result::Result<T, FrontdeskError>;
