//! Error types for the keyprop core library.

use std::path::PathBuf;

use thiserror::Error;

/// Core error type for signing resolution.
#[derive(Error, Debug)]
pub enum KeypropError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid properties file at line {line}: {message}")]
    PropertiesParse { line: usize, message: String },

    #[error("missing signing property: {key} (in {})", .path.display())]
    MissingSigningProperty { key: &'static str, path: PathBuf },

    #[error("empty signing property: {key} (in {})", .path.display())]
    EmptySigningProperty { key: &'static str, path: PathBuf },

    #[error("release signing required but {} not found", .path.display())]
    SigningRequired { path: PathBuf },

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl KeypropError {
    /// Returns the offending key for invalid signing property errors.
    pub fn signing_key(&self) -> Option<&'static str> {
        match self {
            KeypropError::MissingSigningProperty { key, .. }
            | KeypropError::EmptySigningProperty { key, .. } => Some(*key),
            _ => None,
        }
    }
}

/// Result type alias for keyprop operations.
pub type Result<T> = std::result::Result<T, KeypropError>;
