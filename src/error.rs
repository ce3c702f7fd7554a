//! Error types for the page compositor

use thiserror::Error;

/// Result type alias for compositor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading inputs or composing a page
///
/// Most failures inside a composition pass are recovered locally (see
/// [`crate::compositor`]); these variants surface only where a caller has a
/// real decision to make.
#[derive(Error, Debug)]
pub enum Error {
    /// An input block was present but could not be parsed
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Template evaluation failed
    #[error("Template evaluation failed: {0}")]
    TemplateError(#[from] crate::template::EvalError),

    /// A composition pass could not run
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// The host document rejected a mutation
    #[error("Document error: {0}")]
    DocumentError(String),

    /// JSON (de)serialization failure
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O failure while reading or writing documents
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
