//! Error types for the OG image renderer

use thiserror::Error;

/// Result type alias for render operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while producing an OG image
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to launch (or reach) the browser process
    #[error("Browser launch failed: {0}")]
    InitializationError(String),

    /// Failed to open a tab or load the document into it
    #[error("Failed to load document: {0}")]
    LoadError(String),

    /// Failed to capture the screenshot
    #[error("Rendering failed: {0}")]
    RenderError(String),

    /// Operation timed out
    #[error("Operation timed out after {0}ms")]
    Timeout(u64),

    /// The renderer has been shut down and no longer accepts work
    #[error("Renderer is shutting down")]
    ShuttingDown,

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Other(format!("Render task failed: {}", err))
    }
}
