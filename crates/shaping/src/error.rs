use thiserror::Error;

/// Result type for shaping operations
pub type Result<T> = std::result::Result<T, ShapingError>;

/// Errors raised by the shaping engine.
///
/// Record data never produces an error; only configuration and caller parameters do.
#[derive(Error, Debug)]
pub enum ShapingError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Category rule table could not be parsed or is inconsistent
    #[error("Invalid category rules: {0}")]
    InvalidRules(String),

    /// Cursor does not identify any item of the candidate set
    #[error("Cursor '{0}' does not match any item in the result set")]
    CursorNotFound(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ShapingError {
    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create an invalid rules error
    pub fn invalid_rules(msg: impl Into<String>) -> Self {
        Self::InvalidRules(msg.into())
    }
}
