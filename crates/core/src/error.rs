/// Result alias that carries the custom [`OrbError`] type.
pub type Result<T> = std::result::Result<T, OrbError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum OrbError {
    /// A construction parameter is out of range. This is the only condition
    /// under which building an engine fails.
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfig { field: &'static str, reason: String },
    /// A rendering backend refused a snapshot.
    #[error("render backend: {0}")]
    Backend(String),
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl OrbError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Shorthand for [`OrbError::InvalidConfig`].
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            reason: reason.into(),
        }
    }
}
