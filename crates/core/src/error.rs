/// Result alias that carries the custom [`PreviewError`] type.
pub type Result<T> = std::result::Result<T, PreviewError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    /// Free-form failure, mostly poisoned locks and engine bookkeeping.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// A caller handed the crate data it cannot work with.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// The audio source could not be probed or decoded.
    #[error("failed to decode `{src}`: {reason}")]
    Decode { src: String, reason: String },
    /// Configuration or settings file could not be parsed or written.
    #[error("{0}")]
    Config(#[from] serde_json::Error),
}

impl PreviewError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn decode(src: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            src: src.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<&str> for PreviewError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PreviewError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
