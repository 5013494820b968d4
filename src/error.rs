use thiserror::Error;

pub type Result<T> = std::result::Result<T, AbacError>;

#[derive(Debug, Error)]
pub enum AbacError {
    /// Malformed expression, label or hierarchy text.
    #[error("syntax error: {message}")]
    Syntax { message: String },

    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("unsupported: {message}")]
    Unsupported { message: String },

    #[error("backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    /// A transaction was asked to do something its mode does not allow.
    #[error("consistency violation: {message}")]
    Consistency { message: String },

    #[error("labels store is closed")]
    Closed,

    #[error("encoding needs {needed} bytes but the scratch buffer holds {capacity}")]
    BufferOverflow { needed: usize, capacity: usize },

    #[error("corrupt stored bytes: {message}")]
    Decode { message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(#[from] serde_json::Error),
}

impl AbacError {
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        Self::Consistency {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }
}
