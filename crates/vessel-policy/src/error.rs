use vessel_model::ModelError;

/// Errors raised by policy handlers.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    /// A handler explicitly refused the operation.
    #[error("denied by '{handler}': {reason}")]
    Denied { handler: String, reason: String },

    /// A handler failed for a reason other than denial.
    #[error("handler '{handler}' failed: {message}")]
    Handler { handler: String, message: String },

    /// A handler produced an invalid request or result.
    #[error("handler produced an invalid value: {0}")]
    Model(#[from] ModelError),

    /// Policy configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PolicyError {
    /// Create a denial attributed to `handler`.
    pub fn denied(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Denied {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    /// Create a handler failure.
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// Returns `true` for an explicit denial.
    pub fn is_denied(&self) -> bool {
        matches!(self, Self::Denied { .. })
    }
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
