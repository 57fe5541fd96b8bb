/// Errors a listener may report back to the registry.
///
/// The registry logs these and moves on; they never reach the operation
/// that published the event.
#[derive(Debug, thiserror::Error)]
pub enum ListenerError {
    /// The listener could not handle the event.
    #[error("{0}")]
    Failed(String),

    /// Any other error raised while handling the event.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ListenerError {
    /// Shorthand for [`ListenerError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<std::io::Error> for ListenerError {
    fn from(e: std::io::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

/// Result alias for listener callbacks.
pub type ListenerResult<T> = Result<T, ListenerError>;
