/// Errors raised while building model values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ModelError {
    /// A required builder field was never set.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The original name is empty or blank.
    #[error("original name must not be blank")]
    BlankName,

    /// The content type is not of the form `type/subtype`.
    #[error("invalid content type: {0:?}")]
    InvalidContentType(String),

    /// An attribute key is empty.
    #[error("attribute key must not be empty")]
    EmptyAttributeKey,

    /// Last-modified time precedes upload time.
    #[error("last modified time precedes upload time")]
    TimeOrder,
}

/// Result alias for model construction.
pub type ModelResult<T> = Result<T, ModelError>;
