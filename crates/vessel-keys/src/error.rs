/// Errors from key generation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum KeyError {
    /// The strategy needs the original name but none was supplied.
    #[error("key strategy '{strategy}' requires an original name")]
    NameRequired { strategy: &'static str },

    /// A generator produced an empty key.
    #[error("key strategy '{strategy}' produced an empty key")]
    EmptyKey { strategy: String },

    /// A sub-key contains the reserved separator.
    #[error("sub-key {key:?} contains the reserved separator {separator:?}")]
    ReservedSeparator { key: String, separator: char },

    /// The sequential counter would overflow.
    #[error("sequential key space exhausted")]
    Exhausted,

    /// A composite generator has no parts.
    #[error("composite key generator has no parts")]
    NoParts,

    /// Strategy-specific failure.
    #[error("key generation failed: {0}")]
    Failed(String),
}

/// Result alias for key generation.
pub type KeyResult<T> = Result<T, KeyError>;
