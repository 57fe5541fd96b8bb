use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("blob reference must not be empty")]
    EmptyRef,

    #[error("invalid character {ch:?} in blob reference {value:?}")]
    InvalidRefChar { value: String, ch: char },

    #[error("storage id must not be empty")]
    EmptyStorageId,
}
