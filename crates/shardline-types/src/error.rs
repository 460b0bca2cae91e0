use thiserror::Error;

/// Errors produced by type construction and validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("object id is empty")]
    EmptyObjectId,

    #[error("object id too long: {actual} characters, at most {max} allowed")]
    ObjectIdTooLong { actual: usize, max: usize },

    #[error("object id contains non-alphanumeric character {0:?}")]
    InvalidObjectIdChar(char),
}

/// Why a [`RequestContext`](crate::RequestContext) stopped an operation.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}
