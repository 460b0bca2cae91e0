use thiserror::Error;

/// Errors from hash ring construction and lookup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RingError {
    /// `locate` was called on a ring with no members.
    #[error("hash ring has no members")]
    NoMembers,

    /// The load bound leaves no room for a partition.
    ///
    /// Lower the partition count, add members, or raise the load factor.
    #[error("no member can take partition {partition} within the load bound {average_load}")]
    InsufficientCapacity { partition: u64, average_load: f64 },

    #[error("invalid ring configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for ring operations.
pub type RingResult<T> = Result<T, RingError>;
