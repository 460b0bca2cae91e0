use shardline_types::{ContextError, MemberToken};

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The caller passed an unusable object or id.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The set of storage nodes could not be enumerated.
    #[error("node discovery failed: {0}")]
    Discovery(String),

    /// A backend could not be reached or provisioned.
    #[error("backend {endpoint} unavailable: {reason}")]
    BackendUnavailable { endpoint: String, reason: String },

    /// A backend failed while reading or writing one object.
    #[error("I/O error ({endpoint} | {id}): {reason}")]
    Io {
        endpoint: String,
        id: String,
        reason: String,
    },

    /// Routing picked a member that has no adapter.
    #[error("storage node not available ({0})")]
    NodeUnavailable(MemberToken),

    /// A node's adapter failed to initialize. `node` is the masked diagnostic
    /// form of the node.
    #[error("initialize storage for node {node}: {source}")]
    NodeInit {
        node: String,
        #[source]
        source: Box<StoreError>,
    },

    /// A call forwarded to a member failed.
    #[error("node ({member}): {source}")]
    Node {
        member: MemberToken,
        #[source]
        source: Box<StoreError>,
    },

    /// No storage nodes are available to route to.
    #[error("no storage nodes available")]
    NoMembers,

    /// `put`/`get` was called before `init` completed.
    #[error("store is not initialized")]
    NotReady,

    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Wrap a failure with the member it was routed to.
    pub fn on_member(member: MemberToken, source: StoreError) -> Self {
        Self::Node {
            member,
            source: Box::new(source),
        }
    }

    /// The innermost error, looking through member and node wrappers.
    pub fn root_cause(&self) -> &StoreError {
        match self {
            Self::Node { source, .. } | Self::NodeInit { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns `true` if the call was stopped by its context rather than
    /// failing on its own.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::Cancelled | Self::DeadlineExceeded
        )
    }
}

impl From<ContextError> for StoreError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Cancelled => Self::Cancelled,
            ContextError::DeadlineExceeded => Self::DeadlineExceeded,
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
