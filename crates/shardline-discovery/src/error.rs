use shardline_types::ContextError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("unable to connect to container runtime: {0}")]
    Connect(String),

    #[error("unable to list containers: {0}")]
    List(String),

    #[error("unable to inspect container {id}: {reason}")]
    Inspect { id: String, reason: String },

    #[error("discovery interrupted: {0}")]
    Context(#[from] ContextError),
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
