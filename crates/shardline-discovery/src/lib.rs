//! Storage node discovery for Shardline.
//!
//! A [`NodeDiscovery`] source answers one question: which storage nodes exist
//! right now, where do they listen, and which credentials do they accept.
//! The router asks once at startup and builds its ring from the answer.
//!
//! - [`DockerDiscovery`] -- running containers whose name matches a pattern
//! - [`StaticDiscovery`] -- a fixed list from configuration

pub mod config;
pub mod docker;
pub mod error;
pub mod fixed;
pub mod traits;

use std::sync::Arc;

pub use config::{DiscoveryConfig, DockerDiscoveryConfig};
pub use docker::DockerDiscovery;
pub use error::{DiscoveryError, DiscoveryResult};
pub use fixed::StaticDiscovery;
pub use traits::NodeDiscovery;

/// Build the discovery source described by `config`.
pub fn from_config(config: &DiscoveryConfig) -> DiscoveryResult<Arc<dyn NodeDiscovery>> {
    match config {
        DiscoveryConfig::Docker(docker) => Ok(Arc::new(DockerDiscovery::connect(docker.clone())?)),
        DiscoveryConfig::Static { nodes } => Ok(Arc::new(StaticDiscovery::new(nodes.clone()))),
    }
}
