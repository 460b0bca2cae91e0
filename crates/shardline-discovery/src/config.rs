use serde::{Deserialize, Serialize};
use shardline_types::Node;

/// Where the router gets its node set from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiscoveryConfig {
    /// Query the local container runtime.
    Docker(DockerDiscoveryConfig),
    /// Use a fixed list of nodes.
    Static { nodes: Vec<Node> },
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::Docker(DockerDiscoveryConfig::default())
    }
}

/// Settings for container-based discovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerDiscoveryConfig {
    /// Substring a container name must contain to count as a storage node.
    pub name_pattern: String,
    /// Port of the S3 API inside each container.
    pub api_port: u16,
    /// Container environment variable holding the access key.
    pub access_key_env: String,
    /// Container environment variable holding the secret key.
    pub secret_key_env: String,
}

impl Default for DockerDiscoveryConfig {
    fn default() -> Self {
        Self {
            name_pattern: "object-storage-node-".into(),
            api_port: 9000,
            access_key_env: "MINIO_ACCESS_KEY".into(),
            secret_key_env: "MINIO_SECRET_KEY".into(),
        }
    }
}
