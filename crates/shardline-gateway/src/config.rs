use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shardline_discovery::DiscoveryConfig;
use shardline_ring::RingConfig;
use shardline_store::S3Config;
use tracing::info;

use crate::error::{GatewayError, GatewayResult};

/// Environment variable naming the bucket used on every storage node.
pub const BUCKET_ENV: &str = "BUCKET_NAME";

/// Bucket used when neither the config file nor the environment names one.
pub const DEFAULT_BUCKET: &str = "default";

/// Top-level Shardline configuration.
///
/// Every section has a default, so an empty file (or no file at all) gives
/// a gateway on `0.0.0.0:3000` discovering MinIO containers through the
/// local Docker daemon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardlineConfig {
    pub gateway: GatewayConfig,
    pub bucket_name: String,
    pub ring: RingConfig,
    pub discovery: DiscoveryConfig,
    pub backend: S3Config,
}

impl Default for ShardlineConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            bucket_name: DEFAULT_BUCKET.into(),
            ring: RingConfig::default(),
            discovery: DiscoveryConfig::default(),
            backend: S3Config::default(),
        }
    }
}

impl ShardlineConfig {
    /// Load from an optional TOML file, then apply `BUCKET_NAME`.
    pub fn load(path: Option<&Path>) -> GatewayResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    GatewayError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.apply_bucket_override(std::env::var(BUCKET_ENV).ok());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> GatewayResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| GatewayError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply the value of `BUCKET_NAME`; unset or empty keeps the configured
    /// bucket.
    pub fn apply_bucket_override(&mut self, value: Option<String>) {
        match value.filter(|v| !v.is_empty()) {
            Some(bucket) => self.bucket_name = bucket,
            None => info!(bucket = %self.bucket_name, "{BUCKET_ENV} is not set, using configured bucket"),
        }
    }

    pub fn validate(&self) -> GatewayResult<()> {
        if self.bucket_name.is_empty() {
            return Err(GatewayError::Config("bucket_name must not be empty".into()));
        }
        if self.gateway.max_body_bytes == 0 {
            return Err(GatewayError::Config("gateway.max_body_bytes must be positive".into()));
        }
        self.ring
            .validate()
            .map_err(|e| GatewayError::Config(e.to_string()))
    }
}

/// HTTP listener settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub bind_addr: SocketAddr,
    /// Upper bound on a single request's backend work.
    pub request_timeout_secs: u64,
    pub max_body_bytes: usize,
    /// How long in-flight requests get to finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            request_timeout_secs: 30,
            max_body_bytes: 32 * 1024 * 1024,
            shutdown_timeout_secs: 5,
        }
    }
}
