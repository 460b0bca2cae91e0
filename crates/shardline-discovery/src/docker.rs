use std::collections::HashMap;

use async_trait::async_trait;
use bollard::container::{InspectContainerOptions, ListContainersOptions};
use bollard::models::ContainerSummary;
use bollard::Docker;
use shardline_types::{Node, RequestContext};
use tracing::{debug, info, warn};

use crate::config::DockerDiscoveryConfig;
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::traits::NodeDiscovery;

/// A running container that looks like a storage node, before its
/// credentials have been read.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Candidate {
    id: String,
    name: String,
    endpoint: String,
}

/// Discovers storage nodes among the running containers of the local
/// container runtime.
///
/// The runtime is reached the way the `docker` CLI reaches it (`DOCKER_HOST`
/// or the default local socket).
pub struct DockerDiscovery {
    docker: Docker,
    config: DockerDiscoveryConfig,
}

impl DockerDiscovery {
    pub fn connect(config: DockerDiscoveryConfig) -> DiscoveryResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| DiscoveryError::Connect(e.to_string()))?;
        Ok(Self { docker, config })
    }

    pub fn config(&self) -> &DockerDiscoveryConfig {
        &self.config
    }

    async fn inspect_env(&self, id: &str) -> DiscoveryResult<Vec<String>> {
        let inspect = self
            .docker
            .inspect_container(id, None::<InspectContainerOptions>)
            .await
            .map_err(|e| DiscoveryError::Inspect {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(inspect.config.and_then(|c| c.env).unwrap_or_default())
    }
}

/// Turn a container listing entry into a candidate, or `None` if it is not a
/// storage node we can reach.
fn candidate(summary: &ContainerSummary, config: &DockerDiscoveryConfig) -> Option<Candidate> {
    let id = summary.id.as_deref().filter(|id| !id.is_empty())?;
    let networks = summary.network_settings.as_ref()?.networks.as_ref();

    let name = summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|n| n.trim_start_matches('/').to_string())
        .unwrap_or_default();
    if !name.contains(&config.name_pattern) {
        return None;
    }

    // Network names are sorted so a container on several networks always
    // resolves to the same address.
    let address = networks.and_then(|networks| {
        let mut names: Vec<&String> = networks.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| networks[n].ip_address.as_deref())
            .find(|ip| !ip.is_empty())
    });
    let Some(address) = address else {
        warn!(container = id, name = %name, "unable to resolve IP address of storage node, skipping");
        return None;
    };

    Some(Candidate {
        id: id.to_string(),
        name,
        endpoint: format!("{address}:{}", config.api_port),
    })
}

/// Parse `KEY=value` entries, splitting at the first `=`.
fn parse_env(entries: &[String]) -> HashMap<&str, &str> {
    entries
        .iter()
        .filter_map(|entry| entry.split_once('='))
        .collect()
}

fn into_node(candidate: Candidate, env: &[String], config: &DockerDiscoveryConfig) -> Node {
    let env = parse_env(env);
    let lookup = |key: &str| env.get(key).map(|v| v.to_string()).unwrap_or_default();
    Node {
        access_key: lookup(config.access_key_env.as_str()),
        secret_key: lookup(config.secret_key_env.as_str()),
        id: candidate.id,
        name: candidate.name,
        endpoint: candidate.endpoint,
    }
}

#[async_trait]
impl NodeDiscovery for DockerDiscovery {
    async fn list_nodes(&self, ctx: &RequestContext) -> DiscoveryResult<Vec<Node>> {
        let mut filters = HashMap::new();
        filters.insert("status".to_string(), vec!["running".to_string()]);
        let options = ListContainersOptions {
            filters,
            ..Default::default()
        };

        let containers = ctx
            .run(self.docker.list_containers(Some(options)))
            .await?
            .map_err(|e| DiscoveryError::List(e.to_string()))?;
        debug!(count = containers.len(), "listed running containers");

        let mut nodes = Vec::new();
        for found in containers.iter().filter_map(|c| candidate(c, &self.config)) {
            let env = ctx.run(self.inspect_env(&found.id)).await??;
            let node = into_node(found, &env, &self.config);
            info!(node = %node.diagnostic(), "storage node discovered");
            nodes.push(node);
        }
        nodes.sort_by(|a, b| a.token().cmp(&b.token()));
        Ok(nodes)
    }
}

impl std::fmt::Debug for DockerDiscovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DockerDiscovery")
            .field("config", &self.config)
            .finish()
    }
}
