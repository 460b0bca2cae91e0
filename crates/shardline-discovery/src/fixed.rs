use async_trait::async_trait;
use shardline_types::{Node, RequestContext};
use tracing::warn;

use crate::error::DiscoveryResult;
use crate::traits::NodeDiscovery;

/// Discovery over a node list known up front.
#[derive(Clone, Debug)]
pub struct StaticDiscovery {
    nodes: Vec<Node>,
}

impl StaticDiscovery {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self { nodes }
    }
}

#[async_trait]
impl NodeDiscovery for StaticDiscovery {
    async fn list_nodes(&self, ctx: &RequestContext) -> DiscoveryResult<Vec<Node>> {
        ctx.check()?;
        Ok(self
            .nodes
            .iter()
            .filter(|node| {
                if node.endpoint.is_empty() {
                    warn!(node = %node.diagnostic(), "skipping storage node without endpoint");
                    return false;
                }
                true
            })
            .cloned()
            .collect())
    }
}
