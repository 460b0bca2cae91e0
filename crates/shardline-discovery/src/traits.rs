use async_trait::async_trait;
use shardline_types::{Node, RequestContext};

use crate::error::DiscoveryResult;

/// Source of the current storage node set.
///
/// Implementations only return nodes with a usable endpoint. Credentials come
/// from the node's own configuration; discovery never invents them.
#[async_trait]
pub trait NodeDiscovery: Send + Sync {
    async fn list_nodes(&self, ctx: &RequestContext) -> DiscoveryResult<Vec<Node>>;
}
