use std::sync::Arc;

use async_trait::async_trait;
use shardline_types::{Node, Object, RequestContext};

use crate::error::StoreResult;

/// Object store contract shared by backends and the sharding router.
///
/// All implementations must satisfy these invariants:
/// - `init` is idempotent: calling it on a ready store is a cheap no-op.
/// - `put` stores content and content type together, replacing any previous
///   object under the same id.
/// - `get` returns `Ok(None)` for a missing object. Not-found is never an
///   error; callers test for presence.
/// - Cancellation of `ctx` aborts the call and yields
///   [`StoreError::Cancelled`](crate::StoreError::Cancelled) or
///   [`StoreError::DeadlineExceeded`](crate::StoreError::DeadlineExceeded).
/// - Implementations never retry on their own.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Make the store ready to accept `put` and `get`.
    async fn init(&self, ctx: &RequestContext) -> StoreResult<()>;

    /// Write an object.
    ///
    /// Returns [`StoreError::InvalidArgument`](crate::StoreError::InvalidArgument)
    /// if the object id is empty.
    async fn put(&self, ctx: &RequestContext, object: &Object) -> StoreResult<()>;

    /// Read an object by id.
    async fn get(&self, ctx: &RequestContext, id: &str) -> StoreResult<Option<Object>>;
}

/// Builds one (uninitialized) store per storage node.
///
/// The router calls [`ObjectStore::init`] on every store it gets back before
/// routing traffic to it.
pub trait StoreFactory: Send + Sync {
    fn create(&self, node: &Node) -> StoreResult<Arc<dyn ObjectStore>>;
}
