//! Sharding router for Shardline.
//!
//! [`ShardRouter`] discovers the storage nodes once, initializes one store
//! per node, lays the nodes out on a consistent hash ring and from then on
//! forwards every `put`/`get` to the single node that owns the object id.
//!
//! The router implements [`ObjectStore`](shardline_store::ObjectStore)
//! itself, so callers cannot tell it apart from a single backend.
//!
//! # Guarantees
//!
//! - Initialization is all-or-nothing: one failing node fails `init`.
//! - Routing depends only on the object id and the node set seen at `init`.
//! - There is no failover: if the owning node is down, the call fails.
//! - After `init`, routing state is immutable and read without locks.

pub mod router;

pub use router::ShardRouter;
