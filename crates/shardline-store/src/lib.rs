//! Object store contract for Shardline.
//!
//! Every storage backend, and the sharding router itself, implements
//! [`ObjectStore`], so a gateway can be pointed at a single node, a sharded
//! cluster, or an in-memory double without changing a line.
//!
//! # Storage Backends
//!
//! - [`S3ObjectStore`] -- one S3-compatible endpoint (MinIO, AWS S3, ...)
//! - [`InMemoryObjectStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Contract
//!
//! 1. `init` is idempotent and must succeed before `put`/`get` are used.
//! 2. `put` overwrites any previous object with the same id.
//! 3. A missing object is `Ok(None)`, never an error.
//! 4. Errors name the endpoint and object id they concern, never a secret.
//! 5. Nothing retries. Callers decide.
//! 6. Every call honours its [`RequestContext`](shardline_types::RequestContext):
//!    cancellation and deadlines surface as distinct errors.

pub mod error;
pub mod memory;
pub mod s3;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryObjectStore, InMemoryStoreFactory};
pub use s3::{S3Config, S3ObjectStore, S3StoreFactory};
pub use traits::{ObjectStore, StoreFactory};
