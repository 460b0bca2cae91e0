//! Foundation types for Shardline.
//!
//! Shardline spreads objects over a set of independent S3-compatible storage
//! nodes. This crate holds the vocabulary shared by every other crate in the
//! workspace.
//!
//! # Key Types
//!
//! - [`Object`]: an immutable blob with its content type
//! - [`ObjectId`]: a validated object identifier (1–32 ASCII alphanumerics)
//! - [`Node`]: one storage backend with its endpoint and credentials
//! - [`MemberToken`]: the `id#name` identity a node occupies on the hash ring
//! - [`RequestContext`]: cancellation and deadline carried by every call

pub mod context;
pub mod error;
pub mod node;
pub mod object;

pub use context::RequestContext;
pub use error::{ContextError, TypeError};
pub use node::{mask_secret, MemberToken, Node};
pub use object::{Object, ObjectId, MAX_OBJECT_ID_LEN};
