//! Consistent hashing with bounded loads.
//!
//! The ring hashes every member onto a 64-bit circle several times (virtual
//! nodes), splits the key space into a fixed number of partitions and hands
//! each partition to the first member clockwise from the partition's hash
//! whose load is still under the bound. A key is located by hashing it to a
//! partition and returning that partition's owner.
//!
//! Properties the ring guarantees:
//!
//! 1. The same member set always yields the same mapping, whatever order the
//!    members were added in.
//! 2. `locate` only ever returns a current member.
//! 3. No member owns more than [`HashRing::average_load`] partitions.
//! 4. Adding or removing one member moves roughly `1 / members` of the keys.

pub mod config;
pub mod error;
pub mod hasher;
pub mod ring;

pub use config::{RingConfig, MAX_PARTITION_COUNT};
pub use error::{RingError, RingResult};
pub use hasher::{KeyHasher, Xxh64Hasher};
pub use ring::HashRing;
