/// 64-bit hash function used to place members and keys on the ring.
///
/// Implementations must be deterministic across processes and platforms:
/// the whole point of the ring is that every gateway instance computes the
/// same placement. A well-distributed non-cryptographic hash is enough.
pub trait KeyHasher: Send + Sync {
    fn hash64(&self, data: &[u8]) -> u64;
}

impl<F> KeyHasher for F
where
    F: Fn(&[u8]) -> u64 + Send + Sync,
{
    fn hash64(&self, data: &[u8]) -> u64 {
        self(data)
    }
}

/// XXH64 with a fixed seed. The default ring hasher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Xxh64Hasher {
    seed: u64,
}

impl Xxh64Hasher {
    /// Seed 0, interoperable with stock `xxhash` implementations.
    pub const DEFAULT: Self = Self { seed: 0 };

    pub const fn with_seed(seed: u64) -> Self {
        Self { seed }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }
}

impl Default for Xxh64Hasher {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl KeyHasher for Xxh64Hasher {
    fn hash64(&self, data: &[u8]) -> u64 {
        xxhash_rust::xxh64::xxh64(data, self.seed)
    }
}
