use serde::{Deserialize, Serialize};

use crate::error::{RingError, RingResult};

/// Largest accepted `partition_count`; the ring keeps one owner per partition.
pub const MAX_PARTITION_COUNT: u64 = 1 << 20;

/// Tuning knobs for the hash ring.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingConfig {
    /// Number of fixed partitions the key space is split into, at most
    /// [`MAX_PARTITION_COUNT`].
    ///
    /// Should be well above the member count: with fewer partitions than
    /// members some members own nothing.
    pub partition_count: u64,
    /// Virtual nodes placed on the circle per member.
    pub replication_factor: usize,
    /// Upper bound on a member's partitions relative to a fair share.
    pub load: f64,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            partition_count: 271,
            replication_factor: 20,
            load: 1.25,
        }
    }
}

impl RingConfig {
    pub fn validate(&self) -> RingResult<()> {
        if self.partition_count == 0 {
            return Err(RingError::InvalidConfig(
                "partition_count must be positive".into(),
            ));
        }
        if self.partition_count > MAX_PARTITION_COUNT {
            return Err(RingError::InvalidConfig(format!(
                "partition_count must be at most {MAX_PARTITION_COUNT}, got {}",
                self.partition_count
            )));
        }
        if self.replication_factor == 0 {
            return Err(RingError::InvalidConfig(
                "replication_factor must be positive".into(),
            ));
        }
        if !self.load.is_finite() || self.load < 1.0 {
            return Err(RingError::InvalidConfig(format!(
                "load must be a finite factor >= 1.0, got {}",
                self.load
            )));
        }
        Ok(())
    }
}
