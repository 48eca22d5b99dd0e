//! Records persisted by the capscale state store.

use serde::{Deserialize, Serialize};

use capscale_core::{CollectionState, capacity_ceiling};

/// When a rate-limiter key last attempted a scaling cycle.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Unix timestamp (milliseconds) of the attempt.
    pub attempted_at_ms: u64,
    /// Unix timestamp (milliseconds) after which the record is ignored.
    pub expires_at_ms: u64,
}

impl AttemptRecord {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

/// A collection whose capacity is provisioned by this node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionRecord {
    pub id: String,
    /// Provisioned capacity units (multiple of 100).
    pub capacity: u64,
    /// Physical partitions backing the collection.
    pub partitions: u32,
    /// Unix timestamp (milliseconds) of the last change.
    pub updated_at_ms: u64,
}

impl CollectionRecord {
    pub fn state(&self) -> CollectionState {
        CollectionState {
            current_capacity: self.capacity,
            partition_count: self.partitions,
        }
    }

    pub fn ceiling(&self) -> u64 {
        capacity_ceiling(self.partitions)
    }
}
