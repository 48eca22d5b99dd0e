//! Domain types shared across capscale crates.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Capacity is always provisioned in steps of this many units.
pub const CAPACITY_STEP: u64 = 100;

/// Absolute capacity ceiling of a single partition.
pub const MAX_CAPACITY_PER_PARTITION: u64 = 10_000;

/// Collection-wide ceiling: per-partition maximum times the partition count.
pub fn capacity_ceiling(partition_count: u32) -> u64 {
    u64::from(partition_count) * MAX_CAPACITY_PER_PARTITION
}

// ── Throttle summary ───────────────────────────────────────────────

/// Throttled vs. total request counts over two disjoint windows.
///
/// "Recent" ends at evaluation time; "older" is the period of the same
/// length immediately preceding it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleSummary {
    pub total_recent_requests: u64,
    pub total_recent_throttled: u64,
    pub total_older_requests: u64,
    pub total_older_throttled: u64,
}

impl ThrottleSummary {
    /// Build a summary from `(requests, throttled)` pairs.
    ///
    /// Throttled counts are saturated to their window's total.
    pub fn new(recent: (u64, u64), older: (u64, u64)) -> Self {
        Self {
            total_recent_requests: recent.0,
            total_recent_throttled: recent.1.min(recent.0),
            total_older_requests: older.0,
            total_older_throttled: older.1.min(older.0),
        }
    }

    /// Fraction of recent requests that were not throttled.
    ///
    /// `None` when no requests were observed in the recent window.
    pub fn recent_success_rate(&self) -> Option<f64> {
        success_rate(self.total_recent_requests, self.total_recent_throttled)
    }

    /// Fraction of older requests that were not throttled.
    pub fn older_success_rate(&self) -> Option<f64> {
        success_rate(self.total_older_requests, self.total_older_throttled)
    }
}

fn success_rate(total: u64, throttled: u64) -> Option<f64> {
    if total == 0 {
        return None;
    }
    let succeeded = total.saturating_sub(throttled);
    Some(succeeded as f64 / total as f64)
}

// ── Autoscaler tunables ────────────────────────────────────────────

/// Read-only snapshot of the autoscaler tunables for one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscalerConfig {
    /// Kill switch. When false no reads or writes happen.
    pub enabled: bool,
    /// Desired fraction of unthrottled requests, in (0, 1].
    pub target_success_rate: f64,
    /// Largest single increase as a fraction of current capacity.
    pub max_incremental_increase_percent: f64,
    /// Largest single decrease as a fraction of current capacity, in [0, 1].
    pub max_incremental_decrease_percent: f64,
    /// Smallest allowed increase step, in capacity units.
    pub min_capacity_increase: u64,
    /// Optional floor the decision never drops below.
    pub min_capacity: Option<u64>,
    /// Length of the "recent" throttle window.
    pub throttle_window: Duration,
    /// Minimum time between scaling attempts for the same collection.
    pub min_scale_interval: Duration,
}

impl Default for AutoscalerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            target_success_rate: 0.99,
            max_incremental_increase_percent: 0.5,
            max_incremental_decrease_percent: 0.05,
            min_capacity_increase: 0,
            min_capacity: None,
            throttle_window: Duration::from_secs(300),
            min_scale_interval: Duration::from_secs(300),
        }
    }
}

// ── Collection state ───────────────────────────────────────────────

/// Capacity and partitioning of a collection, as read during one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    pub current_capacity: u64,
    pub partition_count: u32,
}

impl CollectionState {
    /// Ceiling for this collection's partition count.
    pub fn ceiling(&self) -> u64 {
        capacity_ceiling(self.partition_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rates_per_window() {
        let summary = ThrottleSummary {
            total_older_requests: 1000,
            total_older_throttled: 100,
            total_recent_requests: 100,
            total_recent_throttled: 90,
        };

        assert_eq!(summary.older_success_rate(), Some(0.9));
        assert_eq!(summary.recent_success_rate(), Some(0.1));
    }

    #[test]
    fn empty_window_has_no_rate() {
        let summary = ThrottleSummary::new((0, 0), (1000, 0));
        assert_eq!(summary.recent_success_rate(), None);
        assert_eq!(summary.older_success_rate(), Some(1.0));
        assert_eq!(ThrottleSummary::default().older_success_rate(), None);
    }

    #[test]
    fn new_saturates_throttled_counts() {
        let summary = ThrottleSummary::new((10, 50), (5, 5));
        assert_eq!(summary.total_recent_throttled, 10);
        assert_eq!(summary.recent_success_rate(), Some(0.0));
        assert_eq!(summary.older_success_rate(), Some(0.0));
    }

    #[test]
    fn ceiling_scales_with_partitions() {
        assert_eq!(capacity_ceiling(1), 10_000);
        assert_eq!(capacity_ceiling(10), 100_000);

        let state = CollectionState {
            current_capacity: 400,
            partition_count: 3,
        };
        assert_eq!(state.ceiling(), 30_000);
    }
}
