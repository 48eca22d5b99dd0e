//! capscale-metrics — throttle observations for managed collections.
//!
//! Counts requests and throttled requests per collection in fixed-width
//! time buckets, answers windowed `ThrottleSummary` queries for the
//! autoscaler, and renders Prometheus-compatible text exposition.
//!
//! Observations live in memory only and are dropped once they fall out of
//! the retention period.
//!
//! # Architecture
//!
//! ```text
//! ThrottleTracker
//!   ├── record()  ← request outcomes reported per collection
//!   ├── summary() → ThrottleSummary for a window cutoff
//!   └── prune()   → drops buckets past retention
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod prometheus;
pub mod tracker;

pub use prometheus::render_prometheus;
pub use tracker::{ThrottleTracker, epoch_millis};
