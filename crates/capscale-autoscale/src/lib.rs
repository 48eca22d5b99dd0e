//! capscale-autoscale — throttle-driven capacity scaling.
//!
//! Reads a collection's provisioned capacity, partition count and recent
//! throttle statistics, decides a new capacity, and applies it. A
//! last-attempt record in a shared coordination store keeps peers from
//! scaling the same collection more often than the configured interval.
//!
//! # Scaling Algorithm
//!
//! ```text
//! rate = recent success rate (None when no recent requests)
//!
//! raw  = rate.is_none() ? current * (1 - max_decrease)
//!      : rate == 0        ? unbounded
//!                         : current * target_success_rate / rate
//! delta = raw - current
//!
//! delta > 0:  delta = max(min(delta, current * max_increase), min_increase)
//!             new   = 100 * (floor((current + delta) / 100) + 1)
//! delta < 0:  delta = max(delta, -current * max_decrease)
//!             new   = 100 * floor((current + delta) / 100)
//! delta == 0: NoChange
//!
//! new = max(new, min_capacity)        (when configured, rounded up to 100)
//! new = min(new, partitions * 10_000)
//! new == current ? NoChange : ScaleTo(new)
//! ```
//!
//! # Cycle
//!
//! ```text
//! disabled? ── yes ──▶ Disabled (no I/O)
//!     │ no
//! gate check ── denied ──▶ Throttled
//!     │ allowed
//! read capacity ┐
//! read partitions├─ concurrently
//! read throttles ┘
//!     │
//! decide ── ScaleTo(n) ──▶ replace_capacity(n)
//!     │
//! record attempt ──▶ Unchanged | Scaled | Rejected
//! ```

pub mod client;
pub mod coordination;
pub mod decision;
pub mod error;
pub mod provider;
pub mod rate_limiter;
pub mod scaler;

pub use client::{CollectionClient, CollectionSource};
pub use coordination::CoordinationStore;
pub use decision::{ScaleDecision, decide};
pub use error::ScaleError;
pub use provider::{AUTOSCALER_DISABLED, ConfigProvider, FeatureFlags, FlagSet};
pub use rate_limiter::{GateVerdict, RateLimiter};
pub use scaler::{Autoscaler, ScaleOutcome, ScaledCollection};
