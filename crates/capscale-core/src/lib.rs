//! capscale-core — shared types for the capscale autoscaler.
//!
//! Holds the throttle summary model, the autoscaler tunables, the capacity
//! constants every component agrees on, and the `capscale.toml` parser.

pub mod config;
pub mod duration;
pub mod types;

pub use config::{CapscaleConfig, ConfigError};
pub use duration::parse_duration;
pub use types::*;
