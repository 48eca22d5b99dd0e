//! capscale-state — embedded state store for capscale.
//!
//! Backed by [redb](https://docs.rs/redb), provides persistent and in-memory
//! storage for the two things capscale keeps between cycles: the
//! rate-limiter record of each collection's last scaling attempt, and the
//! registry of locally managed collections.
//!
//! # Architecture
//!
//! All records are JSON-serialized into redb's `&[u8]` value columns and
//! keyed by plain strings. Last-attempt records carry their own expiry, so
//! an expired record reads exactly like a missing one.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across async tasks and processes using the same file.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::StateStore;
pub use types::*;
