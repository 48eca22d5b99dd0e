//! capscaled internals shared by the binary and its integration tests.

pub mod bootstrap;
pub mod local;

pub use bootstrap::{LoadedConfig, load_config, reload, reload_on_sighup, seed_collections, tracker_retention};
pub use local::{LocalCollection, LocalCollectionSource};
