//! Configuration and feature-flag collaborators.

use std::collections::HashSet;

use tokio::sync::watch;

use capscale_core::AutoscalerConfig;

/// Flag that switches the autoscaler off everywhere it is consulted.
pub const AUTOSCALER_DISABLED: &str = "autoscaler_disabled";

/// Supplies a read-only config snapshot at the start of each cycle.
pub trait ConfigProvider: Send + Sync {
    fn snapshot(&self) -> AutoscalerConfig;
}

impl ConfigProvider for AutoscalerConfig {
    fn snapshot(&self) -> AutoscalerConfig {
        self.clone()
    }
}

/// Hot-reloadable config: each cycle sees the latest value sent.
impl ConfigProvider for watch::Receiver<AutoscalerConfig> {
    fn snapshot(&self) -> AutoscalerConfig {
        self.borrow().clone()
    }
}

/// Answers whether a named feature flag is switched off.
pub trait FeatureFlags: Send + Sync {
    fn is_disabled(&self, flag: &str) -> bool;
}

/// A fixed set of disabled flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlagSet {
    disabled: HashSet<String>,
}

impl FlagSet {
    pub fn new(disabled: impl IntoIterator<Item = String>) -> Self {
        Self {
            disabled: disabled.into_iter().collect(),
        }
    }
}

impl FeatureFlags for FlagSet {
    fn is_disabled(&self, flag: &str) -> bool {
        self.disabled.contains(flag)
    }
}

impl FeatureFlags for watch::Receiver<FlagSet> {
    fn is_disabled(&self, flag: &str) -> bool {
        self.borrow().is_disabled(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watch_provider_sees_updates() {
        let (tx, rx) = watch::channel(AutoscalerConfig::default());
        assert!(rx.snapshot().enabled);

        tx.send_modify(|c| c.enabled = false);
        assert!(!rx.snapshot().enabled);
    }

    #[test]
    fn flag_set_lookup() {
        let flags = FlagSet::new([AUTOSCALER_DISABLED.to_string()]);
        assert!(flags.is_disabled(AUTOSCALER_DISABLED));
        assert!(!flags.is_disabled("something_else"));
        assert!(!FlagSet::default().is_disabled(AUTOSCALER_DISABLED));
    }

    #[test]
    fn watch_flags_follow_sender() {
        let (tx, rx) = watch::channel(FlagSet::default());
        assert!(!rx.is_disabled(AUTOSCALER_DISABLED));

        tx.send(FlagSet::new([AUTOSCALER_DISABLED.to_string()])).unwrap();
        assert!(rx.is_disabled(AUTOSCALER_DISABLED));
    }
}
