//! capscale.toml configuration parser.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::duration::parse_duration;
use crate::types::{AutoscalerConfig, CAPACITY_STEP, capacity_ceiling};

/// Errors raised while resolving or validating configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("target_success_rate must be in (0, 1], got {0}")]
    TargetSuccessRate(f64),

    #[error("max_incremental_increase_percent must be >= 0, got {0}")]
    IncreasePercent(f64),

    #[error("max_incremental_decrease_percent must be in [0, 1], got {0}")]
    DecreasePercent(f64),

    #[error("collection {id}: {reason}")]
    Collection { id: String, reason: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapscaleConfig {
    pub autoscaler: Option<AutoscalerSection>,
    pub features: Option<FeaturesSection>,
    pub collections: Option<Vec<CollectionSeed>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AutoscalerSection {
    pub enabled: Option<bool>,
    pub target_success_rate: Option<f64>,
    pub max_incremental_increase_percent: Option<f64>,
    pub max_incremental_decrease_percent: Option<f64>,
    pub min_capacity_increase: Option<u64>,
    pub min_capacity: Option<u64>,
    pub throttle_window: Option<String>,
    pub min_scale_interval: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesSection {
    /// Feature flags switched off, e.g. `"autoscaler_disabled"`.
    pub disabled: Option<Vec<String>>,
}

/// A collection registered at startup if the store does not know it yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSeed {
    pub id: String,
    pub capacity: u64,
    pub partitions: u32,
}

impl CapscaleConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CapscaleConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Resolve the `[autoscaler]` section into a validated snapshot.
    pub fn autoscaler_config(&self) -> Result<AutoscalerConfig, ConfigError> {
        let defaults = AutoscalerConfig::default();
        let Some(section) = &self.autoscaler else {
            return Ok(defaults);
        };

        let config = AutoscalerConfig {
            enabled: section.enabled.unwrap_or(defaults.enabled),
            target_success_rate: section
                .target_success_rate
                .unwrap_or(defaults.target_success_rate),
            max_incremental_increase_percent: section
                .max_incremental_increase_percent
                .unwrap_or(defaults.max_incremental_increase_percent),
            max_incremental_decrease_percent: section
                .max_incremental_decrease_percent
                .unwrap_or(defaults.max_incremental_decrease_percent),
            min_capacity_increase: section
                .min_capacity_increase
                .unwrap_or(defaults.min_capacity_increase),
            min_capacity: section.min_capacity.or(defaults.min_capacity),
            throttle_window: match &section.throttle_window {
                Some(s) => parse_duration(s)?,
                None => defaults.throttle_window,
            },
            min_scale_interval: match &section.min_scale_interval {
                Some(s) => parse_duration(s)?,
                None => defaults.min_scale_interval,
            },
        };

        validate(&config)?;
        Ok(config)
    }

    /// Feature flags listed under `[features] disabled`.
    pub fn disabled_features(&self) -> HashSet<String> {
        self.features
            .as_ref()
            .and_then(|f| f.disabled.clone())
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    /// Validated `[[collections]]` seeds.
    pub fn collection_seeds(&self) -> Result<Vec<CollectionSeed>, ConfigError> {
        let seeds = self.collections.clone().unwrap_or_default();
        for seed in &seeds {
            seed.validate()?;
        }
        Ok(seeds)
    }
}

impl CollectionSeed {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |reason: String| ConfigError::Collection {
            id: self.id.clone(),
            reason,
        };

        if self.id.is_empty() {
            return Err(fail("id must not be empty".to_string()));
        }
        if self.partitions == 0 {
            return Err(fail("partitions must be at least 1".to_string()));
        }
        if self.capacity % CAPACITY_STEP != 0 {
            return Err(fail(format!(
                "capacity {} is not a multiple of {CAPACITY_STEP}",
                self.capacity
            )));
        }
        let ceiling = capacity_ceiling(self.partitions);
        if self.capacity > ceiling {
            return Err(fail(format!(
                "capacity {} exceeds ceiling {ceiling}",
                self.capacity
            )));
        }
        Ok(())
    }
}

/// Check the ranges the scaling decision relies on.
pub fn validate(config: &AutoscalerConfig) -> Result<(), ConfigError> {
    let target = config.target_success_rate;
    if !(target > 0.0 && target <= 1.0) {
        return Err(ConfigError::TargetSuccessRate(target));
    }
    let increase = config.max_incremental_increase_percent;
    if !(increase >= 0.0 && increase.is_finite()) {
        return Err(ConfigError::IncreasePercent(increase));
    }
    let decrease = config.max_incremental_decrease_percent;
    if !(0.0..=1.0).contains(&decrease) {
        return Err(ConfigError::DecreasePercent(decrease));
    }
    Ok(())
}
