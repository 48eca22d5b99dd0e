//! Scaling decision — pure capacity math.
//!
//! Converts the current capacity, partition count and throttle summary into
//! either a new capacity or "no change". All clamping, rounding and the
//! per-partition ceiling live here; nothing in this module performs I/O.

use tracing::trace;

use capscale_core::{AutoscalerConfig, CAPACITY_STEP, ThrottleSummary, capacity_ceiling};

/// A scaling decision for a single collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Provision the given capacity.
    ScaleTo(u64),
    /// Leave the collection as it is.
    NoChange,
}

/// Decide the next capacity for a collection.
///
/// A returned `ScaleTo(n)` always satisfies `n % 100 == 0`,
/// `n <= partitions * 10_000` and `n != current`.
pub fn decide(
    current: u64,
    partitions: u32,
    summary: &ThrottleSummary,
    config: &AutoscalerConfig,
) -> ScaleDecision {
    let step = clamped_step(current, summary, config);
    let rounded = match step {
        Some(Step::Up(clamped)) => round_up_exclusive(clamped),
        Some(Step::Down(clamped)) => round_down(clamped),
        None => return ScaleDecision::NoChange,
    };

    let floored = match config.min_capacity {
        Some(min) => rounded.max(min.div_ceil(CAPACITY_STEP).saturating_mul(CAPACITY_STEP)),
        None => rounded,
    };
    let target = floored.min(capacity_ceiling(partitions));

    trace!(current, partitions, ?step, rounded, target, "scaling decision");

    if target == current {
        ScaleDecision::NoChange
    } else {
        ScaleDecision::ScaleTo(target)
    }
}

/// Direction of a move and the clamped capacity before rounding.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Step {
    Up(f64),
    Down(f64),
}

/// Apply the ratio and the per-cycle clamps. `None` when the raw target is
/// exactly the current capacity.
fn clamped_step(current: u64, summary: &ThrottleSummary, config: &AutoscalerConfig) -> Option<Step> {
    let current_f = current as f64;

    // No recent traffic means no ratio; trim back by the largest allowed step.
    let raw_target = match summary.recent_success_rate() {
        None => current_f * (1.0 - config.max_incremental_decrease_percent),
        Some(rate) if rate > 0.0 => current_f * config.target_success_rate / rate,
        // Every recent request throttled: unbounded, left to the clamps.
        Some(_) => f64::INFINITY,
    };
    let delta = raw_target - current_f;

    if delta > 0.0 {
        let step = delta
            .min(current_f * config.max_incremental_increase_percent)
            .max(config.min_capacity_increase as f64);
        Some(Step::Up(current_f + step))
    } else if delta < 0.0 {
        let step = (-delta).min(current_f * config.max_incremental_decrease_percent);
        Some(Step::Down(current_f - step))
    } else {
        None
    }
}

/// Next multiple of 100 strictly above `value`.
fn round_up_exclusive(value: f64) -> u64 {
    let steps = (value / CAPACITY_STEP as f64).floor() as u64;
    steps.saturating_add(1).saturating_mul(CAPACITY_STEP)
}

/// Largest multiple of 100 not above `value`.
fn round_down(value: f64) -> u64 {
    let steps = (value / CAPACITY_STEP as f64).floor() as u64;
    steps.saturating_mul(CAPACITY_STEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clamps wide open so only the ratio and rounding matter.
    fn unclamped() -> AutoscalerConfig {
        AutoscalerConfig {
            target_success_rate: 0.99,
            max_incremental_increase_percent: 1000.0,
            max_incremental_decrease_percent: 1.0,
            min_capacity_increase: 0,
            ..Default::default()
        }
    }

    fn summary(recent: (u64, u64), older: (u64, u64)) -> ThrottleSummary {
        ThrottleSummary::new(recent, older)
    }

    #[test]
    fn half_throttled_rounds_up_to_next_step() {
        let s = summary((1000, 500), (1, 0));
        assert_eq!(decide(1000, 10, &s, &unclamped()), ScaleDecision::ScaleTo(2000));
    }

    #[test]
    fn exact_multiple_still_bumps_on_scale_up() {
        // 1000 * 0.99 / 0.9 = 1100 exactly; scale-up rounding is exclusive.
        let s = summary((1000, 100), (1, 0));
        assert_eq!(decide(1000, 10, &s, &unclamped()), ScaleDecision::ScaleTo(1200));
    }

    #[test]
    fn heavy_throttling_reaches_partition_ceiling() {
        let s = summary((1000, 900), (1, 0));
        assert_eq!(decide(1000, 10, &s, &unclamped()), ScaleDecision::ScaleTo(10_000));
    }

    #[test]
    fn single_partition_capped_at_ten_thousand() {
        let s = summary((1000, 999), (1, 0));
        assert_eq!(decide(1000, 1, &s, &unclamped()), ScaleDecision::ScaleTo(10_000));
    }

    #[test]
    fn increase_clamped_then_rounded() {
        let config = AutoscalerConfig {
            max_incremental_increase_percent: 0.5,
            max_incremental_decrease_percent: 0.05,
            ..unclamped()
        };
        let s = summary((1000, 500), (1, 0));
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::ScaleTo(1600));
    }

    #[test]
    fn small_overshoot_floors_on_scale_down() {
        let s = summary((1, 0), (1000, 1));
        assert_eq!(decide(100_000, 10, &s, &unclamped()), ScaleDecision::ScaleTo(99_000));
    }

    #[test]
    fn decrease_clamped_to_max_percent() {
        let config = AutoscalerConfig {
            target_success_rate: 0.5,
            max_incremental_increase_percent: 0.5,
            max_incremental_decrease_percent: 0.05,
            min_capacity_increase: 0,
            ..Default::default()
        };
        let s = summary((1, 0), (1000, 1));
        assert_eq!(decide(100_000, 10, &s, &config), ScaleDecision::ScaleTo(95_000));
    }

    #[test]
    fn no_recent_traffic_applies_max_decrease() {
        let config = AutoscalerConfig {
            max_incremental_increase_percent: 0.5,
            max_incremental_decrease_percent: 0.05,
            ..unclamped()
        };
        let s = summary((0, 0), (1000, 0));
        assert_eq!(decide(100_000, 10, &s, &config), ScaleDecision::ScaleTo(95_000));
    }

    #[test]
    fn no_recent_traffic_without_decrease_is_no_change() {
        let config = AutoscalerConfig {
            max_incremental_decrease_percent: 0.0,
            ..unclamped()
        };
        let s = summary((0, 0), (0, 0));
        assert_eq!(decide(5000, 10, &s, &config), ScaleDecision::NoChange);
    }

    #[test]
    fn exact_target_is_no_change() {
        // Observed rate equals the target: delta is exactly zero.
        let config = AutoscalerConfig {
            target_success_rate: 0.9,
            ..unclamped()
        };
        let s = summary((1000, 100), (0, 0));
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::NoChange);
    }

    #[test]
    fn all_requests_throttled_stays_finite() {
        let config = AutoscalerConfig {
            max_incremental_increase_percent: 0.5,
            ..unclamped()
        };
        let s = summary((1000, 1000), (0, 0));
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::ScaleTo(1600));

        // Even with no increase clamp the ceiling holds.
        assert_eq!(decide(1000, 3, &s, &unclamped()), ScaleDecision::ScaleTo(30_000));
    }

    #[test]
    fn min_increase_makes_small_steps_material() {
        let config = AutoscalerConfig {
            min_capacity_increase: 500,
            ..unclamped()
        };
        // Raw target 1000 * 0.99 / 0.98 ≈ 1010: a 10-unit step raised to 500.
        let s = summary((1000, 20), (0, 0));
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::ScaleTo(1600));
    }

    #[test]
    fn scale_down_exact_multiple_unchanged_by_rounding() {
        let config = AutoscalerConfig {
            target_success_rate: 0.5,
            max_incremental_decrease_percent: 0.1,
            ..unclamped()
        };
        let s = summary((10, 0), (0, 0));
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::ScaleTo(900));
    }

    #[test]
    fn sub_step_decrease_floors_a_whole_step() {
        let config = AutoscalerConfig {
            target_success_rate: 0.999,
            ..unclamped()
        };
        // raw = 100 * 0.999 = 99.9, floored to 0.
        let s = summary((10, 0), (0, 0));
        assert_eq!(decide(100, 1, &s, &config), ScaleDecision::ScaleTo(0));
    }

    #[test]
    fn ceiling_back_to_current_is_no_change() {
        let s = summary((1000, 500), (0, 0));
        assert_eq!(decide(10_000, 1, &s, &unclamped()), ScaleDecision::NoChange);
    }

    #[test]
    fn min_capacity_floor_holds() {
        let config = AutoscalerConfig {
            max_incremental_decrease_percent: 0.5,
            min_capacity: Some(750),
            ..unclamped()
        };
        let s = summary((0, 0), (0, 0));
        // 1000 * 0.5 = 500, floor 750 rounds up to 800.
        assert_eq!(decide(1000, 10, &s, &config), ScaleDecision::ScaleTo(800));
        // Already at the floor: no change.
        assert_eq!(decide(800, 10, &s, &config), ScaleDecision::NoChange);
    }

    #[test]
    fn results_are_aligned_bounded_and_directed() {
        let rates = [(0, 0), (1000, 0), (1000, 1), (1000, 10), (1000, 500), (1000, 999), (1000, 1000)];
        let capacities = [0, 100, 400, 1000, 9_900, 10_000, 55_500, 100_000];
        let configs = [
            unclamped(),
            AutoscalerConfig::default(),
            AutoscalerConfig {
                min_capacity_increase: 300,
                ..AutoscalerConfig::default()
            },
        ];

        for config in &configs {
            for &partitions in &[1u32, 3, 10] {
                for &current in &capacities {
                    for &recent in &rates {
                        let s = summary(recent, (0, 0));
                        let ScaleDecision::ScaleTo(n) = decide(current, partitions, &s, config) else {
                            continue;
                        };
                        let ceiling = capacity_ceiling(partitions);
                        assert_eq!(n % CAPACITY_STEP, 0, "unaligned {n}");
                        assert!(n <= ceiling, "{n} over ceiling");
                        assert_ne!(n, current);

                        // Scale-up lands strictly above the clamped value unless the ceiling
                        // cut it; scale-down never lands above it.
                        if config.min_capacity.is_none() {
                            match clamped_step(current, &s, config) {
                                Some(Step::Up(clamped)) => assert!(
                                    n as f64 > clamped || n == ceiling,
                                    "{current} -> {n} not above {clamped}"
                                ),
                                Some(Step::Down(clamped)) => assert!(
                                    n as f64 <= clamped,
                                    "{current} -> {n} above {clamped}"
                                ),
                                None => panic!("{current} -> {n} without a step"),
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round_up_exclusive(1980.0), 2000);
        assert_eq!(round_up_exclusive(1100.0), 1200);
        assert_eq!(round_up_exclusive(0.0), 100);
        assert_eq!(round_down(99_099.0), 99_000);
        assert_eq!(round_down(95_000.0), 95_000);
        assert_eq!(round_down(99.9), 0);
    }
}
