//! The hysteresis decision engine.
//!
//! Pure function of one tick's snapshot: no clocks, no I/O, no state beyond
//! the cycle counter passed in by the loop.

use poolgov_config::Config;
use poolgov_pool::{Action, UnitSnapshot};

/// Decide what to do with the topology this tick. First match wins:
///
/// 1. Every sampled unit is above the up threshold (the *slowest* unit is
///    saturated) → `ScaleUp`, gated on `max_units` and the up cycle count.
/// 2. Every sampled unit is below the down threshold (even the *fastest*
///    unit is idle) and a non-reference victim exists → `ScaleDown`, gated
///    on `min_units` and the down cycle count.
/// 3. Otherwise `Hold`.
///
/// Gating on the slowest unit for scale-up and the fastest for scale-down
/// keeps a single hot or idle outlier from thrashing the pool. A failed
/// gate yields `Hold`; the caller increments `cycle` on every tick that
/// does not apply an action, which is what produces the debounce.
pub fn decide(snapshot: &UnitSnapshot, config: &Config, cycle: u32, online_count: u32) -> Action {
    let up_rate = u64::from(config.scale_up_pct) * snapshot.max_rate / 100;
    let down_rate = u64::from(config.scale_down_pct) * snapshot.max_rate / 100;

    if snapshot.slowest_rate > up_rate {
        if online_count < config.max_units && cycle >= config.cycles_to_scale_up {
            return Action::ScaleUp;
        }
    } else if snapshot.fastest_rate < down_rate && snapshot.slowest_unit.is_some() {
        if online_count > config.min_units && cycle >= config.cycles_to_scale_down {
            return Action::ScaleDown;
        }
    }

    Action::Hold
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::defaults(4)
    }

    fn snapshot(slowest: u64, fastest: u64, victim: Option<u32>) -> UnitSnapshot {
        UnitSnapshot {
            max_rate: 1_000_000,
            slowest_rate: slowest,
            fastest_rate: fastest,
            slowest_unit: victim,
            sampled: 2,
        }
    }

    #[test]
    fn saturated_pool_scales_up() {
        // Both units above 90% of max, room to grow, cycle gate met.
        let mut cfg = config();
        cfg.max_units = 3;
        let snap = snapshot(950_000, 950_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 1, 2), Action::ScaleUp);
    }

    #[test]
    fn idle_pool_with_unmet_cycle_gate_holds() {
        // Fastest unit at 30% with a 45% down threshold, but only one
        // eligible cycle accumulated out of the required two.
        let mut cfg = config();
        cfg.cycles_to_scale_down = 2;
        let snap = snapshot(200_000, 300_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 1, 2), Action::Hold);
    }

    #[test]
    fn idle_pool_scales_down_once_gate_met() {
        let mut cfg = config();
        cfg.cycles_to_scale_down = 2;
        let snap = snapshot(200_000, 300_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 2, 2), Action::ScaleDown);
    }

    #[test]
    fn no_scale_up_at_max_units() {
        let mut cfg = config();
        cfg.max_units = 2;
        let snap = snapshot(950_000, 980_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 10, 2), Action::Hold);
    }

    #[test]
    fn no_scale_down_at_min_units() {
        let mut cfg = config();
        cfg.min_units = 2;
        let snap = snapshot(100_000, 200_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 10, 2), Action::Hold);
    }

    #[test]
    fn no_scale_down_without_victim() {
        // Reference unit alone can be idle; there is nothing to unplug.
        let snap = snapshot(100_000, 100_000, None);

        assert_eq!(decide(&snap, &config(), 10, 1), Action::Hold);
    }

    #[test]
    fn mixed_load_holds() {
        // One unit busy, one idle: neither threshold condition holds.
        let snap = snapshot(300_000, 950_000, Some(1));

        assert_eq!(decide(&snap, &config(), 10, 2), Action::Hold);
    }

    #[test]
    fn up_threshold_is_exclusive() {
        // Exactly at 90% of max is not "above" the threshold.
        let snap = snapshot(900_000, 900_000, Some(1));

        assert_eq!(decide(&snap, &config(), 10, 2), Action::Hold);
    }

    #[test]
    fn scale_up_wins_over_scale_down_ordering() {
        // A degenerate config where both thresholds would match evaluates
        // the up branch first.
        let mut cfg = config();
        cfg.scale_up_pct = 10;
        cfg.scale_down_pct = 100;
        let snap = snapshot(500_000, 500_000, Some(1));

        assert_eq!(decide(&snap, &cfg, 1, 2), Action::ScaleUp);
    }
}
