//! Per-tick load sampling.
//!
//! Produces a fresh [`UnitSnapshot`] each control cycle: the reference
//! unit's maximum rate plus the slowest/fastest current rates across the
//! online set. The reference unit's own rate participates in slow/fast
//! tracking but is never a scale-down victim, so it is excluded from
//! `slowest_unit` selection.

use tracing::debug;

use crate::error::SampleError;
use crate::units::{RateProbe, UnitId};

/// One tick's view of the pool load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSnapshot {
    /// Maximum achievable rate of the reference unit.
    pub max_rate: u64,
    /// Lowest current rate across all sampled units, reference included.
    pub slowest_rate: u64,
    /// Highest current rate across all sampled units, reference included.
    pub fastest_rate: u64,
    /// The slowest non-reference online unit, if any was sampled.
    pub slowest_unit: Option<UnitId>,
    /// How many units contributed a rate to this snapshot.
    pub sampled: u32,
}

/// Samples the online set through a [`RateProbe`].
#[derive(Debug)]
pub struct RateSampler<P> {
    probe: P,
    reference: UnitId,
}

impl<P: RateProbe> RateSampler<P> {
    pub fn new(probe: P, reference: UnitId) -> Self {
        Self { probe, reference }
    }

    /// Sample every unit in `online` plus the reference unit.
    ///
    /// A unit whose rate is momentarily unknown is excluded from the
    /// snapshot; the tick proceeds with the remainder. The whole sample
    /// fails only if the reference max rate is unavailable or no unit
    /// reported a rate at all.
    pub fn sample(&self, online: &[UnitId]) -> Result<UnitSnapshot, SampleError> {
        let max_rate = self
            .probe
            .max_rate(self.reference)
            .ok_or(SampleError::ReferenceRateUnavailable(self.reference))?;

        let mut sampled = 0u32;
        let mut slowest_rate = u64::MAX;
        let mut fastest_rate = 0u64;
        let mut slowest: Option<(UnitId, u64)> = None;

        // The reference unit is logically always present; fold its rate in
        // even if the caller's online set omits it.
        if let Some(rate) = self.probe.current_rate(self.reference) {
            sampled += 1;
            slowest_rate = rate;
            fastest_rate = rate;
        }

        for &unit in online {
            if unit == self.reference {
                continue;
            }
            let Some(rate) = self.probe.current_rate(unit) else {
                debug!(unit, "no current rate, excluding from snapshot");
                continue;
            };
            sampled += 1;
            slowest_rate = slowest_rate.min(rate);
            fastest_rate = fastest_rate.max(rate);
            match slowest {
                Some((_, r)) if rate > r => {}
                _ => slowest = Some((unit, rate)),
            }
        }

        if sampled == 0 {
            return Err(SampleError::NoSamples);
        }

        Ok(UnitSnapshot {
            max_rate,
            slowest_rate,
            fastest_rate,
            slowest_unit: slowest.map(|(unit, _)| unit),
            sampled,
        })
    }

    /// The unit whose max rate anchors the thresholds.
    pub fn reference_unit(&self) -> UnitId {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapProbe {
        current: HashMap<UnitId, u64>,
        max: HashMap<UnitId, u64>,
    }

    impl MapProbe {
        fn new(current: &[(UnitId, u64)], max_rate: u64) -> Self {
            Self {
                current: current.iter().copied().collect(),
                max: HashMap::from([(0, max_rate)]),
            }
        }
    }

    impl RateProbe for MapProbe {
        fn current_rate(&self, unit: UnitId) -> Option<u64> {
            self.current.get(&unit).copied()
        }

        fn max_rate(&self, unit: UnitId) -> Option<u64> {
            self.max.get(&unit).copied()
        }
    }

    #[test]
    fn tracks_slowest_and_fastest() {
        let probe = MapProbe::new(&[(0, 500), (1, 300), (2, 800)], 1000);
        let sampler = RateSampler::new(probe, 0);

        let snap = sampler.sample(&[0, 1, 2]).unwrap();
        assert_eq!(snap.max_rate, 1000);
        assert_eq!(snap.slowest_rate, 300);
        assert_eq!(snap.fastest_rate, 800);
        assert_eq!(snap.slowest_unit, Some(1));
        assert_eq!(snap.sampled, 3);
    }

    #[test]
    fn reference_rate_folds_in_but_never_selects() {
        // Reference is the slowest overall; slowest_unit must still point
        // at the slowest non-reference unit.
        let probe = MapProbe::new(&[(0, 100), (1, 400), (2, 600)], 1000);
        let sampler = RateSampler::new(probe, 0);

        let snap = sampler.sample(&[0, 1, 2]).unwrap();
        assert_eq!(snap.slowest_rate, 100);
        assert_eq!(snap.slowest_unit, Some(1));
    }

    #[test]
    fn unknown_rate_excludes_unit_without_failing() {
        let probe = MapProbe::new(&[(0, 500), (2, 700)], 1000);
        let sampler = RateSampler::new(probe, 0);

        // Unit 1 went offline mid-sample; tick proceeds with the rest.
        let snap = sampler.sample(&[0, 1, 2]).unwrap();
        assert_eq!(snap.sampled, 2);
        assert_eq!(snap.slowest_unit, Some(2));
    }

    #[test]
    fn reference_only_pool_has_no_victim() {
        let probe = MapProbe::new(&[(0, 900)], 1000);
        let sampler = RateSampler::new(probe, 0);

        let snap = sampler.sample(&[0]).unwrap();
        assert_eq!(snap.slowest_unit, None);
        assert_eq!(snap.slowest_rate, 900);
        assert_eq!(snap.fastest_rate, 900);
    }

    #[test]
    fn missing_reference_max_rate_fails_sample() {
        let probe = MapProbe {
            current: HashMap::from([(0, 500)]),
            max: HashMap::new(),
        };
        let sampler = RateSampler::new(probe, 0);

        assert_eq!(
            sampler.sample(&[0]),
            Err(SampleError::ReferenceRateUnavailable(0))
        );
    }

    #[test]
    fn no_samples_fails() {
        let probe = MapProbe::new(&[], 1000);
        let sampler = RateSampler::new(probe, 0);

        assert_eq!(sampler.sample(&[0, 1]), Err(SampleError::NoSamples));
    }

    #[test]
    fn tie_keeps_later_unit_as_slowest() {
        let probe = MapProbe::new(&[(0, 500), (1, 300), (2, 300)], 1000);
        let sampler = RateSampler::new(probe, 0);

        let snap = sampler.sample(&[0, 1, 2]).unwrap();
        assert_eq!(snap.slowest_unit, Some(2));
    }
}
