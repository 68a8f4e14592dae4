//! Simulated unit pool for demos and manual testing.
//!
//! All online units follow a single synthetic load percentage applied to
//! the pool's max rate, plus a small per-unit offset so slowest/fastest
//! selection has something to distinguish. The load is steerable at
//! runtime from the control surface.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use poolgov_pool::{RateProbe, UnitId, UnitManager};

struct SimState {
    present: Vec<UnitId>,
    online: BTreeSet<UnitId>,
    max_rate: u64,
    load_pct: u32,
}

/// The shared simulated pool. `manager()` and `probe()` hand out views
/// over the same state for the governor to own.
#[derive(Clone)]
pub struct SimPool {
    inner: Arc<Mutex<SimState>>,
}

impl SimPool {
    pub fn new(units: u32, max_rate: u64, load_pct: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SimState {
                present: (0..units.max(1)).collect(),
                online: BTreeSet::from([0]),
                max_rate,
                load_pct: load_pct.min(100),
            })),
        }
    }

    pub fn manager(&self) -> SimManager {
        SimManager {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn probe(&self) -> SimProbe {
        SimProbe {
            inner: Arc::clone(&self.inner),
        }
    }

    /// Steer the synthetic load, as a percent of the max rate.
    pub fn set_load(&self, pct: u32) {
        self.inner.lock().unwrap().load_pct = pct.min(100);
    }

    pub fn load(&self) -> u32 {
        self.inner.lock().unwrap().load_pct
    }

    pub fn online_units(&self) -> Vec<UnitId> {
        self.inner.lock().unwrap().online.iter().copied().collect()
    }
}

/// [`UnitManager`] view over a [`SimPool`].
#[derive(Clone)]
pub struct SimManager {
    inner: Arc<Mutex<SimState>>,
}

impl UnitManager for SimManager {
    fn bring_online(&mut self, unit: UnitId) -> anyhow::Result<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.present.contains(&unit) {
            anyhow::bail!("unit {unit} is not present");
        }
        state.online.insert(unit);
        Ok(())
    }

    fn take_offline(&mut self, unit: UnitId) -> anyhow::Result<()> {
        let mut state = self.inner.lock().unwrap();
        if !state.online.remove(&unit) {
            anyhow::bail!("unit {unit} is not online");
        }
        Ok(())
    }

    fn is_online(&self, unit: UnitId) -> bool {
        self.inner.lock().unwrap().online.contains(&unit)
    }

    fn present_units(&self) -> Vec<UnitId> {
        self.inner.lock().unwrap().present.clone()
    }
}

/// [`RateProbe`] view over a [`SimPool`].
#[derive(Clone)]
pub struct SimProbe {
    inner: Arc<Mutex<SimState>>,
}

impl RateProbe for SimProbe {
    fn current_rate(&self, unit: UnitId) -> Option<u64> {
        let state = self.inner.lock().unwrap();
        if !state.online.contains(&unit) {
            return None;
        }
        let base = state.max_rate * u64::from(state.load_pct) / 100;
        let jitter = u64::from(unit) * (state.max_rate / 1000);
        Some((base + jitter).min(state.max_rate))
    }

    fn max_rate(&self, unit: UnitId) -> Option<u64> {
        let state = self.inner.lock().unwrap();
        state.present.contains(&unit).then_some(state.max_rate)
    }
}
