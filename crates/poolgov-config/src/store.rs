//! The configuration store: tunables, validation, and the shared access point.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Governor tunables.
///
/// All fields are independently writable at runtime through [`ConfigStore`];
/// the control loop reads a snapshot per tick, so a change takes effect on
/// the next cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Milliseconds between control cycles.
    pub tick_interval_ms: u64,
    /// Inclusive lower bound on the online unit count.
    pub min_units: u32,
    /// Inclusive upper bound on the online unit count.
    pub max_units: u32,
    /// Percent of the reference unit's max rate above which all units must
    /// sit before a scale-up is considered.
    pub scale_up_pct: u32,
    /// Percent of the reference unit's max rate below which all units must
    /// sit before a scale-down is considered.
    pub scale_down_pct: u32,
    /// Consecutive eligible ticks required before a scale-up fires.
    pub cycles_to_scale_up: u32,
    /// Consecutive eligible ticks required before a scale-down fires.
    pub cycles_to_scale_down: u32,
}

impl Config {
    /// Default tunables for a pool of `total_units` units.
    ///
    /// `max_units` starts at the full pool size; everything else uses the
    /// stock governor values (100 ms tick, 90/45 thresholds, single-cycle
    /// debounce).
    pub fn defaults(total_units: u32) -> Self {
        Self {
            tick_interval_ms: 100,
            min_units: 1,
            max_units: total_units.max(1),
            scale_up_pct: 90,
            scale_down_pct: 45,
            cycles_to_scale_up: 1,
            cycles_to_scale_down: 1,
        }
    }
}

/// Shared, validated access point for [`Config`].
///
/// Clonable; all clones share the same underlying storage. Writers go through
/// per-field setters that validate against the pool size captured at
/// construction; readers take a consistent snapshot via [`ConfigStore::get`].
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<Mutex<Config>>,
    total_units: u32,
}

impl ConfigStore {
    /// Create a store with default tunables for a pool of `total_units`.
    pub fn new(total_units: u32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Config::defaults(total_units))),
            total_units,
        }
    }

    /// Create a store from an explicit starting config, validating every
    /// field as if it had been written through the setters.
    pub fn with_config(config: Config, total_units: u32) -> Result<Self, ConfigError> {
        let store = Self::new(total_units);
        store.set_tick_interval_ms(config.tick_interval_ms)?;
        // Order matters: widen max before raising min so a valid config
        // never trips the cross-field check against the defaults.
        store.set_max_units(config.max_units)?;
        store.set_min_units(config.min_units)?;
        store.set_scale_up_pct(config.scale_up_pct)?;
        store.set_scale_down_pct(config.scale_down_pct)?;
        store.set_cycles_to_scale_up(config.cycles_to_scale_up)?;
        store.set_cycles_to_scale_down(config.cycles_to_scale_down)?;
        Ok(store)
    }

    /// Total units in the pool, as captured at construction.
    pub fn total_units(&self) -> u32 {
        self.total_units
    }

    /// A consistent snapshot of the current tunables.
    pub fn get(&self) -> Config {
        self.inner.lock().unwrap().clone()
    }

    pub fn set_tick_interval_ms(&self, value: u64) -> Result<(), ConfigError> {
        if value == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tick_interval_ms",
                value,
                min: 1,
                max: u64::MAX,
            });
        }
        self.inner.lock().unwrap().tick_interval_ms = value;
        Ok(())
    }

    pub fn set_min_units(&self, value: u32) -> Result<(), ConfigError> {
        self.check_unit_bound("min_units", value)?;
        let mut cfg = self.inner.lock().unwrap();
        if value > cfg.max_units {
            return Err(ConfigError::BoundsInverted {
                min: value,
                max: cfg.max_units,
            });
        }
        cfg.min_units = value;
        Ok(())
    }

    pub fn set_max_units(&self, value: u32) -> Result<(), ConfigError> {
        self.check_unit_bound("max_units", value)?;
        let mut cfg = self.inner.lock().unwrap();
        if value < cfg.min_units {
            return Err(ConfigError::BoundsInverted {
                min: cfg.min_units,
                max: value,
            });
        }
        cfg.max_units = value;
        Ok(())
    }

    pub fn set_scale_up_pct(&self, value: u32) -> Result<(), ConfigError> {
        check_percent("scale_up_pct", value)?;
        self.inner.lock().unwrap().scale_up_pct = value;
        Ok(())
    }

    pub fn set_scale_down_pct(&self, value: u32) -> Result<(), ConfigError> {
        check_percent("scale_down_pct", value)?;
        self.inner.lock().unwrap().scale_down_pct = value;
        Ok(())
    }

    pub fn set_cycles_to_scale_up(&self, value: u32) -> Result<(), ConfigError> {
        check_cycles("cycles_to_scale_up", value)?;
        self.inner.lock().unwrap().cycles_to_scale_up = value;
        Ok(())
    }

    pub fn set_cycles_to_scale_down(&self, value: u32) -> Result<(), ConfigError> {
        check_cycles("cycles_to_scale_down", value)?;
        self.inner.lock().unwrap().cycles_to_scale_down = value;
        Ok(())
    }

    /// Write a field by name, for string-keyed external surfaces.
    pub fn set_field(&self, field: &str, value: u64) -> Result<(), ConfigError> {
        match field {
            "tick_interval_ms" => self.set_tick_interval_ms(value),
            "min_units" => self.set_min_units(narrow("min_units", value)?),
            "max_units" => self.set_max_units(narrow("max_units", value)?),
            "scale_up_pct" => self.set_scale_up_pct(narrow("scale_up_pct", value)?),
            "scale_down_pct" => self.set_scale_down_pct(narrow("scale_down_pct", value)?),
            "cycles_to_scale_up" => {
                self.set_cycles_to_scale_up(narrow("cycles_to_scale_up", value)?)
            }
            "cycles_to_scale_down" => {
                self.set_cycles_to_scale_down(narrow("cycles_to_scale_down", value)?)
            }
            other => Err(ConfigError::UnknownField(other.to_string())),
        }
    }

    fn check_unit_bound(&self, field: &'static str, value: u32) -> Result<(), ConfigError> {
        if value < 1 || value > self.total_units {
            return Err(ConfigError::OutOfRange {
                field,
                value: u64::from(value),
                min: 1,
                max: u64::from(self.total_units),
            });
        }
        Ok(())
    }
}

fn check_percent(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value > 100 {
        return Err(ConfigError::OutOfRange {
            field,
            value: u64::from(value),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

fn check_cycles(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange {
            field,
            value: 0,
            min: 1,
            max: u64::from(u32::MAX),
        });
    }
    Ok(())
}

/// Narrow a raw u64 from a string-keyed surface into a u32 field.
fn narrow(field: &'static str, value: u64) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::OutOfRange {
        field,
        value,
        min: 0,
        max: u64::from(u32::MAX),
    })
}
