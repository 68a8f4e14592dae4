//! Online-set control: applies scale actions and the suspend/resume sweeps.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::TopologyError;
use crate::sampler::UnitSnapshot;
use crate::units::{UnitId, UnitManager};

/// What the decision engine wants done this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// Bring one offline unit online.
    ScaleUp,
    /// Take the slowest non-reference unit offline.
    ScaleDown,
    /// Leave the topology alone.
    Hold,
}

/// Applies topology changes through a [`UnitManager`].
///
/// The reference unit is never taken offline, by `force_min`, by
/// `ScaleDown`, or otherwise.
#[derive(Debug)]
pub struct TopologyController<M> {
    manager: M,
    reference: UnitId,
}

impl<M: UnitManager> TopologyController<M> {
    pub fn new(manager: M, reference: UnitId) -> Self {
        Self { manager, reference }
    }

    /// Units currently online, ascending by id.
    pub fn online_units(&self) -> Vec<UnitId> {
        self.manager
            .present_units()
            .into_iter()
            .filter(|&u| self.manager.is_online(u))
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.online_units().len()
    }

    /// Apply one scale action. `Hold` is a no-op.
    ///
    /// Scale-up picks the lowest-id present unit that is offline; scale-down
    /// takes the snapshot's slowest unit offline. Failures are reported to
    /// the caller and not retried within the tick.
    pub fn apply(&mut self, action: Action, snapshot: &UnitSnapshot) -> Result<(), TopologyError> {
        match action {
            Action::Hold => Ok(()),
            Action::ScaleUp => {
                let unit = self
                    .manager
                    .present_units()
                    .into_iter()
                    .find(|&u| !self.manager.is_online(u))
                    .ok_or(TopologyError::NoCandidate)?;
                self.manager
                    .bring_online(unit)
                    .map_err(|source| TopologyError::Manager { unit, source })?;
                info!(unit, online = self.online_count(), "unit brought online");
                Ok(())
            }
            Action::ScaleDown => {
                let unit = snapshot.slowest_unit.ok_or(TopologyError::NoVictim)?;
                if unit == self.reference {
                    return Err(TopologyError::NoVictim);
                }
                self.manager
                    .take_offline(unit)
                    .map_err(|source| TopologyError::Manager { unit, source })?;
                info!(unit, online = self.online_count(), "unit taken offline");
                Ok(())
            }
        }
    }

    /// Take every non-reference unit offline. Used on suspend.
    ///
    /// Per-unit manager failures are logged and the sweep continues; the
    /// return value is the online count afterwards.
    pub fn force_min(&mut self) -> usize {
        for unit in self.online_units() {
            if unit == self.reference {
                continue;
            }
            if let Err(error) = self.manager.take_offline(unit) {
                warn!(unit, %error, "failed to take unit offline during sweep");
            }
        }
        self.online_count()
    }

    /// Bring present, offline units online in ascending id order until the
    /// online count reaches `limit` or no offline units remain. Used on
    /// resume and on governor teardown.
    pub fn restore_max(&mut self, limit: usize) -> usize {
        for unit in self.manager.present_units() {
            if self.online_count() >= limit {
                break;
            }
            if self.manager.is_online(unit) {
                continue;
            }
            if let Err(error) = self.manager.bring_online(unit) {
                warn!(unit, %error, "failed to bring unit online during restore");
            }
        }
        self.online_count()
    }
}
