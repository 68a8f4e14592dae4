//! Error types for sampling and topology changes.

use thiserror::Error;

use crate::units::UnitId;

/// A tick-level sampling failure. The tick holds and re-samples next cycle.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("reference unit {0} reported no maximum rate")]
    ReferenceRateUnavailable(UnitId),

    #[error("no online unit reported a rate")]
    NoSamples,
}

/// A failed topology change. Logged by the governor, never retried within
/// the same tick; the next tick re-evaluates from fresh state.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("no offline unit available to bring online")]
    NoCandidate,

    #[error("no unit eligible to go offline")]
    NoVictim,

    #[error("unit manager failed on unit {unit}")]
    Manager {
        unit: UnitId,
        #[source]
        source: anyhow::Error,
    },
}
