//! poolgov-pool — the seam between the governor and the physical unit pool.
//!
//! The governor never touches hardware directly. It consumes two capability
//! traits supplied by the embedding process:
//!
//! - [`UnitManager`] — brings units online/offline and reports membership
//! - [`RateProbe`] — reads a unit's current and maximum operating rate
//!
//! On top of those this crate provides:
//!
//! ```text
//! RateSampler          TopologyController
//!   └── UnitSnapshot     ├── apply(Action)      one unit per action
//!   (fresh each tick)    ├── force_min()        suspend sweep
//!                        └── restore_max(n)     resume / teardown
//! ```
//!
//! The reference unit (id 0 by default) anchors the scaling thresholds and
//! is never taken offline.

pub mod error;
pub mod sampler;
pub mod topology;
pub mod units;

pub use error::{SampleError, TopologyError};
pub use sampler::{RateSampler, UnitSnapshot};
pub use topology::{Action, TopologyController};
pub use units::{RateProbe, UnitId, UnitManager};
