//! poolgov-governor — the autonomous scaling control loop.
//!
//! Periodically samples per-unit load, applies debounced hysteresis to
//! decide between scaling up, scaling down, or holding, and coordinates
//! with an external power-state signal that suspends and resumes both the
//! loop and the unit topology.
//!
//! # Architecture
//!
//! ```text
//! Governor (enable / disable lifecycle)
//!   └── one spawned task, sole owner of the loop state
//!       ├── tick: ConfigStore.get() → RateSampler → decide() → apply()
//!       ├── PowerOff: pause ticking, TopologyController::force_min()
//!       ├── PowerOn:  restore_max(max_units), rearm the tick
//!       └── shutdown: restore_max(max_units), return the core
//! ```
//!
//! Tick, suspend, resume, and teardown all run inside the single task, so
//! mutual exclusion over the topology is total by construction: a suspend
//! sweep can never interleave with an in-flight tick.
//!
//! # Debounce
//!
//! A tick where the pool *could* scale but the cycle gate is not yet met
//! holds and increments the cycle counter; only an applied action resets
//! it. A sustained condition therefore accumulates cycles until it has
//! persisted for `cycles_to_scale_up` / `cycles_to_scale_down` ticks.

pub mod engine;
pub mod error;
pub mod governor;

pub use engine::decide;
pub use error::GovernorError;
pub use governor::{Governor, GovernorHandle, GovernorStatus, PowerEvent};
