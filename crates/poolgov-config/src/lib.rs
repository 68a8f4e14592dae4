//! poolgov-config — validated tunables for the pool governor.
//!
//! Holds the governor's runtime configuration behind a shared, lock-guarded
//! store. External surfaces (CLI, RPC, files) write individual fields through
//! validated setters; the control loop reads one consistent snapshot per tick
//! and picks up changes on its next read, never mid-cycle.
//!
//! Every field is reject-on-invalid: a bad write returns `ConfigError` and
//! leaves the stored value untouched. Nothing is silently clamped or reset.

pub mod error;
pub mod store;

pub use error::ConfigError;
pub use store::{Config, ConfigStore};
