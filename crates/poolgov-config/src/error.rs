//! Error types for configuration writes.

use thiserror::Error;

/// A rejected configuration write. The stored value is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown config field: {0}")]
    UnknownField(String),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("min_units ({min}) cannot exceed max_units ({max})")]
    BoundsInverted { min: u32, max: u32 },
}
