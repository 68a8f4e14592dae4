//! Governor lifecycle errors.

use thiserror::Error;

/// Errors from the governor's enable/disable lifecycle.
///
/// `Scheduler` means the loop task itself died; the subsystem is no longer
/// governing the pool and the owning process must treat that as fatal for
/// this subsystem rather than ignore it.
#[derive(Debug, Error)]
pub enum GovernorError {
    #[error("governor is already enabled")]
    AlreadyEnabled,

    #[error("governor is not enabled")]
    NotEnabled,

    #[error("governor task failed: {0}")]
    Scheduler(String),
}
