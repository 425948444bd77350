//! Error types for the coordinator engine.
//!
//! The core recovers nothing locally: every error surfaces to the
//! scheduler loop, which stops the run, terminates all modules, and
//! returns the first error to the caller. Partial shutdown still
//! unlinks the IPC objects.

use hermes_backplane::{BackplaneError, BarrierPhase};
use hermes_common::config::ConfigError;
use thiserror::Error;

/// Errors from the process manager, scheduler, router, and telemetry
/// boundary.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration loading or validation failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Shared memory or semaphore failure.
    #[error(transparent)]
    Backplane(#[from] BackplaneError),

    /// Spawning a module process failed.
    #[error("failed to spawn module '{name}': {source}")]
    ModuleSpawn {
        /// Module name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A module process exited without being told to.
    #[error("module '{name}' (pid {pid}) crashed: {status}")]
    ModuleCrashed {
        /// Module name.
        name: String,
        /// Process ID of the dead child.
        pid: u32,
        /// Exit description: `"exit code N"` or `"signal N"`.
        status: String,
    },

    /// A barrier wait exceeded its bound.
    #[error("barrier timeout in phase '{phase}'{}", match module { Some(m) => format!(" waiting for module '{m}'"), None => String::new() })]
    BarrierTimeout {
        /// The module being waited for, when attributable.
        module: Option<String>,
        /// Which semaphore the wait was on.
        phase: BarrierPhase,
    },

    /// A module rejected or never acknowledged a lifecycle command.
    #[error("module '{name}' failed to {command}: {detail}")]
    CommandFailed {
        /// Module name.
        name: String,
        /// The command that failed.
        command: String,
        /// What went wrong (error reply or timeout).
        detail: String,
    },

    /// The module's control channel is unusable.
    #[error("control channel to module '{name}' broken: {detail}")]
    ControlChannel {
        /// Module name.
        name: String,
        /// What went wrong.
        detail: String,
    },

    /// Malformed data at the telemetry boundary.
    #[error("telemetry protocol error: {detail}")]
    Protocol {
        /// What was malformed.
        detail: String,
    },
}

/// Result type for coordinator operations.
pub type CoreResult<T> = Result<T, CoreError>;
