//! # Hermes Module Runtime
//!
//! The library a simulation module links against to participate in a
//! Hermes run. It attaches the backplane segment and frame barrier from
//! the spawn environment, answers lifecycle commands on the control
//! channel, and drives a user-provided [`ModuleBehavior`] through the
//! per-frame protocol:
//!
//! ```text
//! wait_step -> behavior.step() -> signal_done
//! ```
//!
//! Module stdout is the control channel; anything a module wants to log
//! must go to stderr (the coordinator inherits it).

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod runtime;

pub use runtime::{init_module_logging, ModuleBehavior, ModuleContext, ModuleError, ModuleRuntime};
