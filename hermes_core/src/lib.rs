//! # Hermes Core Engine
//!
//! The coordinator side of the Hermes simulation platform:
//!
//! - [`process`] - the process manager that materializes the backplane
//!   and barrier from configuration, spawns module processes, sequences
//!   lifecycle commands, and tears everything down on every exit path.
//! - [`scheduler`] - the nanosecond-precision scheduler driving frames
//!   in realtime, as-fast-as-possible, or single-frame mode.
//! - [`router`] - the wire router applying `dst = src * gain + offset`
//!   at each frame boundary.
//! - [`telemetry`] - binary frame encoding for the telemetry consumer.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod process;
pub mod router;
pub mod scheduler;
pub mod telemetry;

pub use error::{CoreError, CoreResult};
pub use process::{ModuleProcess, ModuleState, ProcessManager};
pub use router::WireRouter;
pub use scheduler::{FrameHook, Scheduler, SchedulerHandle};
pub use telemetry::TelemetryEncoder;
