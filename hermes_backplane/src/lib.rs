//! # Hermes Signal Backplane
//!
//! Shared-memory data plane and process-coordination primitives for the
//! Hermes simulation platform. This crate provides:
//!
//! - [`Backplane`] - a named, fixed-layout POSIX shared memory segment
//!   holding a header, a signal directory, a string table, and an aligned
//!   value region. Created once by the coordinator, attached read/write
//!   by module processes, the wire router, and telemetry readers.
//! - [`FrameBarrier`] - a pair of named counting semaphores providing the
//!   per-frame rendezvous between the coordinator and N module workers.
//! - [`SignalRegistry`] - the coordinator-side index from qualified
//!   signal name to slot, built from configuration and fed into segment
//!   construction.
//!
//! ## Synchronization model
//!
//! The coordinator writes `(frame, time_ns)` into the header *before*
//! releasing the barrier's step semaphore; modules read them only after
//! `wait_step` returns. The semaphore release/acquire establishes the
//! happens-before edge. Per-signal reads and writes within a frame are
//! intentionally unsynchronized: the schedule orders producers before
//! consumers, and each slot is a single naturally-aligned 8-byte cell.
//!
//! ## Resource ownership
//!
//! The coordinator owns the segment and barrier names: it creates them
//! before any module spawn and must unlink them on every exit path.
//! Modules only ever attach and detach.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod barrier;
pub mod error;
pub mod layout;
pub mod registry;
pub mod segment;

pub use barrier::{BarrierPhase, FrameBarrier};
pub use error::{BackplaneError, BackplaneResult};
pub use layout::{BackplaneHeader, DirectoryEntry, SegmentLayout};
pub use registry::SignalRegistry;
pub use segment::{sweep_stale_objects, Backplane, SlotDump};
