//! Hermes Common Library
//!
//! Shared types for all Hermes workspace crates.
//!
//! # Module Structure
//!
//! - [`config`] - Simulation configuration schema, YAML loading, cross-checks
//! - [`consts`] - Backplane and telemetry constants (single source of truth)
//! - [`protocol`] - Control-channel message types for module processes
//! - [`signal`] - Signal descriptors, data types, and flags

pub mod config;
pub mod consts;
pub mod protocol;
pub mod signal;
