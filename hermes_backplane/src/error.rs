//! Error types for backplane and barrier operations.

use thiserror::Error;

/// Errors from shared memory segment and semaphore operations.
#[derive(Debug, Error)]
pub enum BackplaneError {
    /// A segment or semaphore of this name already exists in the kernel.
    #[error("IPC object already exists: {name}")]
    AlreadyExists {
        /// Offending kernel object name.
        name: String,
    },

    /// No segment or semaphore of this name exists.
    #[error("IPC object not found: {name}")]
    NotFound {
        /// Offending kernel object name.
        name: String,
    },

    /// The segment header's magic constant does not match.
    #[error("wrong magic on '{name}': expected {expected:#010x}, got {found:#010x}")]
    WrongMagic {
        /// Segment name.
        name: String,
        /// Expected magic constant.
        expected: u32,
        /// Magic value read from the header.
        found: u32,
    },

    /// The segment header's layout version does not match.
    #[error("wrong version on '{name}': expected {expected}, got {found}")]
    WrongVersion {
        /// Segment name.
        name: String,
        /// Expected layout version.
        expected: u32,
        /// Version read from the header.
        found: u32,
    },

    /// Signal name not present in the directory.
    #[error("unknown signal: {name}")]
    UnknownSignal {
        /// Qualified signal name.
        name: String,
    },

    /// Destination signal lacks the WRITABLE flag.
    #[error("signal not writable: {name}")]
    NotWritable {
        /// Qualified signal name.
        name: String,
    },

    /// Signal name violates the naming rules.
    #[error("invalid signal name '{name}': {reason}")]
    InvalidSignalName {
        /// Offending name.
        name: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// Qualified signal name declared more than once.
    #[error("duplicate signal name: {name}")]
    DuplicateSignal {
        /// Offending qualified name.
        name: String,
    },

    /// Write attempted through a read-only attachment.
    #[error("segment '{name}' attached read-only")]
    ReadOnly {
        /// Segment name.
        name: String,
    },

    /// The segment is too small to hold its own declared contents.
    #[error("segment '{name}' truncated: need {expected} bytes, got {actual}")]
    Truncated {
        /// Segment name.
        name: String,
        /// Minimum size implied by the header.
        expected: usize,
        /// Actual mapped size.
        actual: usize,
    },

    /// A directory entry carries an invalid type byte or string offset.
    #[error("corrupt directory in '{name}': {detail}")]
    CorruptDirectory {
        /// Segment name.
        name: String,
        /// What was malformed.
        detail: String,
    },

    /// OS-level error from a system call, with the offending object name.
    #[error("OS error on '{name}': {source}")]
    Os {
        /// Kernel object name.
        name: String,
        /// Underlying errno.
        source: nix::errno::Errno,
    },
}

/// Result type for backplane operations.
pub type BackplaneResult<T> = Result<T, BackplaneError>;
