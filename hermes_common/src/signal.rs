//! Signal descriptors, data types, and flags.
//!
//! A signal is one scalar value on the backplane, addressed by its
//! qualified name `"<module>.<local>"`. The numeric values of
//! [`SignalType`] and the bits of [`SignalFlags`] are part of the
//! on-segment ABI: they are written into the signal directory and read
//! back by every attaching process.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::consts::MAX_SIGNAL_NAME_LEN;

/// Scalar data type of a signal slot (FR: directory `data_type` byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum SignalType {
    /// 64-bit float (default).
    F64 = 0,
    /// 32-bit float.
    F32 = 1,
    /// 64-bit signed integer.
    I64 = 2,
    /// 32-bit signed integer.
    I32 = 3,
    /// Boolean, stored as u8 (0 or 1).
    Bool = 4,
}

impl SignalType {
    /// Convert from the raw directory byte. Returns `None` for invalid values.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::F64),
            1 => Some(Self::F32),
            2 => Some(Self::I64),
            3 => Some(Self::I32),
            4 => Some(Self::Bool),
            _ => None,
        }
    }

    /// Width of the stored representation in bytes. The slot itself is
    /// always 8 bytes; narrower types occupy the low bytes.
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::F64 | Self::I64 => 8,
            Self::F32 | Self::I32 => 4,
            Self::Bool => 1,
        }
    }
}

impl Default for SignalType {
    fn default() -> Self {
        Self::F64
    }
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::F64 => "f64",
            Self::F32 => "f32",
            Self::I64 => "i64",
            Self::I32 => "i32",
            Self::Bool => "bool",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// Signal property flags (directory `flags` byte).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SignalFlags: u8 {
        /// Value may be written through the public API (wires, scripting).
        const WRITABLE = 1 << 0;
        /// Value is included in telemetry streams.
        const PUBLISHED = 1 << 1;
    }
}

/// Metadata for one signal slot.
///
/// `name` is the qualified name; `local_name` is the part after the
/// module prefix. The slot index is assigned by the registry at segment
/// build time and never renumbered for the lifetime of the segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    /// Qualified name: `"<module>.<local>"`.
    pub name: String,
    /// Local name without the module prefix.
    pub local_name: String,
    /// Scalar data type.
    pub data_type: SignalType,
    /// Property flags.
    pub flags: SignalFlags,
    /// Physical unit string (e.g. `"m"`, `"rad/s"`). May be empty.
    pub unit: String,
    /// Human-readable description. May be empty.
    pub description: String,
}

impl SignalDescriptor {
    /// Build a descriptor from a module name and local signal name.
    pub fn new(module: &str, local: &str, data_type: SignalType, flags: SignalFlags) -> Self {
        Self {
            name: format!("{module}.{local}"),
            local_name: local.to_string(),
            data_type,
            flags,
            unit: String::new(),
            description: String::new(),
        }
    }
}

/// Check a qualified signal name against the naming rules.
///
/// A valid name is non-empty, at most 255 bytes, pure printable ASCII
/// with no whitespace or NUL, and contains at least one `.` separating
/// a non-empty module prefix from a non-empty local part.
///
/// Returns a short reason on rejection, for error context.
pub fn validate_qualified_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty name");
    }
    if name.len() > MAX_SIGNAL_NAME_LEN {
        return Err("name exceeds 255 bytes");
    }
    for b in name.bytes() {
        if !(0x21..=0x7E).contains(&b) {
            return Err("name must be printable ASCII without whitespace");
        }
    }
    match name.split_once('.') {
        None => Err("expected '<module>.<local>' format"),
        Some(("", _)) => Err("empty module prefix"),
        Some((_, "")) => Err("empty local name"),
        Some(_) => Ok(()),
    }
}
