//! Backplane and telemetry constants.
//!
//! These define the fundamental parameters of the Hermes shared memory
//! layout and the telemetry wire format. They are the single source of
//! truth - all other crates import from here.

/// Magic number identifying a Hermes backplane segment: `"HERM"` as a
/// little-endian u32.
pub const BACKPLANE_MAGIC: u32 = 0x4845_524D;

/// Current backplane layout version. Attachers reject anything else.
///
/// v3: simulation time stored as integer nanoseconds (u64).
pub const BACKPLANE_VERSION: u32 = 3;

/// Fixed backplane header size in bytes.
pub const HEADER_SIZE: usize = 64;

/// Size of one signal directory entry in bytes.
pub const DIRECTORY_ENTRY_SIZE: usize = 12;

/// Alignment of the value region start within the segment.
pub const VALUE_REGION_ALIGN: usize = 64;

/// Size of one value slot in bytes. Every signal occupies one slot
/// regardless of its declared type, keeping all slots 8-byte aligned.
pub const SLOT_SIZE: usize = 8;

/// Maximum qualified signal name length in bytes.
pub const MAX_SIGNAL_NAME_LEN: usize = 255;

/// SHM name prefix for all Hermes kernel objects. Segment and semaphore
/// names share this prefix so a stale-resource sweep can find them.
pub const SHM_NAME_PREFIX: &str = "/hermes_";

/// Magic number identifying a telemetry frame: `"HERT"` as a
/// little-endian u32.
pub const TELEMETRY_MAGIC: u32 = 0x4845_5254;

/// Telemetry frame header size in bytes (magic + frame + time + count).
pub const TELEMETRY_HEADER_SIZE: usize = 24;

/// Nanoseconds per second, for clock conversions.
pub const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Default upper bound for any coordinator-side wait, in milliseconds.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_spells_herm() {
        assert_eq!(&BACKPLANE_MAGIC.to_be_bytes(), b"HERM");
    }

    #[test]
    fn telemetry_magic_spells_hert() {
        assert_eq!(&TELEMETRY_MAGIC.to_be_bytes(), b"HERT");
    }

    #[test]
    fn value_region_alignment_holds_slots() {
        assert_eq!(VALUE_REGION_ALIGN % SLOT_SIZE, 0);
        assert!(HEADER_SIZE <= VALUE_REGION_ALIGN);
    }
}
