//! Binary telemetry encoding for the streaming consumer.
//!
//! The telemetry collaborator receives one binary frame per push:
//!
//! ```text
//! [0..4]   magic: u32 LE  (0x48455254, "HERT")
//! [4..12]  frame: u64 LE
//! [12..20] time:  f64 LE  (seconds, derived from time_ns / 1e9)
//! [20..24] count: u32 LE
//! [24..]   values: f64 LE x count, in subscription order
//! ```
//!
//! Subscriptions are resolved once against the registry; encoding reads
//! straight off the backplane. Readers sampling between barrier
//! completion and the next release observe a consistent clock pair.

use hermes_backplane::{Backplane, SignalRegistry};
use hermes_common::consts::{NANOS_PER_SECOND, TELEMETRY_HEADER_SIZE, TELEMETRY_MAGIC};

use crate::error::{CoreError, CoreResult};

/// A decoded telemetry frame, for tests and debugging consumers.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    /// Frame number.
    pub frame: u64,
    /// Simulation time in seconds.
    pub time: f64,
    /// Signal values in subscription order.
    pub values: Vec<f64>,
}

/// Encodes telemetry frames from the backplane.
pub struct TelemetryEncoder {
    slots: Vec<usize>,
    names: Vec<String>,
}

impl TelemetryEncoder {
    /// Resolve subscription patterns against the registry.
    ///
    /// A pattern is an exact qualified name, `module.*` for every signal
    /// of one module, or `*` for everything. Expansion preserves pattern
    /// order (registry order within a wildcard) and drops duplicates.
    ///
    /// # Errors
    /// [`CoreError::Protocol`] if an exact pattern names an unknown
    /// signal.
    pub fn new(patterns: &[String], registry: &SignalRegistry) -> CoreResult<Self> {
        let mut slots = Vec::new();
        let mut names = Vec::new();
        let mut push = |slot: usize, name: &str| {
            if !slots.contains(&slot) {
                slots.push(slot);
                names.push(name.to_string());
            }
        };

        for pattern in patterns {
            if pattern == "*" {
                for (slot, desc) in registry.iter() {
                    push(slot, &desc.name);
                }
            } else if let Some(module) = pattern.strip_suffix(".*") {
                let prefix = format!("{module}.");
                let mut matched = false;
                for (slot, desc) in registry.iter() {
                    if desc.name.starts_with(&prefix) {
                        push(slot, &desc.name);
                        matched = true;
                    }
                }
                if !matched {
                    return Err(CoreError::Protocol {
                        detail: format!("subscription matches nothing: {pattern}"),
                    });
                }
            } else {
                let slot = registry.slot_of(pattern).ok_or_else(|| CoreError::Protocol {
                    detail: format!("unknown signal in subscription: {pattern}"),
                })?;
                push(slot, pattern);
            }
        }

        Ok(Self { slots, names })
    }

    /// Subscribed signal names, in frame order.
    pub fn signal_names(&self) -> &[String] {
        &self.names
    }

    /// Number of values per frame.
    pub fn signal_count(&self) -> usize {
        self.slots.len()
    }

    /// Size in bytes of frames produced by this encoder.
    pub fn frame_size(&self) -> usize {
        TELEMETRY_HEADER_SIZE + self.slots.len() * 8
    }

    /// Encode the backplane's current state into one binary frame.
    pub fn encode(&self, backplane: &Backplane) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.frame_size());
        out.extend_from_slice(&TELEMETRY_MAGIC.to_le_bytes());
        out.extend_from_slice(&backplane.frame().to_le_bytes());
        let time = backplane.time_ns() as f64 / NANOS_PER_SECOND as f64;
        out.extend_from_slice(&time.to_le_bytes());
        out.extend_from_slice(&(self.slots.len() as u32).to_le_bytes());
        for &slot in &self.slots {
            out.extend_from_slice(&backplane.get_slot_value(slot).to_le_bytes());
        }
        out
    }

    /// Decode a binary frame. Primarily for tests and debugging.
    pub fn decode(data: &[u8]) -> CoreResult<DecodedFrame> {
        if data.len() < TELEMETRY_HEADER_SIZE {
            return Err(CoreError::Protocol {
                detail: format!("frame too short: {} bytes", data.len()),
            });
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().expect("slice is 4 bytes"));
        if magic != TELEMETRY_MAGIC {
            return Err(CoreError::Protocol {
                detail: format!("invalid magic: {magic:#010x}"),
            });
        }
        let frame = u64::from_le_bytes(data[4..12].try_into().expect("slice is 8 bytes"));
        let time = f64::from_le_bytes(data[12..20].try_into().expect("slice is 8 bytes"));
        let count = u32::from_le_bytes(data[20..24].try_into().expect("slice is 4 bytes")) as usize;

        let expected = TELEMETRY_HEADER_SIZE + count * 8;
        if data.len() < expected {
            return Err(CoreError::Protocol {
                detail: format!("frame truncated: {} < {expected}", data.len()),
            });
        }

        let mut values = Vec::with_capacity(count);
        for i in 0..count {
            let start = TELEMETRY_HEADER_SIZE + i * 8;
            values.push(f64::from_le_bytes(
                data[start..start + 8].try_into().expect("slice is 8 bytes"),
            ));
        }

        Ok(DecodedFrame {
            frame,
            time,
            values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_common::signal::{SignalDescriptor, SignalFlags, SignalType};

    fn registry() -> SignalRegistry {
        SignalRegistry::new(vec![
            SignalDescriptor::new("a", "x", SignalType::F64, SignalFlags::PUBLISHED),
            SignalDescriptor::new("a", "y", SignalType::F64, SignalFlags::PUBLISHED),
            SignalDescriptor::new("b", "z", SignalType::F64, SignalFlags::PUBLISHED),
        ])
        .unwrap()
    }

    #[test]
    fn exact_pattern_resolves_one_slot() {
        let enc = TelemetryEncoder::new(&["b.z".to_string()], &registry()).unwrap();
        assert_eq!(enc.signal_names(), ["b.z"]);
        assert_eq!(enc.frame_size(), 32);
    }

    #[test]
    fn module_wildcard_expands_in_registry_order() {
        let enc = TelemetryEncoder::new(&["a.*".to_string()], &registry()).unwrap();
        assert_eq!(enc.signal_names(), ["a.x", "a.y"]);
    }

    #[test]
    fn star_matches_everything_without_duplicates() {
        let enc =
            TelemetryEncoder::new(&["a.x".to_string(), "*".to_string()], &registry()).unwrap();
        assert_eq!(enc.signal_names(), ["a.x", "a.y", "b.z"]);
    }

    #[test]
    fn unknown_subscription_is_a_protocol_error() {
        assert!(TelemetryEncoder::new(&["ghost.q".to_string()], &registry()).is_err());
        assert!(TelemetryEncoder::new(&["ghost.*".to_string()], &registry()).is_err());
    }

    #[test]
    fn encode_decode_roundtrip() {
        let name = format!("/hermes_test_telemetry_{}", std::process::id());
        let registry = registry();
        let mut backplane = Backplane::create(&name, registry.descriptors()).unwrap();
        backplane.set_signal("a.x", 1.5).unwrap();
        backplane.set_signal("b.z", -2.0).unwrap();
        backplane.set_clock(7, 70_000_000).unwrap();

        let enc = TelemetryEncoder::new(&["*".to_string()], &registry).unwrap();
        let bytes = enc.encode(&backplane);
        assert_eq!(bytes.len(), enc.frame_size());

        let decoded = TelemetryEncoder::decode(&bytes).unwrap();
        assert_eq!(decoded.frame, 7);
        assert_eq!(decoded.time, 0.07);
        assert_eq!(decoded.values, vec![1.5, 0.0, -2.0]);

        backplane.destroy();
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(TelemetryEncoder::decode(&[0u8; 4]).is_err());
        let mut bytes = vec![0u8; TELEMETRY_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&0xDEADBEEFu32.to_le_bytes());
        assert!(TelemetryEncoder::decode(&bytes).is_err());
    }
}
