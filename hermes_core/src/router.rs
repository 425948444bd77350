//! Wire router: affine signal copies at the frame boundary.
//!
//! Wires are compiled once against the registry into slot indices; each
//! `route()` call walks the list in declaration order performing
//! `slot[dst] = slot[src] * gain + offset` on the value region. No
//! per-frame allocation.

use hermes_backplane::{Backplane, BackplaneError, BackplaneResult, SignalRegistry};
use hermes_common::config::WireConfig;
use hermes_common::signal::SignalFlags;

/// One pre-validated wire.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CompiledWire {
    src_slot: usize,
    dst_slot: usize,
    gain: f64,
    offset: f64,
}

/// Compiled wire list.
#[derive(Debug, Clone, Default)]
pub struct WireRouter {
    wires: Vec<CompiledWire>,
}

impl WireRouter {
    /// Compile and validate a wire list against the registry.
    ///
    /// Every endpoint must exist, the destination must carry WRITABLE,
    /// and a wire may not loop onto itself.
    pub fn compile(wires: &[WireConfig], registry: &SignalRegistry) -> BackplaneResult<Self> {
        let mut compiled = Vec::with_capacity(wires.len());
        for wire in wires {
            let src_slot =
                registry
                    .slot_of(&wire.src)
                    .ok_or_else(|| BackplaneError::UnknownSignal {
                        name: wire.src.clone(),
                    })?;
            let dst_slot =
                registry
                    .slot_of(&wire.dst)
                    .ok_or_else(|| BackplaneError::UnknownSignal {
                        name: wire.dst.clone(),
                    })?;
            let dst = registry
                .descriptor(dst_slot)
                .ok_or_else(|| BackplaneError::UnknownSignal {
                    name: wire.dst.clone(),
                })?;
            if !dst.flags.contains(SignalFlags::WRITABLE) {
                return Err(BackplaneError::NotWritable {
                    name: wire.dst.clone(),
                });
            }
            if src_slot == dst_slot {
                return Err(BackplaneError::InvalidSignalName {
                    name: wire.src.clone(),
                    reason: "wire source equals destination",
                });
            }
            compiled.push(CompiledWire {
                src_slot,
                dst_slot,
                gain: wire.gain,
                offset: wire.offset,
            });
        }
        Ok(Self { wires: compiled })
    }

    /// Execute all wire transfers in declaration order.
    pub fn route(&self, backplane: &Backplane) -> BackplaneResult<()> {
        for wire in &self.wires {
            let value = backplane.get_slot_value(wire.src_slot);
            backplane.set_slot_value(wire.dst_slot, value * wire.gain + wire.offset)?;
        }
        Ok(())
    }

    /// Number of compiled wires.
    pub fn len(&self) -> usize {
        self.wires.len()
    }

    /// Whether no wires are configured.
    pub fn is_empty(&self) -> bool {
        self.wires.is_empty()
    }
}
