//! Signal registry and segment builder.
//!
//! The registry is the coordinator-side index from qualified signal name
//! to slot. It is built once from configuration - modules' declared
//! signals concatenated in configured module order, declaration order
//! within a module - and is read-only afterwards. That slot order is an
//! ABI: coordinator and module processes both derive it from the same
//! configuration.

use std::collections::HashMap;

use hermes_common::config::HermesConfig;
use hermes_common::signal::{validate_qualified_name, SignalDescriptor, SignalFlags};

use crate::error::{BackplaneError, BackplaneResult};

/// Ordered, validated signal index.
#[derive(Debug, Clone)]
pub struct SignalRegistry {
    slots: Vec<SignalDescriptor>,
    by_name: HashMap<String, usize>,
}

impl SignalRegistry {
    /// Build a registry from an explicit descriptor list.
    ///
    /// Validates every name and rejects duplicates. Slot indices follow
    /// list order.
    pub fn new(descriptors: Vec<SignalDescriptor>) -> BackplaneResult<Self> {
        let mut by_name = HashMap::with_capacity(descriptors.len());
        for (slot, desc) in descriptors.iter().enumerate() {
            validate_qualified_name(&desc.name).map_err(|reason| {
                BackplaneError::InvalidSignalName {
                    name: desc.name.clone(),
                    reason,
                }
            })?;
            if by_name.insert(desc.name.clone(), slot).is_some() {
                return Err(BackplaneError::DuplicateSignal {
                    name: desc.name.clone(),
                });
            }
        }
        Ok(Self {
            slots: descriptors,
            by_name,
        })
    }

    /// Materialize the registry from configuration.
    ///
    /// Flattens every module's declared signals in module declaration
    /// order, preserving per-module declaration order.
    pub fn from_config(config: &HermesConfig) -> BackplaneResult<Self> {
        let mut descriptors = Vec::with_capacity(config.signal_count());
        for (module_name, module) in config.modules.iter() {
            for sig in &module.signals {
                let mut flags = SignalFlags::empty();
                if sig.writable {
                    flags |= SignalFlags::WRITABLE;
                }
                if sig.published {
                    flags |= SignalFlags::PUBLISHED;
                }
                let mut desc =
                    SignalDescriptor::new(module_name, &sig.name, sig.data_type, flags);
                desc.unit = sig.unit.clone();
                descriptors.push(desc);
            }
        }
        Self::new(descriptors)
    }

    /// Slot index of a qualified name.
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Whether a qualified name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Descriptor at a slot index.
    pub fn descriptor(&self, slot: usize) -> Option<&SignalDescriptor> {
        self.slots.get(slot)
    }

    /// Look up a descriptor by qualified name.
    pub fn get(&self, name: &str) -> Option<&SignalDescriptor> {
        self.slot_of(name).and_then(|slot| self.descriptor(slot))
    }

    /// Ordered descriptor list, as fed into segment creation.
    pub fn descriptors(&self) -> &[SignalDescriptor] {
        &self.slots
    }

    /// Iterate `(slot, descriptor)` pairs in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &SignalDescriptor)> {
        self.slots.iter().enumerate()
    }

    /// Number of registered signals.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_common::signal::SignalType;

    fn descriptor(name: &str) -> SignalDescriptor {
        let (module, local) = name.split_once('.').unwrap();
        SignalDescriptor::new(module, local, SignalType::F64, SignalFlags::empty())
    }

    #[test]
    fn slots_follow_list_order() {
        let registry =
            SignalRegistry::new(vec![descriptor("a.x"), descriptor("a.y"), descriptor("b.z")])
                .unwrap();
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.slot_of("a.x"), Some(0));
        assert_eq!(registry.slot_of("a.y"), Some(1));
        assert_eq!(registry.slot_of("b.z"), Some(2));
        assert_eq!(registry.slot_of("b.missing"), None);
    }

    #[test]
    fn duplicate_names_rejected() {
        let result = SignalRegistry::new(vec![descriptor("a.x"), descriptor("a.x")]);
        assert!(matches!(
            result,
            Err(BackplaneError::DuplicateSignal { .. })
        ));
    }

    #[test]
    fn invalid_names_rejected() {
        let mut bad = descriptor("a.x");
        bad.name = "no dot".to_string();
        let result = SignalRegistry::new(vec![bad]);
        assert!(matches!(
            result,
            Err(BackplaneError::InvalidSignalName { .. })
        ));
    }

    #[test]
    fn uniqueness_invariant() {
        let registry =
            SignalRegistry::new(vec![descriptor("a.x"), descriptor("a.y"), descriptor("b.z")])
                .unwrap();
        let unique: std::collections::HashSet<_> =
            registry.descriptors().iter().map(|d| &d.name).collect();
        assert_eq!(unique.len(), registry.len());
    }
}
