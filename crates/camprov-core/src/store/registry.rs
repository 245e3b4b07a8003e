// ── Device registry ──
//
// Plain keyed collection of cameras in first-seen order. All locking
// lives one level up in `DeviceStore`.

use indexmap::IndexMap;

use crate::model::{Device, DeviceDescriptor, MacAddress};

/// What `upsert` did with a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, Default, Clone)]
pub struct DeviceRegistry {
    devices: IndexMap<MacAddress, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, hardware_id: &MacAddress) -> Option<&Device> {
        self.devices.get(hardware_id)
    }

    pub fn find_mut(&mut self, hardware_id: &MacAddress) -> Option<&mut Device> {
        self.devices.get_mut(hardware_id)
    }

    /// Insert a first sighting, or merge descriptive fields into an
    /// existing record. Workflow fields are never touched here.
    pub fn upsert(&mut self, descriptor: DeviceDescriptor) -> UpsertOutcome {
        if let Some(existing) = self.devices.get_mut(&descriptor.hardware_id) {
            existing.merge_descriptor(descriptor);
            return UpsertOutcome::Updated;
        }
        let key = descriptor.hardware_id.clone();
        self.devices.insert(key, Device::discovered(descriptor));
        UpsertOutcome::Created
    }

    /// Every known device, in the order it was first seen.
    pub fn all(&self) -> impl Iterator<Item = &Device> + '_ {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}
