// ── Provisioning events ──
//
// Broadcast by the orchestrator as things happen. Consumers that only
// care about current state should watch the device snapshot instead.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use super::hardware_id::MacAddress;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProvisioningEvent {
    DeviceDiscovered {
        hardware_id: MacAddress,
    },
    AddressAssigned {
        hardware_id: MacAddress,
        address: Ipv4Addr,
    },
    AddressReleased {
        hardware_id: MacAddress,
        address: Ipv4Addr,
    },
    /// Automatic mode found no free address for a new device.
    PoolExhausted {
        hardware_id: MacAddress,
    },
    ConfigurationStarted {
        hardware_id: MacAddress,
        address: Ipv4Addr,
        attempt: u32,
    },
    Configured {
        hardware_id: MacAddress,
        address: Ipv4Addr,
    },
    ConfigurationFailed {
        hardware_id: MacAddress,
        message: String,
    },
    CycleCompleted {
        device_count: usize,
        new_devices: usize,
        at: DateTime<Utc>,
    },
    CycleFailed {
        message: String,
        at: DateTime<Utc>,
    },
}

impl ProvisioningEvent {
    /// The device this event concerns, if any.
    pub fn hardware_id(&self) -> Option<&MacAddress> {
        match self {
            Self::DeviceDiscovered { hardware_id }
            | Self::AddressAssigned { hardware_id, .. }
            | Self::AddressReleased { hardware_id, .. }
            | Self::PoolExhausted { hardware_id }
            | Self::ConfigurationStarted { hardware_id, .. }
            | Self::Configured { hardware_id, .. }
            | Self::ConfigurationFailed { hardware_id, .. } => Some(hardware_id),
            Self::CycleCompleted { .. } | Self::CycleFailed { .. } => None,
        }
    }
}
