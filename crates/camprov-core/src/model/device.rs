// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use strum::{Display, EnumString};

use super::hardware_id::MacAddress;

/// Provisioning state of a single camera.
///
/// `Configured` and `Failed` are only ever reached from `Configuring`.
/// `Skipped` is operator-only; reconciliation never sets it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DeviceState {
    Discovered,
    Configuring,
    Configured,
    Failed,
    Skipped,
}

impl DeviceState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Configuring)
    }

    /// States from which a configuration attempt may be started.
    pub fn accepts_dispatch(&self) -> bool {
        matches!(self, Self::Discovered | Self::Configured | Self::Failed)
    }
}

/// A single sighting of a device, as produced by a discovery source or a
/// device info query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub hardware_id: MacAddress,
    pub current_address: Option<IpAddr>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl DeviceDescriptor {
    /// A bare sighting with only the hardware id, observed now.
    pub fn new(hardware_id: impl Into<MacAddress>) -> Self {
        Self {
            hardware_id: hardware_id.into(),
            current_address: None,
            model: None,
            firmware_version: None,
            observed_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: impl Into<IpAddr>) -> Self {
        self.current_address = Some(address.into());
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_firmware(mut self, firmware_version: impl Into<String>) -> Self {
        self.firmware_version = Some(firmware_version.into());
        self
    }
}

/// Why a device cannot be handed to the device client right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchBlocker {
    NoPendingAddress,
    AlreadyConfiguring,
    Skipped,
}

impl fmt::Display for DispatchBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoPendingAddress => write!(f, "no new address has been assigned"),
            Self::AlreadyConfiguring => write!(f, "a configuration attempt is already in progress"),
            Self::Skipped => write!(f, "device is excluded from provisioning"),
        }
    }
}

/// The canonical camera record held by the registry.
///
/// Descriptive fields (`current_address`, `model`, `firmware_version`) are
/// owned by discovery. Workflow fields (`state`, `pending_address`,
/// `error_message`, `attempt_count`) are owned by the orchestrator and are
/// never written by reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub hardware_id: MacAddress,
    pub current_address: Option<IpAddr>,
    pub pending_address: Option<Ipv4Addr>,
    pub state: DeviceState,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub last_updated: DateTime<Utc>,
    pub error_message: Option<String>,
    pub attempt_count: u32,
}

impl Device {
    /// First sighting of a device.
    pub fn discovered(descriptor: DeviceDescriptor) -> Self {
        Self {
            hardware_id: descriptor.hardware_id,
            current_address: descriptor.current_address,
            pending_address: None,
            state: DeviceState::Discovered,
            model: descriptor.model,
            firmware_version: descriptor.firmware_version,
            last_updated: descriptor.observed_at,
            error_message: None,
            attempt_count: 0,
        }
    }

    /// Merge a later sighting. Only descriptive fields change.
    pub fn merge_descriptor(&mut self, descriptor: DeviceDescriptor) {
        self.current_address = descriptor.current_address;
        self.model = descriptor.model;
        self.firmware_version = descriptor.firmware_version;
        self.last_updated = descriptor.observed_at;
    }

    pub fn dispatch_blocker(&self) -> Option<DispatchBlocker> {
        match self.state {
            DeviceState::Configuring => Some(DispatchBlocker::AlreadyConfiguring),
            DeviceState::Skipped => Some(DispatchBlocker::Skipped),
            _ if self.pending_address.is_none() => Some(DispatchBlocker::NoPendingAddress),
            _ => None,
        }
    }

    /// Enter `Configuring` for a new attempt. Returns the address being applied.
    pub(crate) fn begin_attempt(&mut self) -> Result<Ipv4Addr, DispatchBlocker> {
        if let Some(blocker) = self.dispatch_blocker() {
            return Err(blocker);
        }
        let Some(target) = self.pending_address else {
            return Err(DispatchBlocker::NoPendingAddress);
        };
        self.state = DeviceState::Configuring;
        self.attempt_count = self.attempt_count.saturating_add(1);
        self.error_message = None;
        self.touch();
        Ok(target)
    }

    /// The pending address is now live on the device.
    pub(crate) fn complete_success(&mut self) {
        debug_assert_eq!(self.state, DeviceState::Configuring);
        if let Some(applied) = self.pending_address.take() {
            self.current_address = Some(IpAddr::V4(applied));
        }
        self.state = DeviceState::Configured;
        self.error_message = None;
        self.touch();
    }

    pub(crate) fn complete_failure(&mut self, message: impl Into<String>) {
        debug_assert_eq!(self.state, DeviceState::Configuring);
        self.state = DeviceState::Failed;
        self.error_message = Some(message.into());
        self.touch();
    }

    /// Replace the pending assignment, returning the address it displaced.
    pub(crate) fn set_pending(&mut self, address: Option<Ipv4Addr>) -> Option<Ipv4Addr> {
        let previous = std::mem::replace(&mut self.pending_address, address);
        self.touch();
        previous
    }

    pub(crate) fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn camera() -> Device {
        Device::discovered(
            DeviceDescriptor::new("AC:CC:8E:10:20:30")
                .with_address(Ipv4Addr::new(192, 168, 1, 150))
                .with_model("AXIS P1448-LE")
                .with_firmware("9.80.1"),
        )
    }

    #[test]
    fn first_sighting_starts_discovered() {
        let device = camera();
        assert_eq!(device.state, DeviceState::Discovered);
        assert_eq!(device.attempt_count, 0);
        assert!(device.pending_address.is_none());
        assert!(device.error_message.is_none());
    }

    #[test]
    fn merge_leaves_workflow_fields_alone() {
        let mut device = camera();
        device.pending_address = Some(Ipv4Addr::new(192, 168, 1, 10));
        device.state = DeviceState::Failed;
        device.error_message = Some("Configuration failed".into());
        device.attempt_count = 2;

        device.merge_descriptor(
            DeviceDescriptor::new("AC:CC:8E:10:20:30")
                .with_address(Ipv4Addr::new(192, 168, 1, 151))
                .with_model("AXIS Q1656"),
        );

        assert_eq!(
            device.current_address,
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 151)))
        );
        assert_eq!(device.model.as_deref(), Some("AXIS Q1656"));
        assert_eq!(device.state, DeviceState::Failed);
        assert_eq!(device.pending_address, Some(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(device.error_message.as_deref(), Some("Configuration failed"));
        assert_eq!(device.attempt_count, 2);
    }

    #[test]
    fn attempt_requires_pending_address() {
        let mut device = camera();
        assert_eq!(device.begin_attempt(), Err(DispatchBlocker::NoPendingAddress));
        assert_eq!(device.state, DeviceState::Discovered);
        assert_eq!(device.attempt_count, 0);
    }

    #[test]
    fn attempt_cannot_start_twice() {
        let mut device = camera();
        device.pending_address = Some(Ipv4Addr::new(192, 168, 1, 10));
        device.begin_attempt().unwrap();
        assert_eq!(device.begin_attempt(), Err(DispatchBlocker::AlreadyConfiguring));
        assert_eq!(device.attempt_count, 1);
    }

    #[test]
    fn success_promotes_pending_address() {
        let mut device = camera();
        device.pending_address = Some(Ipv4Addr::new(192, 168, 1, 10));
        let target = device.begin_attempt().unwrap();
        assert_eq!(target, Ipv4Addr::new(192, 168, 1, 10));

        device.complete_success();
        assert_eq!(device.state, DeviceState::Configured);
        assert_eq!(
            device.current_address,
            Some(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)))
        );
        assert!(device.pending_address.is_none());
    }

    #[test]
    fn failure_keeps_current_address() {
        let mut device = camera();
        let before = device.current_address;
        device.pending_address = Some(Ipv4Addr::new(192, 168, 1, 10));
        device.begin_attempt().unwrap();

        device.complete_failure("Configuration failed");
        assert_eq!(device.state, DeviceState::Failed);
        assert_eq!(device.current_address, before);
        assert_eq!(device.error_message.as_deref(), Some("Configuration failed"));

        // Retry goes back through Configuring and clears the old error.
        device.begin_attempt().unwrap();
        assert_eq!(device.state, DeviceState::Configuring);
        assert!(device.error_message.is_none());
        assert_eq!(device.attempt_count, 2);
    }

    #[test]
    fn skipped_device_is_not_dispatchable() {
        let mut device = camera();
        device.pending_address = Some(Ipv4Addr::new(192, 168, 1, 10));
        device.state = DeviceState::Skipped;
        assert_eq!(device.dispatch_blocker(), Some(DispatchBlocker::Skipped));
    }

    #[test]
    fn state_round_trips_through_strings() {
        assert_eq!(DeviceState::Configuring.to_string(), "configuring");
        assert_eq!("Failed".parse::<DeviceState>().unwrap(), DeviceState::Failed);
    }
}
