// ── Domain model ──

mod device;
mod event;
mod hardware_id;

pub use device::{Device, DeviceDescriptor, DeviceState, DispatchBlocker};
pub use event::ProvisioningEvent;
pub use hardware_id::MacAddress;
