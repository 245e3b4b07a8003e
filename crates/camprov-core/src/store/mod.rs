// ── Device storage ──
//
// `DeviceRegistry` is the plain keyed collection; `DeviceStore` shares it
// between the reconciliation task and dispatch tasks and publishes
// snapshots to watchers.

mod device_store;
mod registry;

pub use device_store::{DeviceStore, StoreWriteGuard};
pub use registry::{DeviceRegistry, UpsertOutcome};
