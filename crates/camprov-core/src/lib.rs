//! Provisioning core for network cameras.
//!
//! This crate owns the domain model and the control loop that takes a
//! freshly unboxed camera from "seen on the wire" to "answering on its
//! assigned address":
//!
//! - **[`Orchestrator`]**: Central facade. [`start()`](Orchestrator::start)
//!   runs a reconciliation cycle and spawns the periodic timer;
//!   [`configure()`](Orchestrator::configure) and
//!   [`configure_pending()`](Orchestrator::configure_pending) drive devices
//!   through the configuration state machine with bounded concurrency.
//!
//! - **[`AddressPool`]**: Round-robin allocator over one host range with
//!   exclusive reservations.
//!
//! - **[`DeviceStore`]**: The device registry behind an async lock,
//!   publishing a `watch` snapshot on every committed write. Consumers
//!   subscribe through [`DeviceStream`].
//!
//! - **Collaborators** ([`collaborator`]): [`DiscoverySource`] and
//!   [`DeviceClient`] are the only ways the core touches the network.
//!   Implementations live with the caller.
//!
//! - **Domain model** ([`model`]): [`Device`], its [`DeviceState`] machine,
//!   [`MacAddress`] normalization and [`ProvisioningEvent`]s.

pub mod collaborator;
pub mod config;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use collaborator::{ApplyError, DeviceClient, DiscoveryError, DiscoverySource, QueryError};
pub use config::{AllocationMode, NetworkPrefix, ProvisionerConfig};
pub use error::CoreError;
pub use orchestrator::{ConfigurationOutcome, CycleReport, Orchestrator, PoolStatus, RunState};
pub use pool::{AddressPool, Allocation, ReserveError};
pub use store::{DeviceRegistry, DeviceStore, UpsertOutcome};
pub use stream::{DeviceStream, DeviceWatchStream};

pub use model::{
    Device, DeviceDescriptor, DeviceState, DispatchBlocker, MacAddress, ProvisioningEvent,
};
