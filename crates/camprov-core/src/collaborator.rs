// ── External collaborator boundaries ──
//
// The orchestrator never scans the network or speaks VAPIX itself. It
// consumes these two capabilities, which the binary wires to real or
// simulated implementations. Implementations must be cheap to share
// (`Arc<dyn ...>`) and must tolerate their futures being dropped when an
// operation is cancelled.

use std::net::{IpAddr, Ipv4Addr};

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{DeviceDescriptor, MacAddress};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("network scan failed: {0}")]
    ScanFailed(String),

    #[error("discovery timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Outcome of an apply call that did not succeed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApplyError {
    /// The device answered and refused the new configuration.
    #[error("device rejected configuration: {message}")]
    Rejected { message: String },

    /// Transport failure or anything else the client did not expect.
    #[error("device client fault: {message}")]
    Fault { message: String },
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("device at {address} is unreachable")]
    Unreachable { address: IpAddr },

    #[error("unexpected response from {address}: {message}")]
    InvalidResponse { address: IpAddr, message: String },
}

/// Produces the devices currently visible on the segment.
#[async_trait]
pub trait DiscoverySource: Send + Sync {
    async fn discover(&self) -> Result<Vec<DeviceDescriptor>, DiscoveryError>;
}

/// Talks to an individual camera.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Push a new network configuration so the device moves to `target`.
    async fn apply(&self, hardware_id: &MacAddress, target: Ipv4Addr) -> Result<(), ApplyError>;

    /// Read identity and firmware information from the device at `address`.
    async fn get_info(&self, address: IpAddr) -> Result<DeviceDescriptor, QueryError>;

    async fn test_reachable(&self, address: IpAddr) -> bool;
}
