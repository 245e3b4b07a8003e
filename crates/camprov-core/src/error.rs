// ── Core error types ──
//
// Operation-level errors surfaced to the CLI. Collaborator failures during
// a configuration attempt never show up here: they become a Failed device
// state instead. What remains are rejected commands, cycle-level discovery
// failures, and configuration mistakes.

use thiserror::Error;

use crate::collaborator::{DiscoveryError, QueryError};
use crate::pool::ReserveError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Reconciliation ───────────────────────────────────────────────
    #[error("Discovery source unavailable: {message}")]
    DiscoveryUnavailable { message: String },

    // ── Registry lookups ─────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    // ── Operator commands ────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error(transparent)]
    Reservation(#[from] ReserveError),

    #[error("No free address left in {range}")]
    PoolExhausted { range: String },

    #[error("Device query failed: {0}")]
    Query(#[from] QueryError),

    #[error("{operation} was cancelled")]
    Cancelled { operation: String },

    #[error("Orchestrator has been shut down")]
    ShutDown,

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl From<DiscoveryError> for CoreError {
    fn from(err: DiscoveryError) -> Self {
        CoreError::DiscoveryUnavailable {
            message: err.to_string(),
        }
    }
}
