//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use camprov_config::ConfigError;
use camprov_core::{CoreError, ReserveError};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const UNAVAILABLE: i32 = 7;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Discovery ────────────────────────────────────────────────────
    #[error("Discovery failed: {message}")]
    #[diagnostic(
        code(camprov::discovery),
        help("Check that this host is on the camera segment, then retry the scan.")
    )]
    Discovery { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(camprov::not_found),
        help("Run: camprov scan to see discovered cameras")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
    },

    #[error("Address {address} is already taken")]
    #[diagnostic(
        code(camprov::conflict),
        help("Run: camprov pool to see reserved addresses")
    )]
    AddressTaken { address: String },

    #[error("No free address left in {range}")]
    #[diagnostic(
        code(camprov::pool_exhausted),
        help("Widen pool.start/pool.end or release addresses that are no longer used.")
    )]
    PoolExhausted { range: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(camprov::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Configuration file not found: {path}")]
    #[diagnostic(
        code(camprov::no_config),
        help("Create one with: camprov config init\nOr drop --config to use the defaults.")
    )]
    NoConfig { path: String },

    #[error("Configuration file already exists: {path}")]
    #[diagnostic(code(camprov::config_exists), help("Pass --force to overwrite it."))]
    ConfigExists { path: String },

    #[error(transparent)]
    #[diagnostic(code(camprov::config))]
    Config(Box<figment::Error>),

    // ── Runtime ──────────────────────────────────────────────────────
    #[error("{0}")]
    #[diagnostic(code(camprov::interrupted))]
    Interrupted(String),

    #[error("{message}")]
    #[diagnostic(code(camprov::internal))]
    Internal { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    #[diagnostic(code(camprov::serialize))]
    Serialize(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            Self::AddressTaken { .. } | Self::ConfigExists { .. } | Self::PoolExhausted { .. } => {
                exit_code::CONFLICT
            }
            Self::Validation { .. } | Self::Config(_) => exit_code::USAGE,
            Self::Discovery { .. } => exit_code::UNAVAILABLE,
            Self::Interrupted(_) => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DiscoveryUnavailable { message } => CliError::Discovery { message },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "camera".into(),
                identifier,
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Reservation(ReserveError::AlreadyReserved { address }) => {
                CliError::AddressTaken {
                    address: address.to_string(),
                }
            }

            CoreError::Reservation(e @ ReserveError::OutOfRange { .. }) => CliError::Validation {
                field: "address".into(),
                reason: e.to_string(),
            },

            CoreError::PoolExhausted { range } => CliError::PoolExhausted { range },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            e @ (CoreError::Cancelled { .. } | CoreError::ShutDown) => {
                CliError::Interrupted(e.to_string())
            }

            CoreError::Query(e) => CliError::Internal {
                message: format!("Device query failed: {e}"),
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Missing { path } => CliError::NoConfig {
                path: path.display().to_string(),
            },
            ConfigError::Serialization(e) => CliError::Serialize(e.to_string()),
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
