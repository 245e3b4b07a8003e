//! Configuration for the camprov provisioner.
//!
//! TOML file + `CAMPROV_*` environment layering, validation, and
//! translation to `camprov_core::ProvisionerConfig`. The core never reads
//! files; the binary loads a [`Config`] here and hands the translated
//! settings over.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use camprov_core::{AllocationMode, NetworkPrefix, ProvisionerConfig};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("config file not found: {path}")]
    Missing { path: PathBuf },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// The managed address range.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Reconciliation and dispatch behavior.
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,

    /// Simulated discovery and device behavior.
    #[serde(default)]
    pub simulation: SimulationSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PoolSettings {
    /// First three octets of the managed network (e.g., "192.168.1").
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// First host octet handed out.
    #[serde(default = "default_start")]
    pub start: u8,

    /// Last host octet handed out.
    #[serde(default = "default_end")]
    pub end: u8,

    /// Addresses already in use (gateways, cameras from earlier runs).
    #[serde(default)]
    pub reserved: Vec<String>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            start: default_start(),
            end: default_end(),
            reserved: Vec::new(),
        }
    }
}

fn default_prefix() -> String {
    "192.168.1".into()
}
fn default_start() -> u8 {
    10
}
fn default_end() -> u8 {
    99
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrchestratorSettings {
    /// "automatic" or "manual".
    #[serde(default = "default_mode")]
    pub mode: String,

    /// Seconds between reconciliation cycles.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Configuration attempts allowed to run at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Give up on a single apply call after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_timeout_secs: Option<u64>,

    /// Probe the new address after a successful apply.
    #[serde(default)]
    pub verify_after_apply: bool,

    /// Configure every eligible camera after each cycle.
    #[serde(default)]
    pub auto_configure: bool,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            interval_secs: default_interval(),
            max_concurrent: default_max_concurrent(),
            apply_timeout_secs: None,
            verify_after_apply: false,
            auto_configure: false,
        }
    }
}

fn default_mode() -> String {
    "automatic".into()
}
fn default_interval() -> u64 {
    10
}
fn default_max_concurrent() -> usize {
    1
}

/// Knobs for the simulated collaborators the binary ships with.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Number of cameras on the simulated segment.
    #[serde(default = "default_fleet_size")]
    pub fleet_size: usize,

    /// Chance that a camera answers a given scan.
    #[serde(default = "default_visibility")]
    pub visibility: f64,

    #[serde(default = "default_discovery_latency")]
    pub discovery_latency_ms: u64,

    #[serde(default = "default_apply_latency")]
    pub apply_latency_ms: u64,

    #[serde(default)]
    pub discovery_failure_rate: f64,

    #[serde(default = "default_apply_failure_rate")]
    pub apply_failure_rate: f64,

    #[serde(default = "default_query_failure_rate")]
    pub query_failure_rate: f64,

    #[serde(default = "default_unreachable_rate")]
    pub unreachable_rate: f64,

    /// Fixed RNG seed for reproducible runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            fleet_size: default_fleet_size(),
            visibility: default_visibility(),
            discovery_latency_ms: default_discovery_latency(),
            apply_latency_ms: default_apply_latency(),
            discovery_failure_rate: 0.0,
            apply_failure_rate: default_apply_failure_rate(),
            query_failure_rate: default_query_failure_rate(),
            unreachable_rate: default_unreachable_rate(),
            seed: None,
        }
    }
}

fn default_fleet_size() -> usize {
    5
}
fn default_visibility() -> f64 {
    0.9
}
fn default_discovery_latency() -> u64 {
    1000
}
fn default_apply_latency() -> u64 {
    2000
}
fn default_apply_failure_rate() -> f64 {
    0.15
}
fn default_query_failure_rate() -> f64 {
    0.10
}
fn default_unreachable_rate() -> f64 {
    0.05
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// Write daily-rolling log files here in addition to stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Emit JSON lines on stderr instead of human-readable logs.
    #[serde(default)]
    pub json: bool,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "camprov", "camprov").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("camprov");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// The layered provider stack: defaults, then the TOML file, then
/// `CAMPROV_*` environment variables (`__` separates nested keys, e.g.
/// `CAMPROV_POOL__START=20`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CAMPROV_").split("__"))
}

/// Load the full Config. An explicit `path` must exist; the default
/// location is optional.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let resolved = match path {
        Some(explicit) => {
            if !explicit.exists() {
                return Err(ConfigError::Missing {
                    path: explicit.to_path_buf(),
                });
            }
            explicit.to_path_buf()
        }
        None => config_path(),
    };
    from_figment(&figment(&resolved))
}

/// Extract and validate a Config from any provider stack.
pub fn from_figment(figment: &Figment) -> Result<Config, ConfigError> {
    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Validation & translation ────────────────────────────────────────

impl Config {
    /// Check every field that `to_provisioner_config` and the simulation
    /// rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_provisioner_config()?;

        let sim = &self.simulation;
        for (field, rate) in [
            ("simulation.visibility", sim.visibility),
            ("simulation.discovery_failure_rate", sim.discovery_failure_rate),
            ("simulation.apply_failure_rate", sim.apply_failure_rate),
            ("simulation.query_failure_rate", sim.query_failure_rate),
            ("simulation.unreachable_rate", sim.unreachable_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(field, format!("expected a probability in [0, 1], got {rate}")));
            }
        }
        Ok(())
    }

    pub fn allocation_mode(&self) -> Result<AllocationMode, ConfigError> {
        AllocationMode::from_str(&self.orchestrator.mode).map_err(|_| {
            invalid(
                "orchestrator.mode",
                format!("expected 'automatic' or 'manual', got '{}'", self.orchestrator.mode),
            )
        })
    }

    /// Build the core's runtime configuration.
    pub fn to_provisioner_config(&self) -> Result<ProvisionerConfig, ConfigError> {
        let pool = &self.pool;
        let orch = &self.orchestrator;

        let network_prefix = NetworkPrefix::from_str(&pool.prefix)
            .map_err(|e| invalid("pool.prefix", e.to_string()))?;

        if pool.start > pool.end {
            return Err(invalid(
                "pool.start",
                format!("start {} is greater than end {}", pool.start, pool.end),
            ));
        }

        let reserved_addresses = pool
            .reserved
            .iter()
            .map(|raw| {
                raw.trim()
                    .parse::<Ipv4Addr>()
                    .map_err(|_| invalid("pool.reserved", format!("'{raw}' is not an IPv4 address")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if orch.interval_secs == 0 {
            return Err(invalid("orchestrator.interval_secs", "must be at least 1"));
        }
        if orch.max_concurrent == 0 {
            return Err(invalid("orchestrator.max_concurrent", "must be at least 1"));
        }
        if orch.apply_timeout_secs == Some(0) {
            return Err(invalid("orchestrator.apply_timeout_secs", "must be at least 1"));
        }

        let config = ProvisionerConfig {
            network_prefix,
            host_start: pool.start,
            host_end: pool.end,
            reserved_addresses,
            reconcile_interval: Duration::from_secs(orch.interval_secs),
            max_concurrent_configurations: orch.max_concurrent,
            allocation_mode: self.allocation_mode()?,
            apply_timeout: orch.apply_timeout_secs.map(Duration::from_secs),
            verify_after_apply: orch.verify_after_apply,
            auto_configure: orch.auto_configure,
        };
        config
            .validate()
            .map_err(|e| invalid("pool.reserved", e.to_string()))?;
        Ok(config)
    }
}
