// ── Runtime provisioning configuration ──
//
// These types describe *what* the orchestrator manages: the address range,
// the reconciliation cadence and the dispatch bound. They never touch
// disk. The CLI builds a `ProvisionerConfig` (usually via camprov-config)
// and hands it in.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::CoreError;

/// Whether newly discovered devices get an address from the pool straight away.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum AllocationMode {
    /// New devices are assigned the next free pool address on discovery.
    #[default]
    Automatic,
    /// New devices wait for an operator to assign an address.
    Manual,
}

/// The three leading octets shared by every address in the pool (`192.168.1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkPrefix([u8; 3]);

impl NetworkPrefix {
    pub const fn new(a: u8, b: u8, c: u8) -> Self {
        Self([a, b, c])
    }

    /// Full address for a host octet under this prefix.
    pub fn host(&self, octet: u8) -> Ipv4Addr {
        let [a, b, c] = self.0;
        Ipv4Addr::new(a, b, c, octet)
    }

    /// The host octet of `address`, if it lies under this prefix.
    pub fn host_octet(&self, address: Ipv4Addr) -> Option<u8> {
        let [a, b, c, d] = address.octets();
        (self.0 == [a, b, c]).then_some(d)
    }
}

impl Default for NetworkPrefix {
    fn default() -> Self {
        Self::new(192, 168, 1)
    }
}

impl fmt::Display for NetworkPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "{a}.{b}.{c}")
    }
}

impl FromStr for NetworkPrefix {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::Config {
            message: format!("invalid network prefix '{s}': expected three octets like 192.168.1"),
        };

        let octets = s
            .trim()
            .trim_end_matches('.')
            .split('.')
            .map(|part| part.parse::<u8>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        match octets.as_slice() {
            [a, b, c] => Ok(Self::new(*a, *b, *c)),
            _ => Err(invalid()),
        }
    }
}

impl Serialize for NetworkPrefix {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NetworkPrefix {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Configuration for a single provisioning orchestrator.
///
/// Built by the CLI, passed to `Orchestrator` -- core never reads config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionerConfig {
    /// Network the pool hands out addresses from.
    pub network_prefix: NetworkPrefix,
    /// First host octet in the pool (inclusive).
    pub host_start: u8,
    /// Last host octet in the pool (inclusive).
    pub host_end: u8,
    /// Addresses reserved before the first allocation (infrastructure,
    /// cameras provisioned by a previous run).
    pub reserved_addresses: Vec<Ipv4Addr>,
    /// How often the background task reconciles discovery results.
    pub reconcile_interval: Duration,
    /// Upper bound on configuration attempts running at the same time.
    pub max_concurrent_configurations: usize,
    pub allocation_mode: AllocationMode,
    /// Give up on a single apply call after this long. `None` = wait forever.
    pub apply_timeout: Option<Duration>,
    /// Probe the new address after a successful apply before marking the
    /// device configured.
    pub verify_after_apply: bool,
    /// Dispatch every eligible device after each timer-driven cycle.
    pub auto_configure: bool,
}

impl ProvisionerConfig {
    /// Check internal consistency. Called by `Orchestrator::new`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.host_start > self.host_end {
            return Err(CoreError::Config {
                message: format!(
                    "host range start {} is greater than end {}",
                    self.host_start, self.host_end
                ),
            });
        }
        if self.reconcile_interval.is_zero() {
            return Err(CoreError::Config {
                message: "reconcile interval must be greater than zero".into(),
            });
        }
        if self.max_concurrent_configurations == 0 {
            return Err(CoreError::Config {
                message: "max concurrent configurations must be at least 1".into(),
            });
        }
        let range = self.host_start..=self.host_end;
        for &address in &self.reserved_addresses {
            let in_range = self
                .network_prefix
                .host_octet(address)
                .is_some_and(|octet| range.contains(&octet));
            if !in_range {
                return Err(CoreError::Config {
                    message: format!(
                        "reserved address {address} is outside {}.{}-{}",
                        self.network_prefix, self.host_start, self.host_end
                    ),
                });
            }
        }
        Ok(())
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            network_prefix: NetworkPrefix::default(),
            host_start: 10,
            host_end: 99,
            reserved_addresses: Vec::new(),
            reconcile_interval: Duration::from_secs(10),
            max_concurrent_configurations: 1,
            allocation_mode: AllocationMode::Automatic,
            apply_timeout: None,
            verify_after_apply: false,
            auto_configure: false,
        }
    }
}
