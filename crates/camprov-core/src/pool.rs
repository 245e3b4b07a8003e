// ── Address pool ──
//
// Hands out host addresses from one contiguous range under a fixed /24
// prefix. The pool itself is plain data with `&mut self` mutators; the
// orchestrator owns it behind a single lock, so `allocate_and_reserve`
// is atomic for every caller that goes through the orchestrator.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{NetworkPrefix, ProvisionerConfig};
use crate::error::CoreError;

/// Why an address could not be reserved.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReserveError {
    #[error("address {address} is not in the managed range {range}")]
    OutOfRange { address: String, range: String },

    #[error("address {address} is already reserved")]
    AlreadyReserved { address: Ipv4Addr },
}

/// Result of the atomic find-and-reserve primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Allocation {
    Allocated(Ipv4Addr),
    Exhausted,
}

impl Allocation {
    pub fn address(self) -> Option<Ipv4Addr> {
        match self {
            Self::Allocated(address) => Some(address),
            Self::Exhausted => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddressPool {
    prefix: NetworkPrefix,
    start: u8,
    end: u8,
    reserved: BTreeSet<Ipv4Addr>,
    /// Next host octet to probe. Always within `start..=end`.
    cursor: u8,
}

impl AddressPool {
    pub fn new(prefix: NetworkPrefix, start: u8, end: u8) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::Config {
                message: format!("host range start {start} is greater than end {end}"),
            });
        }
        debug!(range = %format_range(prefix, start, end), "address pool initialized");
        Ok(Self {
            prefix,
            start,
            end,
            reserved: BTreeSet::new(),
            cursor: start,
        })
    }

    /// Build the pool described by `config`, with its pre-reserved addresses
    /// already taken.
    pub fn from_config(config: &ProvisionerConfig) -> Result<Self, CoreError> {
        let mut pool = Self::new(config.network_prefix, config.host_start, config.host_end)?;
        for &address in &config.reserved_addresses {
            match pool.reserve(address) {
                Ok(()) | Err(ReserveError::AlreadyReserved { .. }) => {}
                Err(err @ ReserveError::OutOfRange { .. }) => {
                    return Err(CoreError::Config {
                        message: format!("reserved_addresses: {err}"),
                    });
                }
            }
        }
        Ok(pool)
    }

    pub fn prefix(&self) -> NetworkPrefix {
        self.prefix
    }

    pub fn range(&self) -> (Ipv4Addr, Ipv4Addr) {
        (self.prefix.host(self.start), self.prefix.host(self.end))
    }

    /// Human-readable range, e.g. `192.168.1.10-99`.
    pub fn range_label(&self) -> String {
        format_range(self.prefix, self.start, self.end)
    }

    /// Number of addresses the pool manages.
    pub fn capacity(&self) -> usize {
        usize::from(self.end - self.start) + 1
    }

    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    /// Whether `address` lies under the prefix and inside `[start, end]`.
    pub fn contains(&self, address: Ipv4Addr) -> bool {
        self.prefix
            .host_octet(address)
            .is_some_and(|octet| (self.start..=self.end).contains(&octet))
    }

    /// Scan at most one full sweep from the cursor for an unreserved
    /// address. Moves the cursor past the candidate but does not reserve it.
    pub fn allocate_next(&mut self) -> Option<Ipv4Addr> {
        for _ in 0..self.capacity() {
            let candidate = self.prefix.host(self.cursor);
            self.cursor = self.following(self.cursor);
            if !self.reserved.contains(&candidate) {
                debug!(address = %candidate, "next available address");
                return Some(candidate);
            }
        }
        warn!(range = %self.range_label(), "no available addresses in the configured range");
        None
    }

    /// Find a free address and reserve it in one step.
    pub fn allocate_and_reserve(&mut self) -> Allocation {
        match self.allocate_next() {
            Some(address) => {
                self.reserved.insert(address);
                debug!(address = %address, "allocated and reserved address");
                Allocation::Allocated(address)
            }
            None => Allocation::Exhausted,
        }
    }

    pub fn reserve(&mut self, address: Ipv4Addr) -> Result<(), ReserveError> {
        if !self.contains(address) {
            warn!(address = %address, "address is not in the managed range");
            return Err(ReserveError::OutOfRange {
                address: address.to_string(),
                range: self.range_label(),
            });
        }
        if !self.reserved.insert(address) {
            warn!(address = %address, "address is already reserved");
            return Err(ReserveError::AlreadyReserved { address });
        }
        debug!(address = %address, "reserved address");
        Ok(())
    }

    /// Reserve an address given as text. Anything that is not a dotted
    /// four-octet address inside the range is `OutOfRange`.
    pub fn reserve_str(&mut self, raw: &str) -> Result<Ipv4Addr, ReserveError> {
        let address = self.parse_address(raw)?;
        self.reserve(address)?;
        Ok(address)
    }

    /// Parse `raw` and check it against the managed range.
    pub fn parse_address(&self, raw: &str) -> Result<Ipv4Addr, ReserveError> {
        raw.trim()
            .parse::<Ipv4Addr>()
            .ok()
            .filter(|address| self.contains(*address))
            .ok_or_else(|| ReserveError::OutOfRange {
                address: raw.to_owned(),
                range: self.range_label(),
            })
    }

    /// Returns whether the address was reserved. Releasing a free address is a no-op.
    pub fn release(&mut self, address: Ipv4Addr) -> bool {
        let removed = self.reserved.remove(&address);
        if removed {
            debug!(address = %address, "released address");
        } else {
            debug!(address = %address, "release of an address that was not reserved");
        }
        removed
    }

    pub fn is_available(&self, address: Ipv4Addr) -> bool {
        self.contains(address) && !self.reserved.contains(&address)
    }

    pub fn list_reserved(&self) -> BTreeSet<Ipv4Addr> {
        self.reserved.clone()
    }

    fn following(&self, octet: u8) -> u8 {
        if octet >= self.end { self.start } else { octet + 1 }
    }
}

fn format_range(prefix: NetworkPrefix, start: u8, end: u8) -> String {
    format!("{prefix}.{start}-{end}")
}
