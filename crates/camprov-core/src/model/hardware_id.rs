// ── Hardware identity ──
//
// MacAddress is the registry key for every camera. Discovery sources and
// operators spell MACs differently, so everything funnels through one
// normalized form before it touches the registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated, dash-separated, or bare 12-digit hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let lowered = raw.as_ref().trim().to_lowercase().replace('-', ":");
        let is_bare_hex = lowered.len() == 12 && lowered.chars().all(|c| c.is_ascii_hexdigit());
        if is_bare_hex {
            let octets: Vec<&str> = (0..6).map(|i| &lowered[i * 2..i * 2 + 2]).collect();
            return Self(octets.join(":"));
        }
        Self(lowered)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<String> for MacAddress {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for MacAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<MacAddress> for String {
    fn from(mac: MacAddress) -> Self {
        mac.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mac_address_normalizes_dashes() {
        let mac = MacAddress::new("AA-BB-CC-00-11-22");
        assert_eq!(mac.as_str(), "aa:bb:cc:00:11:22");
    }

    #[test]
    fn mac_address_normalizes_case() {
        let mac = MacAddress::new("AA:BB:CC:00:11:22");
        assert_eq!(mac.as_str(), "aa:bb:cc:00:11:22");
    }

    #[test]
    fn mac_address_expands_bare_hex() {
        let mac = MacAddress::new("ACCC8E0A0B0C");
        assert_eq!(mac.as_str(), "ac:cc:8e:0a:0b:0c");
    }

    #[test]
    fn differently_spelled_macs_are_equal() {
        assert_eq!(
            MacAddress::new("AA-BB-CC-00-11-22"),
            MacAddress::new(" aa:bb:cc:00:11:22 ")
        );
    }

    #[test]
    fn mac_address_from_str() {
        let mac: MacAddress = "AA-BB-CC-DD-EE-FF".parse().unwrap();
        assert_eq!(mac.to_string(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn mac_address_serializes_as_plain_string() {
        let mac = MacAddress::new("AA:BB:CC:00:11:22");
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"aa:bb:cc:00:11:22\"");

        let back: MacAddress = serde_json::from_str("\"AA-BB-CC-00-11-22\"").unwrap();
        assert_eq!(back, mac);
    }
}
