//! Shared helpers for command handlers.

use std::net::Ipv4Addr;

use tabled::Tabled;

use camprov_core::{Device, MacAddress, Orchestrator};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "MAC")]
    mac: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "ADDRESS")]
    address: String,
    #[tabled(rename = "PENDING")]
    pending: String,
    #[tabled(rename = "MODEL")]
    model: String,
    #[tabled(rename = "FIRMWARE")]
    firmware: String,
    #[tabled(rename = "TRIES")]
    attempts: u32,
    #[tabled(rename = "ERROR")]
    error: String,
}

fn or_dash<T: ToString>(value: Option<T>) -> String {
    value.map_or_else(|| "-".into(), |v| v.to_string())
}

/// Render and print the registry snapshot.
pub fn print_devices(orchestrator: &Orchestrator, global: &GlobalOpts) -> Result<(), CliError> {
    let snapshot = orchestrator.devices_snapshot();
    let color = output::should_color(&global.color);
    let rendered = output::render_list(
        &global.output,
        snapshot.as_slice(),
        |d: &Device| DeviceRow {
            mac: d.hardware_id.to_string(),
            state: output::paint_state(d.state, color),
            address: or_dash(d.current_address),
            pending: or_dash(d.pending_address),
            model: or_dash(d.model.as_deref()),
            firmware: or_dash(d.firmware_version.as_deref()),
            attempts: d.attempt_count,
            error: or_dash(d.error_message.as_deref()),
        },
        |d| d.hardware_id.to_string(),
    )?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

/// Make sure the camera is in the registry before acting on it, so typos
/// get a helpful not-found instead of a generic failure.
pub fn resolve_device(orchestrator: &Orchestrator, identifier: &str) -> Result<MacAddress, CliError> {
    let mac = MacAddress::new(identifier);
    if orchestrator.device(&mac).is_some() {
        Ok(mac)
    } else {
        Err(CliError::NotFound {
            resource_type: "camera".into(),
            identifier: identifier.into(),
        })
    }
}

/// Parse a `MAC=ADDRESS` pin.
pub fn parse_assignment(raw: &str) -> Result<(String, Ipv4Addr), CliError> {
    let invalid = |reason: String| CliError::Validation {
        field: "assign".into(),
        reason,
    };
    let (mac, address) = raw
        .split_once('=')
        .ok_or_else(|| invalid(format!("expected MAC=ADDRESS, got '{raw}'")))?;
    let address = address
        .trim()
        .parse::<Ipv4Addr>()
        .map_err(|_| invalid(format!("'{address}' is not an IPv4 address")))?;
    Ok((mac.trim().to_owned(), address))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn assignment_splits_mac_and_address() {
        let (mac, address) = parse_assignment("AC:CC:8E:01:02:03 = 192.168.1.42").unwrap();
        assert_eq!(mac, "AC:CC:8E:01:02:03");
        assert_eq!(address, Ipv4Addr::new(192, 168, 1, 42));
    }

    #[test]
    fn malformed_assignments_are_usage_errors() {
        for raw in ["ac:cc:8e:01:02:03", "ac:cc:8e:01:02:03=192.168.1", "=nope"] {
            let err = parse_assignment(raw).unwrap_err();
            assert!(matches!(err, CliError::Validation { .. }), "{raw}");
        }
    }
}
