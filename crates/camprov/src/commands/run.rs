//! `camprov run`: the long-running provisioner.
//!
//! Starts the reconciliation timer and prints every provisioning event
//! until Ctrl+C, then shuts down, which fails any attempt still in flight.

use owo_colors::OwoColorize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use camprov_core::{Orchestrator, ProvisioningEvent};

use crate::cli::{GlobalOpts, OutputFormat, RunArgs};
use crate::error::CliError;
use crate::output;

use super::util;

pub async fn handle(
    orchestrator: &Orchestrator,
    _args: RunArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let mut events = orchestrator.events();
    orchestrator.start().await?;
    info!(status = %orchestrator.status_text(), "provisioner running, Ctrl+C to stop");

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    warn!(error = %e, "could not listen for Ctrl+C");
                }
                break;
            }
            received = events.recv() => match received {
                Ok(event) => {
                    let line = render_event(&event, &global.output, color)?;
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "event stream lagged"),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("shutting down");
    orchestrator.shutdown().await;
    util::print_devices(orchestrator, global)
}

fn render_event(
    event: &ProvisioningEvent,
    format: &OutputFormat,
    color: bool,
) -> Result<String, CliError> {
    match format {
        OutputFormat::Table => Ok(describe(event, color)),
        // One document per event so the stream stays line-parseable.
        OutputFormat::Json | OutputFormat::JsonCompact => output::render_json(event, true),
        OutputFormat::Yaml => Ok(format!("---\n{}", output::render_yaml(event)?.trim_end())),
        OutputFormat::Plain => Ok(match event.hardware_id() {
            Some(mac) => format!("{} {mac}", kind(event)),
            None => kind(event).to_owned(),
        }),
    }
}

fn kind(event: &ProvisioningEvent) -> &'static str {
    match event {
        ProvisioningEvent::DeviceDiscovered { .. } => "discovered",
        ProvisioningEvent::AddressAssigned { .. } => "assigned",
        ProvisioningEvent::AddressReleased { .. } => "released",
        ProvisioningEvent::PoolExhausted { .. } => "pool_exhausted",
        ProvisioningEvent::ConfigurationStarted { .. } => "configuring",
        ProvisioningEvent::Configured { .. } => "configured",
        ProvisioningEvent::ConfigurationFailed { .. } => "failed",
        ProvisioningEvent::CycleCompleted { .. } => "cycle",
        ProvisioningEvent::CycleFailed { .. } => "cycle_failed",
    }
}

fn describe(event: &ProvisioningEvent, color: bool) -> String {
    let now = chrono::Local::now().format("%H:%M:%S");
    let text = match event {
        ProvisioningEvent::DeviceDiscovered { hardware_id } => {
            format!("discovered camera {hardware_id}")
        }
        ProvisioningEvent::AddressAssigned {
            hardware_id,
            address,
        } => format!("{hardware_id} will move to {address}"),
        ProvisioningEvent::AddressReleased {
            hardware_id,
            address,
        } => format!("{hardware_id} released {address}"),
        ProvisioningEvent::PoolExhausted { hardware_id } => {
            format!("no free address for {hardware_id}")
        }
        ProvisioningEvent::ConfigurationStarted {
            hardware_id,
            address,
            attempt,
        } => format!("configuring {hardware_id} -> {address} (attempt {attempt})"),
        ProvisioningEvent::Configured {
            hardware_id,
            address,
        } => format!("{hardware_id} configured at {address}"),
        ProvisioningEvent::ConfigurationFailed {
            hardware_id,
            message,
        } => format!("{hardware_id} failed: {message}"),
        ProvisioningEvent::CycleCompleted {
            device_count,
            new_devices,
            ..
        } => format!("scan finished: {device_count} cameras, {new_devices} new"),
        ProvisioningEvent::CycleFailed { message, .. } => format!("scan failed: {message}"),
    };

    if !color {
        return format!("{now}  {text}");
    }
    let text = match event {
        ProvisioningEvent::Configured { .. } => text.green().to_string(),
        ProvisioningEvent::ConfigurationFailed { .. }
        | ProvisioningEvent::CycleFailed { .. }
        | ProvisioningEvent::PoolExhausted { .. } => text.red().to_string(),
        ProvisioningEvent::ConfigurationStarted { .. } => text.yellow().to_string(),
        _ => text,
    };
    format!("{}  {text}", now.dimmed())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::net::Ipv4Addr;

    use camprov_core::MacAddress;

    use super::*;

    fn configured() -> ProvisioningEvent {
        ProvisioningEvent::Configured {
            hardware_id: MacAddress::new("AC-CC-8E-01-02-03"),
            address: Ipv4Addr::new(192, 168, 1, 10),
        }
    }

    #[test]
    fn json_events_are_single_lines_tagged_by_kind() {
        let line = render_event(&configured(), &OutputFormat::Json, false).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.contains(r#""kind":"configured""#));
    }

    #[test]
    fn plain_events_name_the_kind_and_camera() {
        let line = render_event(&configured(), &OutputFormat::Plain, false).unwrap();
        assert_eq!(line, "configured ac:cc:8e:01:02:03");
    }

    #[test]
    fn table_events_read_as_sentences() {
        let line = render_event(&configured(), &OutputFormat::Table, false).unwrap();
        assert!(line.ends_with("ac:cc:8e:01:02:03 configured at 192.168.1.10"));
    }
}
