//! `camprov scan`: discovery only, nothing is pushed to cameras.

use tracing::{info, warn};

use camprov_core::Orchestrator;

use crate::cli::{GlobalOpts, ScanArgs};
use crate::error::CliError;

use super::util;

pub async fn handle(
    orchestrator: &Orchestrator,
    args: ScanArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    run_cycles(orchestrator, args.cycles).await?;

    if args.refresh {
        refresh_all(orchestrator).await;
    }

    util::print_devices(orchestrator, global)
}

/// Run `cycles` reconciliation cycles back to back. The first failure
/// aborts; the registry keeps whatever earlier cycles found.
pub(crate) async fn run_cycles(orchestrator: &Orchestrator, cycles: u32) -> Result<(), CliError> {
    for cycle in 1..=cycles {
        let report = orchestrator.reconcile().await?;
        info!(
            cycle,
            devices = report.device_count,
            new = report.new_devices,
            assigned = report.assigned,
            deferred = report.deferred,
            "scan cycle finished"
        );
    }
    Ok(())
}

/// Ask every camera with a known address for its model and firmware.
/// Unreachable cameras keep what discovery reported.
async fn refresh_all(orchestrator: &Orchestrator) {
    let snapshot = orchestrator.devices_snapshot();
    for device in snapshot.iter().filter(|d| d.current_address.is_some()) {
        if let Err(e) = orchestrator.refresh_device_info(&device.hardware_id).await {
            warn!(mac = %device.hardware_id, error = %e, "could not refresh camera info");
        }
    }
}
