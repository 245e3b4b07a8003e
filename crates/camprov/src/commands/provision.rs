//! `camprov provision`: scan, apply operator pins and skips, then push
//! configuration to every eligible camera.

use tracing::{info, warn};

use camprov_core::{ConfigurationOutcome, Orchestrator};

use crate::cli::{GlobalOpts, ProvisionArgs};
use crate::error::CliError;

use super::{scan, util};

pub async fn handle(
    orchestrator: &Orchestrator,
    args: ProvisionArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    scan::run_cycles(orchestrator, args.cycles).await?;

    for identifier in &args.skip {
        let mac = util::resolve_device(orchestrator, identifier)?;
        orchestrator.skip(&mac).await?;
    }
    for raw in &args.assign {
        let (identifier, address) = util::parse_assignment(raw)?;
        let mac = util::resolve_device(orchestrator, &identifier)?;
        orchestrator.assign_address(&mac, Some(address)).await?;
    }

    let results = orchestrator.configure_pending().await;
    let mut configured = 0usize;
    let mut failed = 0usize;
    for (mac, result) in &results {
        match result {
            Ok(ConfigurationOutcome::Configured { .. }) => configured += 1,
            Ok(ConfigurationOutcome::Failed { message }) => {
                failed += 1;
                warn!(%mac, %message, "camera not configured");
            }
            Err(e) => {
                failed += 1;
                warn!(%mac, error = %e, "camera not dispatched");
            }
        }
    }
    info!(dispatched = results.len(), configured, failed, "provisioning pass finished");

    util::print_devices(orchestrator, global)?;
    if !global.quiet {
        eprintln!("{configured} configured, {failed} failed");
    }
    Ok(())
}
