//! Command dispatch: bridges CLI args -> orchestrator -> output formatting.

pub mod config_cmd;
pub mod pool;
pub mod provision;
pub mod run;
pub mod scan;
pub mod util;

use camprov_core::Orchestrator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an orchestrator-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    orchestrator: &Orchestrator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(orchestrator, args, global).await,
        Command::Scan(args) => scan::handle(orchestrator, args, global).await,
        Command::Provision(args) => provision::handle(orchestrator, args, global).await,
        Command::Pool => pool::handle(orchestrator, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
