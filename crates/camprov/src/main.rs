mod cli;
mod commands;
mod error;
mod output;
mod sim;

use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use camprov_config::{Config, ConfigError};
use camprov_core::{AllocationMode, Orchestrator};

use crate::cli::{Cli, Command, GlobalOpts, ModeArg};
use crate::error::CliError;
use crate::sim::SimulatedFleet;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // A broken config file must not keep `config init --force` from working,
    // so loading errors are only raised by commands that need the config.
    let loaded = camprov_config::load_config(cli.global.config.as_deref());

    let logging = loaded.as_ref().ok().map(|cfg| &cfg.logging);
    let log_dir = cli
        .global
        .log_dir
        .as_deref()
        .or_else(|| logging.and_then(|l| l.directory.as_deref()));
    let json = cli.global.log_json || logging.is_some_and(|l| l.json);
    let _guard = init_tracing(cli.global.verbose, log_dir, json);

    if let Err(err) = run(cli, loaded).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

/// Console logs go to stderr so stdout stays parseable. With a log
/// directory, a daily-rolling file sink is added; the returned guard
/// flushes it on drop.
fn init_tracing(verbosity: u8, log_dir: Option<&Path>, json: bool) -> Option<WorkerGuard> {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    let (file, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "camprov.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .init();

    guard
}

async fn run(cli: Cli, loaded: Result<Config, ConfigError>) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need an orchestrator
        Command::Config(args) => commands::config_cmd::handle(args, loaded, &cli.global),

        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "camprov", &mut std::io::stdout());
            Ok(())
        }

        cmd => {
            let auto_configure = matches!(&cmd, Command::Run(args) if args.auto_configure);
            let cfg = loaded?;
            let orchestrator = build_orchestrator(&cfg, &cli.global, auto_configure)?;

            tracing::debug!(command = ?cmd, mode = %orchestrator.mode(), "dispatching command");
            commands::dispatch(cmd, &orchestrator, &cli.global).await
        }
    }
}

/// Translate the loaded config plus CLI overrides and wire the simulated
/// fleet in as both discovery source and device client.
fn build_orchestrator(
    cfg: &Config,
    global: &GlobalOpts,
    auto_configure: bool,
) -> Result<Orchestrator, CliError> {
    let mut provisioner = cfg.to_provisioner_config()?;
    if let Some(mode) = global.mode {
        provisioner.allocation_mode = match mode {
            ModeArg::Automatic => AllocationMode::Automatic,
            ModeArg::Manual => AllocationMode::Manual,
        };
    }
    provisioner.auto_configure |= auto_configure;

    let fleet = Arc::new(SimulatedFleet::new(&cfg.simulation, provisioner.network_prefix));
    Ok(Orchestrator::new(provisioner, fleet.clone(), fleet)?)
}
