//! Clap derive structures for the `camprov` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Only depends on clap + clap_complete so `build.rs` can include it for
//! man page generation.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// camprov -- discover network cameras and move them onto a managed range
#[derive(Debug, Parser)]
#[command(
    name = "camprov",
    version,
    about = "Provision network cameras onto a managed address range",
    long_about = "Discovers cameras on the local segment, assigns each one an address\n\
        from a configured pool and pushes the new network configuration to the\n\
        device. Ships with a simulated camera fleet for demos and testing.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Path to the config file (defaults to the platform config dir)
    #[arg(long, env = "CAMPROV_CONFIG", global = true, hide_env = true)]
    pub config: Option<PathBuf>,

    /// Allocation mode (overrides the config file)
    #[arg(long, short = 'm', global = true)]
    pub mode: Option<ModeArg>,

    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Also write daily-rolling log files into this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Emit console logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Assign pool addresses to new cameras on discovery
    Automatic,
    /// Leave new cameras unassigned until an operator picks an address
    Manual,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the provisioner until interrupted, streaming events
    Run(RunArgs),

    /// Run discovery cycles and list what was found
    #[command(alias = "s")]
    Scan(ScanArgs),

    /// Discover cameras, then configure every eligible one
    #[command(alias = "p")]
    Provision(ProvisionArgs),

    /// Show the address pool
    Pool,

    /// Manage configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Provisioning ─────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Configure eligible cameras after every cycle
    #[arg(long)]
    pub auto_configure: bool,
}

#[derive(Debug, Args)]
pub struct ScanArgs {
    /// Number of discovery cycles to run
    #[arg(long, short = 'n', default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles: u32,

    /// Query each camera for model and firmware after discovery
    #[arg(long)]
    pub refresh: bool,
}

#[derive(Debug, Args)]
pub struct ProvisionArgs {
    /// Number of discovery cycles to run before configuring
    #[arg(long, short = 'n', default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub cycles: u32,

    /// Pin a camera to an address (MAC=ADDRESS, repeatable)
    #[arg(long, value_name = "MAC=ADDRESS")]
    pub assign: Vec<String>,

    /// Leave a camera untouched (repeatable)
    #[arg(long, value_name = "MAC")]
    pub skip: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration
    Show,

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
