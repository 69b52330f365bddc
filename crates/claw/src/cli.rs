//! Clap derive structures for the `claw` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// claw -- route remote-control key presses to home-automation devices
#[derive(Debug, Parser)]
#[command(
    name = "claw",
    version,
    about = "Route remote-control key presses to home-automation devices",
    long_about = "Reads key presses from lircd sockets and forwards them to\n\
        receivers, media players and hosts according to a routing table.",
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
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, short = 'c', env = "CLAW_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

impl GlobalOpts {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(claw_config::config_path)
    }
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Listen for key presses and dispatch them until interrupted
    Run,

    /// Validate the configuration without connecting to anything
    Check(CheckArgs),

    /// Print a target's command vocabulary as JSON
    Commands(CommandsArgs),

    /// Send a single command to a configured target
    Send(SendArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Print the effective configuration as TOML
    #[arg(long)]
    pub print: bool,
}

#[derive(Debug, Args)]
pub struct CommandsArgs {
    /// Target name from the configuration
    pub target: String,
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Target name from the configuration
    pub target: String,

    /// Command name, e.g. VolumeUp
    pub command: String,

    /// Command arguments
    pub args: Vec<String>,
}
