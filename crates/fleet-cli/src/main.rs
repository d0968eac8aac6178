//! Fleet CLI
//!
//! Command-line front end for the fleet coordination engine. Every
//! subcommand is a short call into `fleet-core` against the state root
//! (`~/.fleet` unless configured otherwise).
//!
//! # Command groups
//!
//! - `fleet team ...`: create, start, stop, inspect, recover and scale teams
//! - `fleet member ...`: add, attach, spawn and manage teammates
//! - `fleet task ...`: add, claim, update and release tasks
//! - `fleet message ...`: send, broadcast, read and acknowledge messages
//! - `fleet event ...`: query the ordered event log
//! - `fleet worker ...`: register async workers and bridge their results
//! - `fleet hook ...`: entry points for agent session hooks
//!
//! Pass `--json` for machine-readable output on stdout; logs always go to stderr.

mod args;
mod commands;
mod console;
mod logging;
mod loops;
mod policy;
mod router;

use clap::Parser;
use colored::*;

pub use args::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = router::route(cli).await {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
