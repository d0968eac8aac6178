//! Command routing logic for CLI

use crate::args::{Cli, Commands};
use crate::commands::{self, Context};
use crate::console::CliConsole;
use crate::logging;
use crate::policy::RoleMatrixPolicy;
use anyhow::Context as _;
use fleet_core::{Fleet, load_config};

/// Load configuration, set up logging and dispatch the subcommand
pub async fn route(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let home = config.home_dir()?;
    logging::init(&config.logging, &home, cli.verbose)?;
    tracing::debug!("Loaded configuration: {:?}", config);

    let fleet = Fleet::open(config)?;
    let ctx = Context::new(
        fleet,
        CliConsole::new(cli.verbose, cli.json),
        cli.team,
        cli.as_role,
        Box::new(RoleMatrixPolicy),
    );

    match cli.command {
        Commands::Team { action } => commands::team::run(&ctx, action).await,
        Commands::Member { action } => commands::member::run(&ctx, action),
        Commands::Task { action } => commands::task::run(&ctx, action),
        Commands::Message { action } => commands::message::run(&ctx, action),
        Commands::Event { action } => commands::event::run(&ctx, action),
        Commands::Worker { action } => commands::worker::run(&ctx, action),
        Commands::Hook { action } => commands::hook::run(&ctx, action).await,
        Commands::Collab { action } => commands::collab::run(&ctx, action),
    }
}
