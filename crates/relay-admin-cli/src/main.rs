//! relay-admin: command-line client for the relay management API.
//! Thin layer over the `relay-admin` services; every command prints JSON.
#![deny(clippy::all, clippy::pedantic)]

mod args;
mod error;
mod handlers;
mod print;

use clap::Parser;
use relay_admin::application::AdminContext;
use relay_admin::config;
use relay_admin::infra::telemetry;

use args::{Cli, Commands};
use error::CliError;
use handlers::{auth, blocked, cache, notifications, profiles, rates, reports};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = config::load(&cli.global)?;
    telemetry::init(&settings.logging)?;
    let ctx = AdminContext::new(settings)?;

    match cli.command {
        Commands::Auth(cmd) => auth::handle(&ctx, cmd.action)?,
        Commands::Rates(cmd) => rates::handle(&ctx, cmd).await?,
        Commands::Profiles(cmd) => profiles::handle(&ctx, cmd).await?,
        Commands::Moderation(cmd) => notifications::handle(&ctx, &ctx.moderation, cmd.action).await?,
        Commands::Payments(cmd) => notifications::handle(&ctx, &ctx.payments, cmd.action).await?,
        Commands::Reports(cmd) => reports::handle(&ctx, cmd.action).await?,
        Commands::Blocked(cmd) => blocked::handle(&ctx, cmd.action).await?,
        Commands::Cache(cmd) => cache::handle(&ctx, cmd.action)?,
    }

    Ok(())
}
