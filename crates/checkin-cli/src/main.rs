//! checkin CLI - Check in event participants from the terminal
//!
//! Works against a local cache that is refreshed from Indico whenever the
//! server is reachable.

mod auth;
mod cli;
mod commands;
mod config;
mod error;
mod notifier;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::check_in::run_check_in;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::list::{run_events, run_regforms};
use crate::commands::remove::run_remove;
use crate::commands::show::run_show;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("checkin=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            server,
            event,
            regform,
            no_sync,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_add(server.as_deref(), event, regform, no_sync, &db_path).await?;
        }
        Commands::Events { json } => run_events(json, &resolve_db_path(cli.db_path)?).await?,
        Commands::Regforms { event, json } => {
            run_regforms(event, json, &resolve_db_path(cli.db_path)?).await?;
        }
        Commands::Show {
            event,
            regform,
            no_sync,
            json,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_show(event, regform, no_sync, json, &db_path).await?;
        }
        Commands::Watch {
            event,
            regform,
            interval,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_watch(event, regform, interval, &db_path).await?;
        }
        Commands::CheckIn {
            event,
            regform,
            participant,
            undo,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_check_in(event, regform, participant, undo, &db_path).await?;
        }
        Commands::Remove {
            event,
            regform,
            cascade,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            run_remove(event, regform, cascade, &db_path).await?;
        }
        Commands::Sync { event, regform } => {
            run_sync(event, regform, &resolve_db_path(cli.db_path)?).await?;
        }
        Commands::Auth { command } => run_auth(command)?,
        Commands::Config { command } => run_config(command)?,
        Commands::Completions { shell, output } => {
            run_completions(shell, output.as_deref())?;
        }
    }

    Ok(())
}
