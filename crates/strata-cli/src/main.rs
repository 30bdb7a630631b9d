#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod command;
mod config;
mod telemetry;

use std::process;

use anyhow::Context;
use strata_postgres::PgClient;

use crate::config::{Cli, Command};

// Tracing target constants
pub const TRACING_TARGET_STARTUP: &str = "strata_cli::startup";
pub const TRACING_TARGET_SHUTDOWN: &str = "strata_cli::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "strata_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::debug!(
            target: TRACING_TARGET_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SHUTDOWN,
            error = format!("{error:#}"),
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    telemetry::init_tracing()?;

    cli.log();
    cli.validate()?;

    let client = cli
        .postgres
        .clone()
        .build()
        .context("failed to create database client")?;

    let result = run_command(&client, cli.command).await;
    client.close().await;
    result
}

/// Runs a single command against an open client.
async fn run_command(client: &PgClient, command: Command) -> anyhow::Result<()> {
    client
        .ping()
        .await
        .context("failed to connect to the database")?;

    match command {
        Command::Migrate => command::migrate(client).await,
        Command::Status => command::status(client).await,
        Command::Listen { channels } => command::listen(client, &channels).await,
        Command::Notify { channel, payload } => command::notify(client, &channel, &payload).await,
    }
}
