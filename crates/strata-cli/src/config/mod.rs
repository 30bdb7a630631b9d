//! CLI configuration management.
//!
//! This module defines the complete CLI configuration hierarchy:
//!
//! ```text
//! Cli
//! ├── command: Command     # migrate, status, listen, notify
//! └── postgres: PgConfig   # Connection, pool and schema settings
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! # Example
//!
//! ```bash
//! # Apply migrations for two schemas
//! strata --postgres-url "postgresql://..." \
//!     --postgres-schema-directory ./schemas \
//!     --postgres-schema-names core,jobs migrate
//!
//! # Or via environment variables
//! POSTGRES_URL="postgresql://..." strata listen events
//! ```

use std::process;

use anyhow::Context;
use clap::{Parser, Subcommand};
use strata_postgres::PgConfig;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "strata")]
#[command(about = "PostgreSQL schema migrations and notifications")]
#[command(version)]
pub struct Cli {
    /// Command to run.
    #[command(subcommand)]
    pub command: Command,

    /// PostgreSQL connection, pool and schema configuration.
    #[clap(flatten)]
    pub postgres: PgConfig,
}

/// Commands supported by the CLI.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Applies pending migrations for every configured schema.
    Migrate,

    /// Prints applied and pending migrations for every configured schema.
    Status,

    /// Prints notification payloads received on the given channels until interrupted.
    Listen {
        /// Channels to listen on.
        #[arg(required = true)]
        channels: Vec<String>,
    },

    /// Sends a notification.
    Notify {
        /// Channel to notify.
        channel: String,
        /// Payload to send.
        payload: String,
    },
}

impl Command {
    /// Returns the command name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Migrate => "migrate",
            Self::Status => "status",
            Self::Listen { .. } => "listen",
            Self::Notify { .. } => "notify",
        }
    }

    /// Returns whether the command reads the migration directories.
    pub fn needs_schemas(&self) -> bool {
        matches!(self, Self::Migrate | Self::Status)
    }
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// This is the preferred way to initialize the CLI configuration as it ensures
    /// .env files are loaded before clap parses arguments, allowing environment
    /// variables from .env to be used as defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    /// Loads environment variables from .env file if the dotenv feature is enabled.
    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    /// No-op when dotenv feature is disabled.
    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.postgres
            .validate()
            .context("invalid database configuration")?;

        if self.command.needs_schemas() && self.postgres.schema_directory().is_none() {
            anyhow::bail!(
                "the {} command requires --postgres-schema-directory",
                self.command.name()
            );
        }

        Ok(())
    }

    /// Logs configuration (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            command = self.command.name(),
            database_url = %self.postgres.database_url_masked(),
            max_connections = self.postgres.postgres_max_connections,
            acquisition_timeout_ms = self.postgres.postgres_acquisition_timeout_ms,
            schema_directory = ?self.postgres.postgres_schema_directory,
            schema_names = ?self.postgres.postgres_schema_names,
            "Database configuration"
        );
    }

    /// Logs build information at debug level.
    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [cfg!(feature = "dotenv").then_some("dotenv")]
            .into_iter()
            .flatten()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_listen() {
        let cli = Cli::try_parse_from([
            "strata",
            "--postgres-url",
            "postgresql://localhost/db",
            "listen",
            "events",
            "jobs",
        ])
        .expect("arguments should parse");

        assert!(matches!(
            &cli.command,
            Command::Listen { channels } if channels == &["events", "jobs"]
        ));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_parse_schema_names() {
        let cli = Cli::try_parse_from([
            "strata",
            "--postgres-url",
            "postgresql://localhost/db",
            "--postgres-schema-directory",
            "./schemas",
            "--postgres-schema-names",
            "core,jobs",
            "migrate",
        ])
        .expect("arguments should parse");

        assert_eq!(cli.postgres.schema_names(), ["core", "jobs"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_migrate_requires_schema_directory() {
        let cli = Cli::try_parse_from([
            "strata",
            "--postgres-url",
            "postgresql://localhost/db",
            "migrate",
        ])
        .expect("arguments should parse");

        assert!(cli.validate().is_err());
    }
}
