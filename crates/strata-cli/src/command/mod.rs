//! Command implementations.
//!
//! Command results are printed to stdout; logs go to stderr.

mod shutdown;

use std::pin::pin;

use anyhow::Context;
use futures::StreamExt;
use futures::stream::select_all;
use strata_postgres::{PgClient, PgClientMigrationExt};

pub use self::shutdown::shutdown_signal;
use crate::TRACING_TARGET_SHUTDOWN;

/// Applies pending migrations for every configured schema.
pub async fn migrate(client: &PgClient) -> anyhow::Result<()> {
    let results = client
        .update_schemas()
        .await
        .context("failed to apply migrations")?;

    for result in results {
        if result.is_no_op() {
            println!("{}: up to date", result.schema);
            continue;
        }

        for version in &result.processed_versions {
            println!("{}: applied {}", result.schema, version);
        }
    }

    Ok(())
}

/// Prints the migration status of every configured schema.
pub async fn status(client: &PgClient) -> anyhow::Result<()> {
    let config = client.config();
    let root = config
        .schema_directory()
        .context("no schema directory configured")?;

    for schema in config.schema_names() {
        let status = client
            .migration_status(schema, &root.join(schema))
            .await
            .with_context(|| format!("failed to read migration status of {schema:?}"))?;

        println!(
            "{}: {}/{} applied, last {}",
            status.schema,
            status.applied_migrations(),
            status.total_migrations(),
            status.last_applied_version().unwrap_or("none"),
        );

        for version in &status.pending_versions {
            println!("{}: pending {}", status.schema, version);
        }
    }

    Ok(())
}

/// Prints every payload received on `channels` until interrupted.
pub async fn listen(client: &PgClient, channels: &[String]) -> anyhow::Result<()> {
    let mut subscriptions = Vec::with_capacity(channels.len());
    for channel in channels {
        let subscription = client
            .listen(channel)
            .with_context(|| format!("failed to listen on {channel:?}"))?;
        subscriptions.push(subscription);
    }

    let mut payloads = select_all(subscriptions.into_iter().map(|subscription| {
        let channel = subscription.channel().to_owned();
        subscription.map(move |payload| (channel.clone(), payload))
    }));

    let mut shutdown = pin!(shutdown_signal());
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            next = payloads.next() => match next {
                Some((channel, payload)) => println!("{channel}\t{payload}"),
                None => break,
            },
        }
    }

    tracing::debug!(target: TRACING_TARGET_SHUTDOWN, "Stopped listening");
    Ok(())
}

/// Sends a single notification.
pub async fn notify(client: &PgClient, channel: &str, payload: &str) -> anyhow::Result<()> {
    client
        .notify(channel, payload)
        .await
        .with_context(|| format!("failed to notify {channel:?}"))
}
