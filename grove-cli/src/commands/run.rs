//! Collect new entries.

use anyhow::{Context, Result};
use tokio::task::JoinSet;

use grove_connector::factory;
use grove_connector::Config;

/// Run the configured connectors concurrently.
///
/// Every connector runs to completion even when another fails; the command
/// fails if any of them did.
pub async fn run(config: &Config, only: Option<&str>) -> Result<()> {
    let cache = factory::open_cache(&config.cache)
        .await
        .context("Failed to open cache")?;
    let connectors = factory::build_connectors(config, cache, only)
        .context("Invalid connector configuration")?;

    if connectors.is_empty() {
        tracing::warn!("No connectors configured");
        return Ok(());
    }

    let mut tasks = JoinSet::new();
    for mut connector in connectors {
        tasks.spawn(async move {
            let name = connector.name().to_string();
            (name, connector.run().await)
        });
    }

    let mut failed = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let (name, result) = joined.context("Connector task panicked")?;
        match result {
            Ok(summary) => {
                tracing::info!(
                    "{}: {} entries in {} pages, pointer {:?}{}",
                    name,
                    summary.entries_written,
                    summary.pages,
                    summary.pointer,
                    if summary.best_effort { " (best effort)" } else { "" }
                );
            }
            Err(e) => {
                tracing::error!("{}: {}", name, e);
                failed.push(name);
            }
        }
    }

    if !failed.is_empty() {
        failed.sort();
        anyhow::bail!("{} connector(s) failed: {}", failed.len(), failed.join(", "));
    }
    Ok(())
}
