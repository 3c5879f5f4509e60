//! Force-release a connector's execution lock.

use anyhow::{Context, Result};
use std::sync::Arc;

use grove_connector::{factory, Config, ConfigError, ExecutionLock, SystemClock};

/// Delete the lock of `name`, whoever holds it.
pub async fn run(config: &Config, name: &str) -> Result<()> {
    let connector = config.connector(name).ok_or_else(|| ConfigError::Unknown {
        what: "connector",
        name: name.to_string(),
    })?;
    let identity = factory::identity(connector)?;

    let cache = factory::open_cache(&config.cache)
        .await
        .context("Failed to open cache")?;
    let mut lock = ExecutionLock::new(
        cache,
        &identity,
        config.lock.duration(),
        Arc::new(SystemClock),
    );
    lock.force_release().await?;

    println!("Unlocked {}", name);
    Ok(())
}
