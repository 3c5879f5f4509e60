//! Show durable state per connector.

use anyhow::{Context, Result};

use grove_connector::config::ConnectorConfig;
use grove_connector::{factory, Clock, Config, ConfigError, SystemClock};
use grove_types::KeyPrefix;

/// Print every state key of the selected connectors.
pub async fn run(config: &Config, only: Option<&str>) -> Result<()> {
    let selected: Vec<&ConnectorConfig> = match only {
        Some(name) => vec![config.connector(name).ok_or_else(|| ConfigError::Unknown {
            what: "connector",
            name: name.to_string(),
        })?],
        None => config.connectors.iter().collect(),
    };

    if selected.is_empty() {
        println!("No connectors configured.");
        return Ok(());
    }

    let cache = factory::open_cache(&config.cache)
        .await
        .context("Failed to open cache")?;
    let now = SystemClock.now_millis();

    for connector in selected {
        let identity = factory::identity(connector)?;
        println!("{} ({})", connector.name, identity);

        for prefix in KeyPrefix::ALL {
            if prefix == KeyPrefix::Deduplication {
                continue;
            }
            let key = identity.key(prefix);
            let value = cache.get(&key.pk, &key.sk).await?;
            let shown = match (prefix, value) {
                (_, None) => "-".to_string(),
                (KeyPrefix::ExecutionLock, Some(expiry)) => {
                    match expiry.parse::<u64>() {
                        Ok(ms) if ms >= now => format!("held, {}s left", (ms - now) / 1000),
                        Ok(_) => "expired".to_string(),
                        Err(_) => format!("unreadable ({})", expiry),
                    }
                }
                (_, Some(value)) => value,
            };
            println!("  {:<17} {}", format!("{}:", prefix), shown);
        }
        println!();
    }

    Ok(())
}
