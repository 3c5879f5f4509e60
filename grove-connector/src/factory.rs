//! Build runnable connectors from configuration.
//!
//! Every name in a configuration file is resolved here, so an unknown cache
//! backend, collector, processor or output fails when the connector is
//! built, never mid-run.

use std::collections::HashSet;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use grove_cache::{Cache, MemoryCache, SqliteCache};
use grove_core::FieldPath;
use grove_types::{ConnectorIdentity, Entry, LogOrder};

use crate::collector::{Collector, LocalFileCollector};
use crate::config::{CacheConfig, Config, ConfigError, ConnectorConfig, OutputConfig, ProcessorConfig};
use crate::error::Result;
use crate::output::{FileOutput, Output, StdoutOutput};
use crate::pipeline::Processor;
use crate::processors::{FilterProcessor, SplitProcessor};
use crate::runtime::Connector;

/// Open the configured cache backend.
pub async fn open_cache(config: &CacheConfig) -> Result<Arc<dyn Cache>> {
    match config.backend.as_str() {
        "sqlite" => Ok(Arc::new(SqliteCache::new(&config.path).await?)),
        "memory" => Ok(Arc::new(MemoryCache::new())),
        other => Err(ConfigError::Unknown {
            what: "cache backend",
            name: other.to_string(),
        }
        .into()),
    }
}

/// Connector identity named by a configuration entry.
pub fn identity(config: &ConnectorConfig) -> std::result::Result<ConnectorIdentity, ConfigError> {
    Ok(ConnectorIdentity::new(
        config.kind.clone(),
        config.identity.clone(),
        config.operation.clone(),
    )?)
}

/// Build every configured connector, or only `only` when given.
pub fn build_connectors(
    config: &Config,
    cache: Arc<dyn Cache>,
    only: Option<&str>,
) -> std::result::Result<Vec<Connector>, ConfigError> {
    let mut names = HashSet::new();
    for connector in &config.connectors {
        if !names.insert(connector.name.as_str()) {
            return Err(ConfigError::DuplicateConnector(connector.name.clone()));
        }
    }

    if let Some(name) = only {
        let connector = config.connector(name).ok_or_else(|| ConfigError::Unknown {
            what: "connector",
            name: name.to_string(),
        })?;
        return Ok(vec![build_connector(connector, config, cache)?]);
    }

    config
        .connectors
        .iter()
        .map(|c| build_connector(c, config, cache.clone()))
        .collect()
}

/// Build one connector.
pub fn build_connector(
    connector: &ConnectorConfig,
    config: &Config,
    cache: Arc<dyn Cache>,
) -> std::result::Result<Connector, ConfigError> {
    let identity = identity(connector)?;
    let collector = build_collector(connector)?;

    if connector.outputs.is_empty() {
        return Err(ConfigError::Setting {
            owner: connector.name.clone(),
            key: "outputs".into(),
            problem: "must name at least one output".into(),
        });
    }

    let mut built = Connector::new(connector.name.clone(), identity, cache, collector)
        .with_lock_duration(config.lock.duration());
    for processor in &connector.processors {
        built = built.with_processor(build_processor(processor)?);
    }
    for output in &connector.outputs {
        built = built.with_output(build_output(output)?);
    }
    Ok(built)
}

/// Build the collector a connector entry names.
pub fn build_collector(
    config: &ConnectorConfig,
) -> std::result::Result<Box<dyn Collector>, ConfigError> {
    let settings = Settings::new(&config.name, &config.settings);
    match config.kind.as_str() {
        "local_file" => {
            let order = match settings.optional_str("order")? {
                Some(order) => LogOrder::from_str(order)?,
                None => LogOrder::default(),
            };
            let mut collector = LocalFileCollector::new(
                PathBuf::from(settings.required_str("path")?),
                settings.field_path("pointer")?,
                order,
            );
            if let Some(size) = settings.optional_integer("page_size")? {
                collector = collector.with_page_size(size);
            }
            if let Some(pointer) = settings.optional_str("default_pointer")? {
                collector = collector.with_default_pointer(pointer);
            }
            Ok(Box::new(collector))
        }
        other => Err(ConfigError::Unknown {
            what: "collector",
            name: other.to_string(),
        }),
    }
}

/// Build a pipeline stage.
pub fn build_processor(
    config: &ProcessorConfig,
) -> std::result::Result<Box<dyn Processor>, ConfigError> {
    let settings = Settings::new(&config.name, &config.settings);
    match config.name.as_str() {
        "split" => Ok(Box::new(SplitProcessor::new(settings.field_path("path")?))),
        "filter" => {
            let value = settings.required("equals")?;
            let value = value
                .clone()
                .try_into::<Entry>()
                .map_err(|e| settings.invalid("equals", e))?;
            Ok(Box::new(FilterProcessor::new(settings.field_path("path")?, value)))
        }
        other => Err(ConfigError::Unknown {
            what: "processor",
            name: other.to_string(),
        }),
    }
}

/// Build a destination.
pub fn build_output(config: &OutputConfig) -> std::result::Result<Arc<dyn Output>, ConfigError> {
    let settings = Settings::new(&config.backend, &config.settings);
    match config.backend.as_str() {
        "stdout" => Ok(Arc::new(StdoutOutput::new())),
        "file" => Ok(Arc::new(FileOutput::new(settings.required_str("directory")?))),
        other => Err(ConfigError::Unknown {
            what: "output",
            name: other.to_string(),
        }),
    }
}

/// Typed access to a settings table.
struct Settings<'a> {
    owner: &'a str,
    table: &'a toml::Table,
}

impl<'a> Settings<'a> {
    fn new(owner: &'a str, table: &'a toml::Table) -> Self {
        Self { owner, table }
    }

    fn invalid(&self, key: &str, problem: impl std::fmt::Display) -> ConfigError {
        ConfigError::Setting {
            owner: self.owner.to_string(),
            key: key.to_string(),
            problem: problem.to_string(),
        }
    }

    fn required(&self, key: &str) -> std::result::Result<&'a toml::Value, ConfigError> {
        self.table.get(key).ok_or_else(|| self.invalid(key, "is required"))
    }

    fn required_str(&self, key: &str) -> std::result::Result<&'a str, ConfigError> {
        self.required(key)?
            .as_str()
            .ok_or_else(|| self.invalid(key, "must be a string"))
    }

    fn optional_str(&self, key: &str) -> std::result::Result<Option<&'a str>, ConfigError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.invalid(key, "must be a string")),
        }
    }

    fn optional_integer(&self, key: &str) -> std::result::Result<Option<usize>, ConfigError> {
        match self.table.get(key) {
            None => Ok(None),
            Some(value) => value
                .as_integer()
                .and_then(|i| usize::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| self.invalid(key, "must be a non-negative integer")),
        }
    }

    fn field_path(&self, key: &str) -> std::result::Result<FieldPath, ConfigError> {
        Ok(FieldPath::parse(self.required_str(key)?)?)
    }
}
