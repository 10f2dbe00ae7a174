//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{collections::HashSet, num::NonZeroUsize, str::FromStr};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

mod cli;

pub use cli::{ApplyArgs, CliArgs, Command, DecodeArgs, GlobalOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "cachefarm";
const ENV_PREFIX: &str = "CACHEFARM";
const DEFAULT_PARTITION_LIMIT: usize = 1_000;
const DEFAULT_RUNTIME_LIMIT: usize = 5_000;
const DEFAULT_DISPATCH_BATCH_LIMIT: usize = 500;
const DEFAULT_SERVER_IDENTITY: &str = "localhost";

#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub farm: FarmSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub partition_limit: NonZeroUsize,
    pub runtime_limit: NonZeroUsize,
    pub dispatch_batch_limit: NonZeroUsize,
    pub coalesce_type_changes: bool,
    pub background_model_rebuild: bool,
}

#[derive(Debug, Clone)]
pub struct FarmSettings {
    pub server_identity: String,
    /// Every server in the farm, including this one; empty on a single node.
    pub servers: Vec<String>,
    /// Buffer instructions for remote servers; false on a single node.
    pub distributed: bool,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("farm.servers")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(&cli.overrides);

    Settings::from_raw(raw)
}

pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    farm: RawFarmSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &GlobalOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(identity) = overrides.server_identity.as_ref() {
            self.farm.server_identity = Some(identity.clone());
        }
        if let Some(distributed) = overrides.distributed {
            self.farm.distributed = Some(distributed);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            cache,
            farm,
        } = raw;

        Ok(Self {
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache)?,
            farm: build_farm_settings(farm)?,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let partition_limit = non_zero_usize(
        cache.partition_limit.unwrap_or(DEFAULT_PARTITION_LIMIT as u64),
        "cache.partition_limit",
    )?;
    let runtime_limit = non_zero_usize(
        cache.runtime_limit.unwrap_or(DEFAULT_RUNTIME_LIMIT as u64),
        "cache.runtime_limit",
    )?;
    let dispatch_batch_limit = non_zero_usize(
        cache
            .dispatch_batch_limit
            .unwrap_or(DEFAULT_DISPATCH_BATCH_LIMIT as u64),
        "cache.dispatch_batch_limit",
    )?;

    Ok(CacheSettings {
        partition_limit,
        runtime_limit,
        dispatch_batch_limit,
        coalesce_type_changes: cache.coalesce_type_changes.unwrap_or(true),
        background_model_rebuild: cache.background_model_rebuild.unwrap_or(false),
    })
}

fn build_farm_settings(farm: RawFarmSettings) -> Result<FarmSettings, LoadError> {
    let server_identity = farm
        .server_identity
        .map(|value| value.trim().to_string())
        .unwrap_or_else(|| DEFAULT_SERVER_IDENTITY.to_string());
    if server_identity.is_empty() {
        return Err(LoadError::invalid(
            "farm.server_identity",
            "must not be empty",
        ));
    }

    let mut seen = HashSet::new();
    let mut servers = Vec::new();
    for server in farm.servers.unwrap_or_default() {
        let trimmed = server.trim();
        if trimmed.is_empty() {
            return Err(LoadError::invalid(
                "farm.servers",
                "server identities must not be empty",
            ));
        }
        if !seen.insert(trimmed.to_string()) {
            return Err(LoadError::invalid(
                "farm.servers",
                format!("server `{trimmed}` is listed more than once"),
            ));
        }
        servers.push(trimmed.to_string());
    }

    let distributed = farm.distributed.unwrap_or(false);
    if distributed && servers.is_empty() {
        return Err(LoadError::invalid(
            "farm.servers",
            "a distributed farm needs at least one server",
        ));
    }

    Ok(FarmSettings {
        server_identity,
        servers,
        distributed,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    partition_limit: Option<u64>,
    runtime_limit: Option<u64>,
    dispatch_batch_limit: Option<u64>,
    coalesce_type_changes: Option<bool>,
    background_model_rebuild: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFarmSettings {
    server_identity: Option<String>,
    servers: Option<Vec<String>>,
    distributed: Option<bool>,
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

#[cfg(test)]
mod tests;
