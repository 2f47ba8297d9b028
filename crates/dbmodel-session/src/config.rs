//! Data source configuration and connection strings.
//!
//! A connection string is a whitespace separated list of `name=value`
//! pairs, for example `adapter=sqlite db=:memory: debug=1`. `adapter` is
//! required; `debug` and `log_capacity` configure the data source; every
//! other pair is kept as a backend parameter.

use std::collections::BTreeMap;
use std::str::FromStr;

use dbmodel_core::{Dialect, Error, Result};
use serde::{Deserialize, Serialize};

/// Default number of statements kept in the in-memory SQL log.
pub const DEFAULT_LOG_CAPACITY: usize = 100;

/// Configuration for a [`DataSource`](crate::DataSource).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceConfig {
    /// SQL dialect of the backend.
    pub adapter: Dialect,
    /// Backend specific parameters (`db`, `host`, `user`, ...).
    pub params: BTreeMap<String, String>,
    /// Log executed statements at info level instead of debug.
    pub debug: bool,
    /// How many executed statements to keep in the SQL log.
    pub log_capacity: usize,
}

impl Default for DataSourceConfig {
    fn default() -> Self {
        Self {
            adapter: Dialect::default(),
            params: BTreeMap::new(),
            debug: false,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}

impl DataSourceConfig {
    pub fn new(adapter: Dialect) -> Self {
        Self {
            adapter,
            ..Self::default()
        }
    }

    /// Parses a connection string.
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut adapter = None;
        let mut config = Self::default();

        for pair in connection_string.split_whitespace() {
            let (name, value) = pair
                .split_once('=')
                .filter(|(name, value)| !name.is_empty() && !value.is_empty())
                .ok_or_else(|| {
                    Error::Config(format!(
                        "illegal connection string {connection_string:?}: expected name=value, got {pair:?}"
                    ))
                })?;
            match name {
                "adapter" => {
                    adapter = Some(Dialect::from_adapter(value).ok_or_else(|| {
                        Error::Config(format!("unknown adapter {value:?}"))
                    })?);
                }
                "debug" => config.debug = !matches!(value, "0" | "false" | "no" | "off"),
                "log_capacity" => {
                    config.log_capacity = value.parse().map_err(|_| {
                        Error::Config(format!("log_capacity must be a number, got {value:?}"))
                    })?;
                }
                _ => {
                    config.params.insert(name.to_string(), value.to_string());
                }
            }
        }

        config.adapter = adapter.ok_or_else(|| {
            Error::Config(format!(
                "illegal connection string {connection_string:?}: no adapter"
            ))
        })?;
        Ok(config)
    }

    /// Set a backend parameter.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    pub fn get_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }
}

impl FromStr for DataSourceConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
