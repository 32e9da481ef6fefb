//! Configuration file parsing for Rangekeeper
//!
//! Parses `rangekeeper.toml` configuration files using serde

use crate::allocator::ScanStrategy;
use crate::error::{Error, Result};
use crate::range::{Range, range_size};
use ipnet::IpNet;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Load configuration from a file
///
/// A relative state path is resolved against the directory holding the config file.
pub fn load(path: &Path) -> Result<RangekeeperConfig> {
    let content = fs::read_to_string(path).map_err(|e| Error::ConfigRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut config: RangekeeperConfig = toml::from_str(&content)?;

    if config.state.path.is_relative() {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            config.state.path = dir.join(&config.state.path);
        }
    }

    config.validate()?;

    Ok(config)
}

/// Root configuration structure
#[derive(Debug, Deserialize)]
pub struct RangekeeperConfig {
    /// The range being managed
    pub range: RangeConfig,

    /// Where allocation state is persisted
    #[serde(default)]
    pub state: StateConfig,
}

impl RangekeeperConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let network = self.network()?;

        if range_size(&network) <= 2 {
            return Err(Error::ConfigValidation(format!(
                "Range {} has no usable addresses",
                network
            )));
        }

        if self.state.path.as_os_str().is_empty() {
            return Err(Error::ConfigValidation("State path is empty".into()));
        }

        Ok(())
    }

    /// Parsed network block
    pub fn network(&self) -> Result<IpNet> {
        self.range
            .cidr
            .parse()
            .map_err(|e| Error::InvalidCidr(format!("'{}': {}", self.range.cidr, e)))
    }

    /// Build an empty range as configured
    pub fn build_range(&self) -> Result<Range> {
        Range::with_strategy(self.network()?, self.range.strategy)
    }
}

/// Range settings
#[derive(Debug, Clone, Deserialize)]
pub struct RangeConfig {
    /// Network block in CIDR notation (e.g., "10.96.0.0/12")
    pub cidr: String,

    /// How free addresses are picked
    #[serde(default)]
    pub strategy: ScanStrategy,
}

/// State persistence settings
#[derive(Debug, Clone, Deserialize)]
pub struct StateConfig {
    /// State file path
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("rangekeeper-state.json")
}
