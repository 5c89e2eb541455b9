mod file;

use std::io;
use std::path::Path;
use std::time::Duration;

use ipnetwork::IpNetwork;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unable to read config: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid IX range '{0}', expected \"Name|subnet\"")]
    IxRange(String),
    #[error("Concurrency must be at least 1")]
    Concurrency,
}

/// Parse a TOML config file and return an ImportConfig
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ImportConfig, ConfigError> {
    let spec = file::ImportConfigSpec::from_file(path)?;
    ImportConfig::from_spec(spec)
}

pub fn from_str(contents: &str) -> Result<ImportConfig, ConfigError> {
    let spec = file::ImportConfigSpec::from_str(contents)?;
    ImportConfig::from_spec(spec)
}

/// In-memory importer settings, every key defaulted
#[derive(Clone, Debug)]
pub struct ImportConfig {
    pub local_asn: u32,
    pub local_as_name: String,
    pub local_networks: Vec<IpNetwork>,
    pub route_source: String,
    pub database: String,
    pub blacklist: Vec<IpNetwork>,
    /// Configured exchange ranges, in file order
    pub ix_ranges: Vec<(String, IpNetwork)>,
    pub concurrency: usize,
    pub status_interval: Duration,
    pub prefix_timeout: Duration,
}

impl ImportConfig {
    fn from_spec(spec: file::ImportConfigSpec) -> Result<Self, ConfigError> {
        if spec.concurrency == 0 {
            return Err(ConfigError::Concurrency);
        }
        let ix_ranges = spec
            .ix_ranges
            .iter()
            .map(|range| file::parse_ix_range(range))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::lower(spec, ix_ranges))
    }

    fn lower(spec: file::ImportConfigSpec, ix_ranges: Vec<(String, IpNetwork)>) -> Self {
        Self {
            local_asn: spec.local_asn,
            local_as_name: spec.local_as_name,
            local_networks: spec.local_networks,
            route_source: spec.route_source,
            database: spec.database,
            blacklist: spec.blacklist,
            ix_ranges,
            concurrency: spec.concurrency,
            status_interval: Duration::from_secs(spec.status_interval.max(1)),
            prefix_timeout: Duration::from_secs(spec.prefix_timeout),
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self::lower(file::ImportConfigSpec::default(), vec![])
    }
}
