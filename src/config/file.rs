use std::fs::File;
use std::io::Read;
use std::path::Path;

use ipnetwork::IpNetwork;
use serde::Deserialize;
use toml;

use super::ConfigError;

struct Defaults {}

impl Defaults {
    fn local_asn() -> u32 {
        210083
    }

    fn local_as_name() -> String {
        "Privex Inc.".to_string()
    }

    fn local_networks() -> Vec<IpNetwork> {
        ["185.130.44.0/22", "2a07:e00::/29"]
            .iter()
            .filter_map(|net| net.parse().ok())
            .collect()
    }

    fn route_source() -> String {
        "localhost:50051".to_string()
    }

    fn database() -> String {
        "lg-prefixes.sqlite3".to_string()
    }

    fn blacklist() -> Vec<IpNetwork> {
        ["0.0.0.0/0", "::/0", "2000::/3"]
            .iter()
            .filter_map(|net| net.parse().ok())
            .collect()
    }

    fn concurrency() -> usize {
        8
    }

    fn status_interval() -> u64 {
        10
    }

    fn prefix_timeout() -> u64 {
        1800
    }
}

/// Config (toml) representation of the importer settings
#[derive(Debug, Deserialize)]
pub(super) struct ImportConfigSpec {
    // Our own AS, used when a route has no AS path
    #[serde(default = "Defaults::local_asn")]
    pub(super) local_asn: u32,
    #[serde(default = "Defaults::local_as_name")]
    pub(super) local_as_name: String,
    // Prefixes originated by us, for routes with a broken AS path
    #[serde(default = "Defaults::local_networks")]
    pub(super) local_networks: Vec<IpNetwork>,

    // GoBGP gRPC endpoint (host:port)
    #[serde(default = "Defaults::route_source")]
    pub(super) route_source: String,
    // SQLite database file
    #[serde(default = "Defaults::database")]
    pub(super) database: String,

    // Routes for these exact networks are never imported
    #[serde(default = "Defaults::blacklist")]
    pub(super) blacklist: Vec<IpNetwork>,
    // Extra exchange ranges, "Name|subnet"
    #[serde(default = "Vec::new")]
    pub(super) ix_ranges: Vec<String>,

    // Max concurrent upserts (and DB connections)
    #[serde(default = "Defaults::concurrency")]
    pub(super) concurrency: usize,
    // Seconds between import progress reports
    #[serde(default = "Defaults::status_interval")]
    pub(super) status_interval: u64,
    // Seconds after the newest last_seen before a prefix is stale
    #[serde(default = "Defaults::prefix_timeout")]
    pub(super) prefix_timeout: u64,
}

impl Default for ImportConfigSpec {
    fn default() -> Self {
        Self {
            local_asn: Defaults::local_asn(),
            local_as_name: Defaults::local_as_name(),
            local_networks: Defaults::local_networks(),
            route_source: Defaults::route_source(),
            database: Defaults::database(),
            blacklist: Defaults::blacklist(),
            ix_ranges: vec![],
            concurrency: Defaults::concurrency(),
            status_interval: Defaults::status_interval(),
            prefix_timeout: Defaults::prefix_timeout(),
        }
    }
}

impl ImportConfigSpec {
    pub(super) fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;
        Self::from_str(&contents)
    }

    pub(super) fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let config: ImportConfigSpec = toml::from_str(contents)?;
        Ok(config)
    }
}

/// Parse an "Name|subnet" exchange range
pub(super) fn parse_ix_range(range: &str) -> Result<(String, IpNetwork), ConfigError> {
    let invalid = || ConfigError::IxRange(range.to_string());
    let mut parts = range.rsplitn(2, '|');
    let subnet = parts.next().ok_or_else(invalid)?.trim();
    let name = parts.next().ok_or_else(invalid)?.trim();
    if name.is_empty() {
        return Err(invalid());
    }
    let subnet: IpNetwork = subnet.parse().map_err(|_| invalid())?;
    Ok((name.to_string(), subnet))
}
