//! Configuration management

use anyhow::Result;
use serde::Deserialize;
use std::net::IpAddr;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// Upper bound on bytes read from a single connection.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,
    /// Overall deadline for the payload read.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessConfig {
    /// Peers to ignore entirely (no event recorded).
    #[serde(default)]
    pub allow: Vec<String>,
    /// Peers to reject before capture. Checked before the allow list.
    #[serde(default)]
    pub deny: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    /// Case-insensitive regex rules evaluated in order.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// Base URL of the IP directory; the source IP is appended as a path segment.
    #[serde(default = "default_geo_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_geo_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_journal_path")]
    pub journal_path: String,
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9999
}

fn default_max_payload_bytes() -> usize {
    2048
}

fn default_read_timeout_secs() -> u64 {
    5
}

fn default_patterns() -> Vec<String> {
    [
        r"(select|union|insert|drop|delete|update).*",
        r"(cmd|powershell|bash|sh).*",
        r"(\.\./|\%2e\%2e/)",
        r"(wget|curl|nc|ncat|telnet).*",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

fn default_geo_endpoint() -> String {
    "http://ip-api.com/json".to_string()
}

fn default_geo_timeout_secs() -> u64 {
    5
}

fn default_journal_path() -> String {
    "decoy_events.jsonl".to_string()
}

fn default_db_path() -> String {
    "decoy_events.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
        }
    }
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            endpoint: default_geo_endpoint(),
            timeout_secs: default_geo_timeout_secs(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
            db_path: default_db_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("config.toml").required(false))
            .add_source(config::Environment::with_prefix("NETDECOY").separator("__"));

        let settings = builder.build()?;
        let config: Config = settings.try_deserialize()?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Invalid port: 0 is not allowed");
        }
        if self.server.host.is_empty() {
            anyhow::bail!("Server host cannot be empty");
        }

        if self.capture.max_payload_bytes == 0 {
            anyhow::bail!("max_payload_bytes must be at least 1");
        }
        if self.capture.read_timeout_secs == 0 {
            anyhow::bail!("read_timeout_secs must be at least 1");
        }

        for entry in self.access.allow.iter().chain(self.access.deny.iter()) {
            if entry.parse::<IpAddr>().is_err() {
                anyhow::bail!("Invalid IP address in access lists: '{}'", entry);
            }
        }

        if self.classifier.patterns.is_empty() {
            anyhow::bail!("Classifier pattern list cannot be empty");
        }

        if self.geo.endpoint.is_empty() {
            anyhow::bail!("Geo endpoint cannot be empty");
        }

        if self.storage.journal_path.is_empty() || self.storage.db_path.is_empty() {
            anyhow::bail!("Storage paths cannot be empty");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!(
                "Invalid logging level '{}'. Must be one of: {:?}",
                self.logging.level,
                valid_levels
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.capture.max_payload_bytes, 2048);
        assert_eq!(config.classifier.patterns.len(), 4);
    }

    #[test]
    fn rejects_bad_access_list_entry() {
        let mut config = Config::default();
        config.access.deny = vec!["not-an-ip".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_capture_bound() {
        let mut config = Config::default();
        config.capture.max_payload_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_unknown_logging_level() {
        let mut config = Config::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }
}
