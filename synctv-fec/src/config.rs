use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::packet::FecScheme;
use crate::writer::WriterConfig;

/// FEC stage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FecConfig {
    pub scheme: FecScheme,
    pub writer: WriterConfig,
    pub pool: PoolConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Largest repair payload the buffer pool hands out
    pub max_payload_size: usize,
    /// Cap on repair packets alive at once (None = unlimited)
    pub packet_pool_limit: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_payload_size: 1500,
            packet_pool_limit: None,
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate's targets, unless `RUST_LOG` is set.
    pub level: String,
    pub format: LogFormat,
    /// Append to this file instead of stdout.
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file_path: None,
        }
    }
}

impl FecConfig {
    /// Load configuration from multiple sources with priority:
    /// 1. Environment variables (highest priority)
    /// 2. Config file (if provided)
    /// 3. Defaults (lowest priority)
    pub fn load(config_file: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_file {
            if Path::new(path).exists() {
                builder = builder.add_source(File::with_name(path));
            }
        }

        // SYNCTV_FEC_WRITER__N_SOURCE_PACKETS=20, SYNCTV_FEC_SCHEME=ldpc, ...
        builder = builder.add_source(
            Environment::with_prefix("SYNCTV_FEC")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(None)
    }

    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        Self::load(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = FecConfig::default();
        assert_eq!(config.scheme, FecScheme::ReedSolomonM8);
        assert_eq!(config.writer.n_source_packets, 18);
        assert_eq!(config.writer.n_repair_packets, 10);
        assert_eq!(config.pool.max_payload_size, 1500);
        assert!(config.pool.packet_pool_limit.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
scheme = "ldpc"

[writer]
n_source_packets = 4
n_repair_packets = 2

[pool]
packet_pool_limit = 64

[logging]
format = "json"
"#
        )
        .unwrap();

        let config = FecConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.scheme, FecScheme::LdpcStaircase);
        assert_eq!(
            config.writer,
            WriterConfig {
                n_source_packets: 4,
                n_repair_packets: 2
            }
        );
        assert_eq!(config.pool.packet_pool_limit, Some(64));
        assert_eq!(config.pool.max_payload_size, 1500);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = FecConfig::from_file("/nonexistent/synctv-fec.toml").unwrap();
        assert_eq!(config.writer, WriterConfig::default());
    }
}
