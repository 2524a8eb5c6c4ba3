/// Configuration management for the reef client.
///
/// Mirrors the teacher's typed, serde+toml configuration layer: a top-level
/// `Config` aggregating per-concern sub-configs, with `load_from_file` /
/// `save_to_file` / `validate()`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Top-level reef configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub client: ClientConfig,
    pub topology: TopologyConfig,
    pub lock: LockConfig,
    pub logging: LoggingConfig,
}

/// Per-connection tunables shared by every `DirectClient` (§4.4, §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Per-operation response deadline in milliseconds.
    pub operation_timeout_ms: u64,
    /// Heartbeat PING period in milliseconds; a channel idle longer than
    /// this sends an unsolicited PING.
    pub ping_period_ms: u64,
    /// Payload size, in bytes, above which `CompressingCodec` compresses.
    pub compression_threshold_bytes: usize,
    /// Execution time, in milliseconds, above which a "slow call" event is
    /// emitted via the observer hooks.
    pub slow_execution_threshold_ms: u64,
    /// Rebuild-thread tick interval, in milliseconds, for `ClientList`.
    pub rebuild_interval_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            connect_timeout_ms: 1_000,
            operation_timeout_ms: 1_000,
            ping_period_ms: 30_000,
            compression_threshold_bytes: 16 * 1024,
            slow_execution_threshold_ms: 100,
            rebuild_interval_ms: 5_000,
        }
    }
}

/// How the client fleet is organized: a single node, a statically
/// configured master/replica pair, or a Redis Cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode")]
pub enum TopologyConfig {
    #[serde(rename = "standalone")]
    Standalone { host: String },

    #[serde(rename = "replicated")]
    Replicated {
        master: String,
        slaves: Vec<String>,
    },

    #[serde(rename = "cluster")]
    Cluster {
        /// Bootstrap hosts used to discover the slot map via `CLUSTER SLOTS`.
        bootstrap_hosts: Vec<String>,
        /// Bounded retry count for MOVED/ASK redirection hops.
        max_redirects: u8,
        /// How often the router re-issues `CLUSTER SLOTS` in the background.
        slot_refresh_interval_sec: u64,
    },
}

/// `DistributedLock` defaults (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    pub validity_sec: u64,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        LockConfig {
            validity_sec: 5,
            min_delay_ms: 1,
            max_delay_ms: 10,
            timeout_ms: 500,
        }
    }
}

/// Logging configuration, unchanged in shape from the teacher.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub stdout: bool,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            format: "text".to_string(),
            stdout: true,
            file: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            client: ClientConfig::default(),
            topology: TopologyConfig::Standalone {
                host: "127.0.0.1:6379".to_string(),
            },
            lock: LockConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;
        fs::write(path, content).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client.connect_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.client.operation_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "operation_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.client.ping_period_ms == 0 {
            return Err(ConfigError::ValidationError(
                "ping_period_ms must be greater than 0".to_string(),
            ));
        }

        match &self.topology {
            TopologyConfig::Standalone { host } => {
                validate_host(host)?;
            }
            TopologyConfig::Replicated { master, slaves } => {
                validate_host(master)?;
                if slaves.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "slaves cannot be empty in replicated mode".to_string(),
                    ));
                }
                for slave in slaves {
                    validate_host(slave)?;
                }
            }
            TopologyConfig::Cluster {
                bootstrap_hosts,
                max_redirects,
                ..
            } => {
                if bootstrap_hosts.is_empty() {
                    return Err(ConfigError::ValidationError(
                        "bootstrap_hosts cannot be empty in cluster mode".to_string(),
                    ));
                }
                for host in bootstrap_hosts {
                    validate_host(host)?;
                }
                if *max_redirects == 0 {
                    return Err(ConfigError::ValidationError(
                        "max_redirects must be greater than 0".to_string(),
                    ));
                }
            }
        }

        if self.lock.validity_sec == 0 {
            return Err(ConfigError::ValidationError(
                "lock validity_sec must be greater than 0".to_string(),
            ));
        }
        if self.lock.min_delay_ms > self.lock.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "lock min_delay_ms must be <= max_delay_ms".to_string(),
            ));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "invalid log level: {}",
                    other
                )))
            }
        }
        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "invalid log format: {}",
                    other
                )))
            }
        }

        Ok(())
    }

    /// Create an example configuration file for one of the three topology
    /// modes (`standalone`, `replicated`, `cluster`).
    pub fn create_example_config<P: AsRef<Path>>(path: P, mode: &str) -> Result<(), ConfigError> {
        let config = match mode {
            "standalone" => Config {
                topology: TopologyConfig::Standalone {
                    host: "10.0.1.10:6379".to_string(),
                },
                ..Default::default()
            },
            "replicated" => Config {
                topology: TopologyConfig::Replicated {
                    master: "10.0.1.10:6379".to_string(),
                    slaves: vec!["10.0.1.11:6379".to_string(), "10.0.1.12:6379".to_string()],
                },
                ..Default::default()
            },
            "cluster" => Config {
                topology: TopologyConfig::Cluster {
                    bootstrap_hosts: vec![
                        "10.0.1.20:6379".to_string(),
                        "10.0.1.21:6379".to_string(),
                        "10.0.1.22:6379".to_string(),
                    ],
                    max_redirects: 5,
                    slot_refresh_interval_sec: 60,
                },
                ..Default::default()
            },
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "mode must be 'standalone', 'replicated' or 'cluster', got '{}'",
                    other
                )))
            }
        };

        config.save_to_file(path)
    }
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    let (name, port) = host
        .rsplit_once(':')
        .ok_or_else(|| ConfigError::ValidationError(format!("invalid host:port '{}'", host)))?;
    if name.is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "invalid host:port '{}'",
            host
        )));
    }
    port.parse::<u16>()
        .map_err(|_| ConfigError::ValidationError(format!("invalid port in '{}'", host)))?;
    Ok(())
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("serialize error: {0}")]
    SerializeError(String),

    #[error("validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = Config::default();
        config.client.connect_timeout_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_empty_slave_list() {
        let config = Config {
            topology: TopologyConfig::Replicated {
                master: "127.0.0.1:6379".to_string(),
                slaves: vec![],
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_malformed_host() {
        let config = Config {
            topology: TopologyConfig::Standalone {
                host: "not-a-host-port".to_string(),
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_lock_delay_bounds() {
        let mut config = Config::default();
        config.lock.min_delay_ms = 20;
        config.lock.max_delay_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert!(parsed.validate().is_ok());
    }

    #[test]
    fn round_trips_through_file() {
        let config = Config::default();
        let file = NamedTempFile::new().unwrap();
        config.save_to_file(file.path()).unwrap();
        let loaded = Config::load_from_file(file.path()).unwrap();
        assert!(loaded.validate().is_ok());
    }

    #[test]
    fn example_config_covers_every_mode() {
        for mode in ["standalone", "replicated", "cluster"] {
            let file = NamedTempFile::new().unwrap();
            Config::create_example_config(file.path(), mode).unwrap();
            let loaded = Config::load_from_file(file.path()).unwrap();
            assert!(loaded.validate().is_ok());
        }
    }
}
