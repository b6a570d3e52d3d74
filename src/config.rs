//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use crate::dsu::protocol::DSU_DEFAULT_PORT;
use crate::error::{BridgeError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub dsu: DsuConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub feeder: FeederConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// DSU UDP server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DsuConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_dsu_port")]
    pub port: u16,

    #[serde(default = "default_stream_rate_hz")]
    pub stream_rate_hz: u32,

    /// Forget a silent client after this long. 0 keeps the single client
    /// forever; the multi-client registry then uses its own 5 s default.
    #[serde(default)]
    pub client_timeout_ms: u64,

    /// Stream to every subscribed client instead of only the last sender
    #[serde(default)]
    pub multi_client: bool,
}

/// WebSocket listener configuration
#[derive(Debug, Deserialize, Clone)]
pub struct WebSocketConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_websocket_port")]
    pub port: u16,
}

/// Virtual gamepad feeder configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FeederConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_feeder_command")]
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,
}

// Default value functions
fn default_bind_address() -> String { "0.0.0.0".to_string() }
fn default_dsu_port() -> u16 { DSU_DEFAULT_PORT }
fn default_stream_rate_hz() -> u32 { 250 }

fn default_websocket_port() -> u16 { 26759 }

fn default_feeder_command() -> String { "vigem-feeder".to_string() }

fn default_log_level() -> String { "info".to_string() }

impl Default for DsuConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_dsu_port(),
            stream_rate_hz: default_stream_rate_hz(),
            client_timeout_ms: 0,
            multi_client: false,
        }
    }
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_websocket_port(),
        }
    }
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            command: default_feeder_command(),
            args: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

fn invalid(message: impl std::fmt::Display) -> BridgeError {
    BridgeError::Config(toml::de::Error::custom(message))
}

fn socket_addr(bind_address: &str, port: u16) -> Result<SocketAddr> {
    let ip: IpAddr = bind_address
        .parse()
        .map_err(|_| invalid(format!("invalid bind address: {}", bind_address)))?;
    Ok(SocketAddr::new(ip, port))
}

impl DsuConfig {
    /// Address the DSU socket binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.bind_address, self.port)
    }

    /// Client inactivity timeout, `None` when disabled
    pub fn client_timeout(&self) -> Option<Duration> {
        (self.client_timeout_ms > 0).then(|| Duration::from_millis(self.client_timeout_ms))
    }
}

impl WebSocketConfig {
    /// Address the WebSocket listener binds to
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        socket_addr(&self.bind_address, self.port)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use vr_dsu_bridge::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // Bind addresses must parse as IPs
        let dsu_addr = self.dsu.socket_addr()?;
        let websocket_addr = self.websocket.socket_addr()?;

        if self.dsu.port == 0 {
            return Err(invalid("dsu port cannot be 0"));
        }

        if self.websocket.port == 0 {
            return Err(invalid("websocket port cannot be 0"));
        }

        if dsu_addr.port() == websocket_addr.port() {
            return Err(invalid("dsu and websocket ports must differ"));
        }

        if self.dsu.stream_rate_hz == 0 || self.dsu.stream_rate_hz > 1000 {
            return Err(invalid("stream_rate_hz must be between 1 and 1000"));
        }

        if self.dsu.client_timeout_ms > 600_000 {
            return Err(invalid("client_timeout_ms must be between 0 and 600000"));
        }

        if self.feeder.enabled && self.feeder.command.trim().is_empty() {
            return Err(invalid("feeder command cannot be empty when enabled"));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(invalid(format!(
                "log level must be one of: {}",
                LOG_LEVELS.join(", ")
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(contents.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        temp_file
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dsu.port, 26760);
        assert_eq!(config.dsu.stream_rate_hz, 250);
        assert_eq!(config.websocket.port, 26759);
        assert!(!config.dsu.multi_client);
        assert!(!config.feeder.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_config_from_file() {
        let temp_file = write_config(
            r#"
[dsu]
port = 26761
client_timeout_ms = 5000
multi_client = true

[websocket]
bind_address = "127.0.0.1"

[feeder]
enabled = true
command = "feeder.exe"
args = ["--quiet"]

[logging]
level = "debug"
directory = "./logs"
"#,
        );

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.dsu.port, 26761);
        assert_eq!(config.dsu.bind_address, "0.0.0.0");
        assert_eq!(config.dsu.client_timeout(), Some(Duration::from_secs(5)));
        assert!(config.dsu.multi_client);
        assert_eq!(
            config.websocket.socket_addr().unwrap(),
            "127.0.0.1:26759".parse().unwrap()
        );
        assert_eq!(config.feeder.args, vec!["--quiet".to_string()]);
        assert_eq!(config.logging.directory, "./logs");
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let temp_file = write_config("");
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.dsu.port, 26760);
        assert_eq!(config.dsu.client_timeout(), None);
    }

    #[test]
    fn test_missing_file() {
        let result = Config::load("/nonexistent/vr-dsu-bridge.toml");
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }

    #[test]
    fn test_invalid_toml() {
        let temp_file = write_config("[dsu\nport = ");
        assert!(matches!(Config::load(temp_file.path()), Err(BridgeError::Config(_))));
    }

    #[test]
    fn test_invalid_bind_address() {
        let mut config = Config::default();
        config.dsu.bind_address = "not-an-ip".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.websocket.bind_address = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ports() {
        let mut config = Config::default();
        config.dsu.port = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.websocket.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ports_must_differ() {
        let mut config = Config::default();
        config.websocket.port = config.dsu.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_stream_rate_bounds() {
        let mut config = Config::default();
        config.dsu.stream_rate_hz = 0;
        assert!(config.validate().is_err());

        config.dsu.stream_rate_hz = 1001;
        assert!(config.validate().is_err());

        config.dsu.stream_rate_hz = 1000;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_timeout_too_high() {
        let mut config = Config::default();
        config.dsu.client_timeout_ms = 600_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_feeder_command_when_enabled() {
        let mut config = Config::default();
        config.feeder.command = String::new();
        assert!(config.validate().is_ok());

        config.feeder.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let mut config = Config::default();
        config.logging.level = "WARN".to_string();
        assert!(config.validate().is_ok());

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }
}
