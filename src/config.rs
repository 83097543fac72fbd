//! # Configuration Management
//!
//! Centralized configuration for framing, dispatch, sessions and the TCP surface.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`
//!
//! ## Security Considerations
//! - `max_body_length` bounds every peer-declared body before any allocation
//! - The dispatch queue limit bounds memory held for slow handlers

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Default cap on a frame body, shared by decoder and encoder (16 KB)
pub const DEFAULT_MAX_BODY_LENGTH: u16 = 16 * 1024;

/// Default number of decoded packages waiting for the dispatch worker
pub const DEFAULT_DISPATCH_QUEUE_LIMIT: usize = 32;

/// Default timeout for session teardown
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProtocolConfig {
    /// Wire framing configuration
    #[serde(default)]
    pub framing: FramingConfig,

    /// Handler routing configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Per-connection session configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// TCP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProtocolConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PACKAGE_PROTOCOL_MAX_BODY_LENGTH") {
            config.framing.max_body_length = value.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid PACKAGE_PROTOCOL_MAX_BODY_LENGTH: {e}"))
            })?;
        }

        if let Ok(value) = std::env::var("PACKAGE_PROTOCOL_DISPATCH_QUEUE_LIMIT") {
            if let Ok(val) = value.parse::<usize>() {
                config.session.dispatch_queue_limit = val;
            }
        }

        if let Ok(value) = std::env::var("PACKAGE_PROTOCOL_SHUTDOWN_TIMEOUT_MS") {
            if let Ok(val) = value.parse::<u64>() {
                config.session.shutdown_timeout = Duration::from_millis(val);
            }
        }

        if let Ok(addr) = std::env::var("PACKAGE_PROTOCOL_SERVER_ADDRESS") {
            config.server.address = addr;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.framing.validate());
        errors.extend(self.session.validate());
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Wire framing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FramingConfig {
    /// Largest body a frame may declare, enforced on decode and encode
    pub max_body_length: u16,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
        }
    }
}

impl FramingConfig {
    /// Validate framing configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.max_body_length == 0 {
            errors.push("Max body length must be greater than 0".to_string());
        }
        errors
    }
}

/// How a package is matched against registered handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingPolicy {
    /// Exact `(id, type)` routes first, then type-wide routes
    #[default]
    IdAndType,
    /// Only the type participates in routing
    TypeOnly,
}

/// What happens when no handler matches a package
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissPolicy {
    /// Drop the package and log a warning
    #[default]
    Report,
    /// Drop the package, logging only at trace level
    Silent,
}

/// Handler routing configuration
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub routing: RoutingPolicy,

    #[serde(default)]
    pub miss_policy: MissPolicy,
}

/// Per-connection session configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Decoded packages allowed to wait for the dispatch worker before reads pause
    pub dispatch_queue_limit: usize,

    /// Outbound packages allowed to wait for the writer
    pub outbound_queue_limit: usize,

    /// Size of each transport read
    pub read_buffer_size: usize,

    /// How long teardown waits for an in-flight handler
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            dispatch_queue_limit: DEFAULT_DISPATCH_QUEUE_LIMIT,
            outbound_queue_limit: 64,
            read_buffer_size: 8 * 1024,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.dispatch_queue_limit == 0 {
            errors.push("Dispatch queue limit must be greater than 0".to_string());
        } else if self.dispatch_queue_limit > 1_000_000 {
            errors.push(format!(
                "Dispatch queue limit too large: {} (max recommended: 1,000,000)",
                self.dispatch_queue_limit
            ));
        }

        if self.outbound_queue_limit == 0 {
            errors.push("Outbound queue limit must be greater than 0".to_string());
        }

        if self.read_buffer_size < 64 {
            errors.push("Read buffer size too small (minimum: 64 bytes)".to_string());
        } else if self.read_buffer_size > 16 * 1024 * 1024 {
            errors.push("Read buffer size too large (maximum: 16 MB)".to_string());
        }

        if self.shutdown_timeout.as_millis() < 10 {
            errors.push("Shutdown timeout too short (minimum: 10ms)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// TCP server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server listen address (e.g., "127.0.0.1:9000")
    pub address: String,

    /// Maximum number of concurrent connections
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9000"),
            max_connections: 1000,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("Server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid server address format: '{}' (expected format: '0.0.0.0:8080')",
                self.address
            ));
        }

        if self.max_connections == 0 {
            errors.push("Max connections must be greater than 0".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("package-protocol"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
