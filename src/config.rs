//! # Configuration Management
//!
//! Centralized configuration for the UAP session protocol.
//!
//! This module holds the protocol constants shared by every layer (magic
//! number, version, header size) and structured configuration for the server
//! and client, including timeouts and retry bounds.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults

use crate::error::{ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Magic number identifying UAP datagrams on the wire.
pub const PROTOCOL_MAGIC: u16 = 0xC461;

/// Current supported protocol version
pub const PROTOCOL_VERSION: u8 = 1;

/// Fixed wire size of the message header in bytes.
pub const HEADER_LEN: usize = 24;

/// Max allowed payload size for a single DATA message. Bounded well under
/// the UDP datagram ceiling so a hostile length field cannot force a large
/// allocation.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Default UDP port for the server.
pub const DEFAULT_PORT: u16 = 12345;

/// Default server-side inactivity timeout before a silent session is closed.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default client-side wait for a HELLO or ALIVE reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of response timeouts the client tolerates before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Top-level configuration containing both roles' settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct UapConfig {
    /// Server-specific configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Client-specific configuration
    #[serde(default)]
    pub client: ClientConfig,
}

impl UapConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Validate the configuration for common issues and misconfigurations.
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.server.validate());
        errors.extend(self.client.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Server-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// UDP listen address (e.g., "0.0.0.0:12345")
    pub address: String,

    /// How long a session may stay silent before the server closes it
    #[serde(with = "duration_serde")]
    pub inactivity_timeout: Duration,

    /// Maximum number of queued outbound datagrams before senders block
    pub backpressure_limit: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: format!("0.0.0.0:{DEFAULT_PORT}"),
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            backpressure_limit: 32,
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "invalid server address format: '{}' (expected format: '0.0.0.0:12345')",
                self.address
            ));
        }

        if self.inactivity_timeout.as_millis() < 100 {
            errors.push("inactivity timeout too short (minimum: 100ms)".to_string());
        } else if self.inactivity_timeout.as_secs() > 300 {
            errors.push("inactivity timeout too long (maximum: 300s)".to_string());
        }

        if self.backpressure_limit == 0 {
            errors.push("backpressure limit must be greater than 0".to_string());
        }

        errors
    }
}

/// Client-specific configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Target server address ("host:port"; hostnames are resolved at connect)
    pub address: String,

    /// How long to wait for a HELLO or ALIVE reply before retrying
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,

    /// Number of response timeouts tolerated before the session is abandoned
    pub max_retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            address: format!("127.0.0.1:{DEFAULT_PORT}"),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl ClientConfig {
    /// Validate client configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("client address cannot be empty".to_string());
        } else if !self.address.contains(':') {
            errors.push(format!(
                "invalid client address format: '{}' (expected format: 'host:port')",
                self.address
            ));
        }

        if self.response_timeout.as_millis() < 100 {
            errors.push("response timeout too short (minimum: 100ms)".to_string());
        } else if self.response_timeout.as_secs() > 300 {
            errors.push("response timeout too long (maximum: 300s)".to_string());
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(UapConfig::default().validate().is_empty());
    }

    #[test]
    fn bad_server_address_is_flagged() {
        let config = ServerConfig {
            address: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("invalid server address"));
    }

    #[test]
    fn short_timeout_is_flagged() {
        let config = ClientConfig {
            response_timeout: Duration::from_millis(5),
            ..ClientConfig::default()
        };
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn toml_roundtrip() {
        let toml = r#"
            [server]
            address = "127.0.0.1:9999"
            inactivity_timeout = 2500
            backpressure_limit = 8

            [client]
            address = "example.com:9999"
            response_timeout = 1000
            max_retries = 5
        "#;
        let config = UapConfig::from_toml(toml).unwrap();
        assert_eq!(config.server.address, "127.0.0.1:9999");
        assert_eq!(config.server.inactivity_timeout, Duration::from_millis(2500));
        assert_eq!(config.client.max_retries, 5);
        assert!(config.validate_strict().is_ok());
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config = UapConfig::from_toml("[server]\naddress = \"0.0.0.0:7000\"\n").unwrap();
        assert_eq!(config.server.address, "0.0.0.0:7000");
        assert_eq!(config.client.max_retries, DEFAULT_MAX_RETRIES);
    }
}
