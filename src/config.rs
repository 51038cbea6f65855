//! Listener configuration.
//!
//! Values are layered, later sources overriding earlier ones:
//! built-in defaults, the config file, `TLS_ENDPOINT_*` environment variables and
//! finally explicit overrides (the command line).

use std::{path::PathBuf, time::Duration};

use ::config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;

use crate::http::request::DEFAULT_MAX_HEADER_BYTES;

/// Config file looked up in the working directory when none is given explicitly (any supported extension).
pub const DEFAULT_CONFIG_NAME: &str = "tls-endpoint";
/// Prefix of the environment variables read, e.g. `TLS_ENDPOINT_BIND_PORT`.
pub const ENV_PREFIX: &str = "TLS_ENDPOINT";

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1";
const DEFAULT_BIND_PORT: i64 = 8080;
const DEFAULT_CERT_PATH: &str = "cert.pem";
const DEFAULT_KEY_PATH: &str = "key.pem";
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Represents the kind of error that can occur while loading the configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A source could not be read or a value has the wrong type.
    #[error("failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    /// Port 0 was configured.
    #[error("bind port must be between 1 and 65535")]
    InvalidPort,

    /// The bind address is empty.
    #[error("bind address must not be empty")]
    EmptyAddress,

    /// A limit or timeout was configured as zero.
    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),
}

/// Everything the secure listener needs to start.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenerConfig {
    /// Host name or IP address to bind.
    pub bind_address: String,
    /// TCP port to bind, 1–65535.
    pub bind_port: u16,
    /// PEM certificate chain, leaf first.
    pub cert_path: PathBuf,
    /// PEM private key matching the leaf certificate.
    pub key_path: PathBuf,
    /// Seconds a client gets to complete the TLS handshake.
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout_secs: u64,
    /// Seconds a client gets to send the request line and headers.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum size of request line plus headers.
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Default `tracing` filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

const fn default_handshake_timeout() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_SECS
}
const fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
const fn default_max_header_bytes() -> usize {
    DEFAULT_MAX_HEADER_BYTES
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.into()
}

/// Values that take precedence over every other configuration source.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Explicit config file; it must exist when given.
    pub config_file: Option<PathBuf>,
    /// Overrides `bind_address`.
    pub bind_address: Option<String>,
    /// Overrides `bind_port`.
    pub bind_port: Option<u16>,
    /// Overrides `cert_path`.
    pub cert_path: Option<PathBuf>,
    /// Overrides `key_path`.
    pub key_path: Option<PathBuf>,
}

impl ListenerConfig {
    /// Creates a configuration with the default timeouts and limits.
    #[must_use]
    pub fn new(
        bind_address: impl Into<String>,
        bind_port: u16,
        cert_path: impl Into<PathBuf>,
        key_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            bind_address: bind_address.into(),
            bind_port,
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            handshake_timeout_secs: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            log_level: default_log_level(),
        }
    }

    /// Loads the layered configuration and validates it.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a source cannot be read, a value cannot be converted or validation fails.
    pub fn load(overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let file = match &overrides.config_file {
            Some(path) => File::from(path.as_path()).required(true),
            None => File::with_name(DEFAULT_CONFIG_NAME).required(false),
        };

        let config: Self = Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("bind_port", DEFAULT_BIND_PORT)?
            .set_default("cert_path", DEFAULT_CERT_PATH)?
            .set_default("key_path", DEFAULT_KEY_PATH)?
            .add_source(file)
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .set_override_option("bind_address", overrides.bind_address.clone())?
            .set_override_option("bind_port", overrides.bind_port.map(i64::from))?
            .set_override_option(
                "cert_path",
                overrides
                    .cert_path
                    .as_ref()
                    .map(|path| path.display().to_string()),
            )?
            .set_override_option(
                "key_path",
                overrides
                    .key_path
                    .as_ref()
                    .map(|path| path.display().to_string()),
            )?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` describing the first violated constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::EmptyAddress);
        }
        if self.handshake_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("handshake_timeout_secs"));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroValue("request_timeout_secs"));
        }
        if self.max_header_bytes == 0 {
            return Err(ConfigError::ZeroValue("max_header_bytes"));
        }
        Ok(())
    }

    /// The bind target formatted as `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.bind_port)
        } else {
            format!("{}:{}", self.bind_address, self.bind_port)
        }
    }

    /// Handshake timeout as a `Duration`.
    #[must_use]
    pub const fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use crate::config::{ConfigError, ConfigOverrides, ListenerConfig};

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "tls-endpoint-config-{}-{name}.toml",
            std::process::id()
        ));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn new_uses_default_limits() {
        let config = ListenerConfig::new("127.0.0.1", 8443, "cert.pem", "key.pem");

        assert_eq!(config.handshake_timeout_secs, 10);
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.max_header_bytes, 8192);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn file_values_are_read_and_overrides_win() {
        let path = write_config(
            "layered",
            "bind_address = \"0.0.0.0\"\n\
             bind_port = 9443\n\
             cert_path = \"/etc/tls/cert.pem\"\n\
             key_path = \"/etc/tls/key.pem\"\n\
             request_timeout_secs = 3\n",
        );
        let overrides = ConfigOverrides {
            config_file: Some(path.clone()),
            bind_port: Some(10443),
            ..ConfigOverrides::default()
        };

        let config = ListenerConfig::load(&overrides).unwrap();
        std::fs::remove_file(path).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0");
        assert_eq!(config.bind_port, 10443);
        assert_eq!(config.cert_path, PathBuf::from("/etc/tls/cert.pem"));
        assert_eq!(config.request_timeout_secs, 3);
        assert_eq!(config.handshake_timeout_secs, 10);
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let overrides = ConfigOverrides {
            config_file: Some(PathBuf::from("/nonexistent/tls-endpoint.toml")),
            ..ConfigOverrides::default()
        };

        let result = ListenerConfig::load(&overrides);

        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn port_zero_is_rejected() {
        let path = write_config(
            "port-zero",
            "bind_address = \"127.0.0.1\"\nbind_port = 0\ncert_path = \"c\"\nkey_path = \"k\"\n",
        );
        let overrides = ConfigOverrides {
            config_file: Some(path.clone()),
            ..ConfigOverrides::default()
        };

        let result = ListenerConfig::load(&overrides);
        std::fs::remove_file(path).unwrap();

        assert!(matches!(result, Err(ConfigError::InvalidPort)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = ListenerConfig::new("127.0.0.1", 8443, "cert.pem", "key.pem");
        config.handshake_timeout_secs = 0;

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ZeroValue("handshake_timeout_secs"))
        ));
    }

    #[test]
    fn ipv6_address_is_bracketed() {
        let config = ListenerConfig::new("::1", 8443, "cert.pem", "key.pem");
        assert_eq!(config.address(), "[::1]:8443");

        let config = ListenerConfig::new("localhost", 8443, "cert.pem", "key.pem");
        assert_eq!(config.address(), "localhost:8443");
    }
}
