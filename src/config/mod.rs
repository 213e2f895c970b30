//! Configuration management for Switchboard gateway
//!
//! Configuration is resolved once at startup (env > toml > default) and then
//! handed to the registry, proxy and notification components by value.

pub mod file;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::registry::DuplicatePolicy;

use self::file::SwitchboardConfigFile;

/// Default devices file, relative to the working directory
pub const DEFAULT_DEVICES_FILE: &str = "config/devices.json";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default telemetry publish timeout
pub const DEFAULT_TELEMETRY_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default body buffering limit (2 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Switchboard gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Device registry configuration
    pub registry: RegistryConfig,

    /// Telemetry sink configuration
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen address
    pub bind: String,

    /// Listen port
    pub port: u16,

    /// Overall timeout for a forwarded request. `None` leaves the call bounded
    /// only by the caller's connection.
    pub backend_timeout: Option<Duration>,

    /// Largest request body buffered for switch inspection
    pub max_body_bytes: usize,
}

/// Device registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Path to the JSON device list
    pub devices_file: PathBuf,

    /// How duplicate device ids are treated on load
    pub duplicate_ids: DuplicatePolicy,

    /// Cache lifetime. `None` re-reads the file on every lookup.
    pub cache_ttl: Option<Duration>,
}

/// Telemetry sink configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// `host:port` of the HTTP-to-MQTT sender; `None` disables publishing
    pub sender_host: Option<String>,

    /// Publish timeout
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: DEFAULT_PORT,
                backend_timeout: None,
                max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            },
            registry: RegistryConfig {
                devices_file: PathBuf::from(DEFAULT_DEVICES_FILE),
                duplicate_ids: DuplicatePolicy::default(),
                cache_ttl: None,
            },
            telemetry: TelemetryConfig {
                sender_host: None,
                timeout: DEFAULT_TELEMETRY_TIMEOUT,
            },
        }
    }
}

impl Config {
    /// Load configuration from the process environment and the TOML file
    ///
    /// `config_path` overrides the standard config file location.
    #[must_use]
    pub fn load(config_path: Option<&Path>) -> Self {
        let fc = file::load_config_file(config_path);
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup (env > toml > default)
    #[must_use]
    pub fn from_sources(fc: SwitchboardConfigFile, env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let server = ServerConfig {
            bind: env("SWITCHBOARD_BIND")
                .or(fc.server.bind)
                .unwrap_or(defaults.server.bind),
            port: env("SWITCHBOARD_PORT")
                .or_else(|| env("PORT"))
                .and_then(|s| s.parse().ok())
                .or(fc.server.port)
                .unwrap_or(defaults.server.port),
            backend_timeout: fc.server.backend_timeout_secs.map(Duration::from_secs),
            max_body_bytes: fc
                .server
                .max_body_bytes
                .unwrap_or(defaults.server.max_body_bytes),
        };

        let registry = RegistryConfig {
            devices_file: env("DEVICES_FILE")
                .or(fc.registry.devices_file)
                .map_or(defaults.registry.devices_file, PathBuf::from),
            duplicate_ids: fc.registry.duplicate_ids.unwrap_or_default(),
            cache_ttl: fc.registry.cache_ttl_secs.map(Duration::from_secs),
        };

        let telemetry = TelemetryConfig {
            sender_host: env("MQTT_SENDER_HOST")
                .or(fc.telemetry.sender_host)
                .filter(|h| !h.is_empty()),
            timeout: env("SWITCHBOARD_TELEMETRY_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .or(fc.telemetry.timeout_ms)
                .map_or(defaults.telemetry.timeout, Duration::from_millis),
        };

        Self {
            server,
            registry,
            telemetry,
        }
    }

    /// Socket address the server listens on
    #[must_use]
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.bind, self.server.port)
    }
}
