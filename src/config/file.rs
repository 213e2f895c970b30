//! TOML configuration file loading
//!
//! Supports `~/.config/switchboard/config.toml` as a persistent config source.
//! All fields are optional. The file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::registry::DuplicatePolicy;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SwitchboardConfigFile {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerFileConfig,

    /// Device registry configuration
    #[serde(default)]
    pub registry: RegistryFileConfig,

    /// Telemetry sink configuration
    #[serde(default)]
    pub telemetry: TelemetryFileConfig,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// Listen address
    pub bind: Option<String>,

    /// Listen port
    pub port: Option<u16>,

    /// Overall timeout for a forwarded request, in seconds
    pub backend_timeout_secs: Option<u64>,

    /// Largest request body buffered for switch inspection
    pub max_body_bytes: Option<usize>,
}

/// Device registry configuration
#[derive(Debug, Default, Deserialize)]
pub struct RegistryFileConfig {
    /// Path to the JSON device list
    pub devices_file: Option<String>,

    /// How duplicate device ids are treated on load
    pub duplicate_ids: Option<DuplicatePolicy>,

    /// Opt in to caching the device list for this many seconds
    pub cache_ttl_secs: Option<u64>,
}

/// Telemetry sink configuration
#[derive(Debug, Default, Deserialize)]
pub struct TelemetryFileConfig {
    /// `host:port` of the HTTP-to-MQTT sender
    pub sender_host: Option<String>,

    /// Publish timeout in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Load the TOML config file from `path`, or from the standard path when `None`
///
/// Returns `SwitchboardConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file(path: Option<&Path>) -> SwitchboardConfigFile {
    let Some(path) = path.map(Path::to_path_buf).or_else(config_file_path) else {
        return SwitchboardConfigFile::default();
    };

    if !path.exists() {
        return SwitchboardConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                SwitchboardConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            SwitchboardConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/switchboard/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    let base = directories::BaseDirs::new()?;
    Some(base.config_dir().join("switchboard").join("config.toml"))
}
