//! Device registry
//!
//! Maps opaque device ids to backend hosts. The registry is read-only at
//! runtime: every lookup asks a [`DeviceSource`] for the current device list,
//! so edits to the devices file are picked up without a restart.

mod source;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use source::{CachedSource, DeviceSource, FileSource};

use crate::config::RegistryConfig;
use crate::{Error, Result};

/// A routable device entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Unique device identifier
    #[serde(alias = "DeviceId")]
    pub id: String,

    /// Display name
    #[serde(default, alias = "Name")]
    pub name: String,

    /// Backend address as `host:port`, without scheme
    #[serde(default, alias = "Host")]
    pub host: String,

    /// Whether requests may be forwarded to this device
    #[serde(rename = "enable", default, alias = "Enable", alias = "enabled")]
    pub enabled: bool,
}

impl Device {
    /// A device without a host can never be forwarded to
    #[must_use]
    pub fn is_routable(&self) -> bool {
        !self.host.is_empty()
    }
}

/// How a device list with repeated ids is loaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Fail the load with [`Error::DuplicateDevice`]
    #[default]
    Reject,
    /// Keep every entry in the listing; lookups return the last one
    LastWins,
}

/// Ordered device list with an id index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Registry {
    devices: Vec<Device>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl Registry {
    /// Build a registry, preserving the order of `devices`
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateDevice`] if an id repeats under [`DuplicatePolicy::Reject`]
    pub fn from_devices(devices: Vec<Device>, policy: DuplicatePolicy) -> Result<Self> {
        let mut index = HashMap::with_capacity(devices.len());
        for (position, device) in devices.iter().enumerate() {
            let previous = index.insert(device.id.clone(), position);
            if previous.is_some() && policy == DuplicatePolicy::Reject {
                return Err(Error::DuplicateDevice(device.id.clone()));
            }
        }
        Ok(Self { devices, index })
    }

    /// Parse the on-disk JSON device list
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] for malformed content, or
    /// [`Error::DuplicateDevice`] per `policy`
    pub fn parse(bytes: &[u8], policy: DuplicatePolicy) -> Result<Self> {
        let devices: Vec<Device> = serde_json::from_slice(bytes)?;
        Self::from_devices(devices, policy)
    }

    /// Look up a device by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.index.get(id).map(|&position| &self.devices[position])
    }

    /// All devices in file order, enabled or not
    #[must_use]
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

/// Resolves device ids against the configured [`DeviceSource`]
#[derive(Clone)]
pub struct DeviceRegistry {
    source: Arc<dyn DeviceSource>,
}

impl std::fmt::Debug for DeviceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRegistry")
            .field("source", &self.source.describe())
            .finish()
    }
}

impl DeviceRegistry {
    /// Create a registry over an explicit source
    #[must_use]
    pub fn new(source: Arc<dyn DeviceSource>) -> Self {
        Self { source }
    }

    /// Build the source described by `config`
    ///
    /// Reads are always fresh unless a cache TTL is configured.
    #[must_use]
    pub fn from_config(config: &RegistryConfig) -> Self {
        let file = FileSource::new(&config.devices_file, config.duplicate_ids);
        let source: Arc<dyn DeviceSource> = match config.cache_ttl {
            Some(ttl) => Arc::new(CachedSource::new(file, ttl)),
            None => Arc::new(file),
        };
        Self::new(source)
    }

    /// Load the full device list
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the source can't be read, [`Error::Parse`] if it
    /// isn't a device list, or [`Error::DuplicateDevice`]
    pub async fn list_devices(&self) -> Result<Arc<Registry>> {
        self.source.load().await
    }

    /// Resolve a device id
    ///
    /// Disabled devices are returned as-is. `Ok(None)` means no such id.
    ///
    /// # Errors
    ///
    /// Propagates any [`DeviceRegistry::list_devices`] failure so callers can
    /// report it
    pub async fn resolve(&self, id: &str) -> Result<Option<Device>> {
        let registry = self.list_devices().await?;
        Ok(registry.get(id).cloned())
    }

    /// Human-readable description of the backing source
    #[must_use]
    pub fn describe(&self) -> String {
        self.source.describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REJECT: DuplicatePolicy = DuplicatePolicy::Reject;

    fn device(id: &str, host: &str, enabled: bool) -> Device {
        Device {
            id: id.to_string(),
            name: format!("Switch {id}"),
            host: host.to_string(),
            enabled,
        }
    }

    #[test]
    fn get_returns_each_unique_device() {
        let devices = vec![
            device("1000a1b2c3", "10.0.0.10:8081", true),
            device("1000d4e5f6", "10.0.0.11:8081", false),
            device("1000778899", "10.0.0.12:8081", true),
        ];
        let registry = Registry::from_devices(devices.clone(), REJECT).unwrap();

        for d in &devices {
            assert_eq!(registry.get(&d.id), Some(d));
        }
        assert!(registry.get("unknown").is_none());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn duplicate_ids_rejected_by_default() {
        let devices = vec![
            device("dup", "10.0.0.1:8081", true),
            device("dup", "10.0.0.2:8081", true),
        ];
        let policy = DuplicatePolicy::default();
        let err = Registry::from_devices(devices, policy).unwrap_err();
        assert!(matches!(err, Error::DuplicateDevice(id) if id == "dup"));
    }

    #[test]
    fn duplicate_ids_last_wins_when_opted_in() {
        let devices = vec![
            device("dup", "10.0.0.1:8081", true),
            device("other", "10.0.0.3:8081", true),
            device("dup", "10.0.0.2:8081", false),
        ];
        let policy = DuplicatePolicy::LastWins;
        let registry = Registry::from_devices(devices, policy).unwrap();

        assert_eq!(registry.len(), 3);
        let resolved = registry.get("dup").unwrap();
        assert_eq!(resolved.host, "10.0.0.2:8081");
        assert!(!resolved.enabled);
    }

    #[test]
    fn parses_original_field_spellings() {
        let json = br#"[
            {"DeviceId": "a", "name": "Lamp", "host": "10.0.0.5:8081", "Enable": true},
            {"id": "b", "host": "10.0.0.6:8081", "enabled": true},
            {"id": "c", "host": "10.0.0.7:8081"}
        ]"#;
        let registry = Registry::parse(json, REJECT).unwrap();

        assert!(registry.get("a").unwrap().enabled);
        assert_eq!(registry.get("a").unwrap().name, "Lamp");
        assert!(registry.get("b").unwrap().enabled);
        assert!(!registry.get("c").unwrap().enabled);
        assert_eq!(registry.get("c").unwrap().name, "");
    }

    #[test]
    fn missing_host_is_not_routable() {
        let json = br#"[{"id": "nohost", "enable": true}]"#;
        let registry = Registry::parse(json, REJECT).unwrap();
        assert!(!registry.get("nohost").unwrap().is_routable());
    }

    #[test]
    fn malformed_content_is_parse_error() {
        let err = Registry::parse(b"{\"id\": 1", REJECT).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));

        let err = Registry::parse(br#"[{"name": "no id"}]"#, REJECT).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn serialized_registry_reads_back_in_order() {
        let devices = vec![
            device("z", "10.0.0.1:8081", true),
            device("a", "10.0.0.2:8081", false),
            device("m", "10.0.0.3:8081", true),
        ];
        let registry = Registry::from_devices(devices, REJECT).unwrap();

        let bytes = serde_json::to_vec(&registry).unwrap();
        let reread = Registry::parse(&bytes, REJECT).unwrap();

        assert_eq!(reread, registry);
        let ids: Vec<&String> = reread.devices().iter().map(|d| &d.id).collect();
        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let value = serde_json::to_value(device("x", "h:1", true)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"id": "x", "name": "Switch x", "host": "h:1", "enable": true})
        );
    }

    #[tokio::test]
    async fn resolve_reports_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = DeviceRegistry::from_config(&RegistryConfig {
            devices_file: dir.path().join("missing.json"),
            duplicate_ids: DuplicatePolicy::Reject,
            cache_ttl: None,
        });

        assert!(matches!(registry.resolve("any").await, Err(Error::Io(_))));
        assert!(matches!(registry.list_devices().await, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn resolve_returns_disabled_devices() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devices.json");
        std::fs::write(
            &path,
            r#"[{"id": "off", "name": "Heater", "host": "10.0.0.9:8081", "enable": false}]"#,
        )
        .unwrap();

        let registry = DeviceRegistry::from_config(&RegistryConfig {
            devices_file: path,
            duplicate_ids: DuplicatePolicy::Reject,
            cache_ttl: None,
        });

        let resolved = registry.resolve("off").await.unwrap().unwrap();
        assert!(!resolved.enabled);
        assert!(registry.resolve("on").await.unwrap().is_none());
    }
}
