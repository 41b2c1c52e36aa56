//! Device definitions
//!
//! Resolution order:
//! 1. the devices file, when it exists and holds at least one entry
//! 2. the legacy `DEVICE_IP` variable, yielding a single `default` plug
//! 3. otherwise startup fails

use indexmap::IndexMap;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

use crate::adapters::tuya::Version;
use crate::adapters::{Device, HueTarget};
use crate::error::{DeviceError, Result};
use crate::registry::DeviceRegistry;

/// Environment variable holding a single TP-Link plug address.
pub const LEGACY_DEVICE_ENV: &str = "DEVICE_IP";

/// Name given to the device synthesized from [`LEGACY_DEVICE_ENV`].
pub const DEFAULT_DEVICE: &str = "default";

/// One entry of the devices file, discriminated by its `type` field.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum DeviceConfig {
    #[serde(rename = "tplink")]
    TpLink(TpLinkConfig),
    #[serde(rename = "hue")]
    Hue(HueConfig),
    #[serde(rename = "nanoleaf")]
    Nanoleaf(NanoleafConfig),
    #[serde(rename = "geeni")]
    Geeni(TuyaConfig),
    #[serde(rename = "cree")]
    Cree(TuyaConfig),
}

#[derive(Debug, Deserialize)]
pub struct TpLinkConfig {
    pub device_ip: String,
}

#[derive(Debug, Deserialize)]
pub struct HueConfig {
    pub bridge_ip: String,
    #[serde(deserialize_with = "secret")]
    pub api_key: SecretString,
    #[serde(default)]
    pub light_id: Option<String>,
    #[serde(default)]
    pub group_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NanoleafConfig {
    pub device_ip: String,
    #[serde(deserialize_with = "secret")]
    pub auth_token: SecretString,
}

#[derive(Debug, Deserialize)]
pub struct TuyaConfig {
    pub device_id: String,
    pub device_ip: String,
    #[serde(deserialize_with = "secret")]
    pub local_key: SecretString,
    #[serde(default = "default_tuya_version")]
    pub device_version: String,
}

fn default_tuya_version() -> String {
    "3.3".to_string()
}

fn secret<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
    String::deserialize(deserializer).map(SecretString::from)
}

fn required(name: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(DeviceError::Configuration(format!(
            "device '{}': {} is required and cannot be empty",
            name, field
        )));
    }
    Ok(())
}

impl HueConfig {
    /// Exactly one of `light_id` / `group_id` must be set.
    pub fn target(&self) -> Result<HueTarget> {
        let light = self.light_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let group = self.group_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
        match (light, group) {
            (Some(light), None) => Ok(HueTarget::Light(light.to_string())),
            (None, Some(group)) => Ok(HueTarget::Group(group.to_string())),
            (Some(_), Some(_)) => Err(DeviceError::Configuration(
                "cannot specify both light_id and group_id; use one or the other".to_string(),
            )),
            (None, None) => Err(DeviceError::Configuration(
                "either light_id or group_id must be provided".to_string(),
            )),
        }
    }
}

impl TuyaConfig {
    pub fn version(&self) -> Result<Version> {
        self.device_version.parse()
    }
}

impl DeviceConfig {
    /// Check the per-type required fields.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            DeviceConfig::TpLink(c) => required(name, "device_ip", &c.device_ip),
            DeviceConfig::Hue(c) => {
                required(name, "bridge_ip", &c.bridge_ip)?;
                required(name, "api_key", c.api_key.expose_secret())?;
                c.target().map(|_| ()).map_err(|e| prefix(name, e))
            }
            DeviceConfig::Nanoleaf(c) => {
                required(name, "device_ip", &c.device_ip)?;
                required(name, "auth_token", c.auth_token.expose_secret())
            }
            DeviceConfig::Geeni(c) | DeviceConfig::Cree(c) => {
                required(name, "device_id", &c.device_id)?;
                required(name, "device_ip", &c.device_ip)?;
                required(name, "local_key", c.local_key.expose_secret())?;
                if c.local_key.expose_secret().trim().len() != 16 {
                    return Err(DeviceError::Configuration(format!(
                        "device '{}': local_key must be 16 characters",
                        name
                    )));
                }
                c.version().map(|_| ()).map_err(|e| prefix(name, e))
            }
        }
    }
}

fn prefix(name: &str, err: DeviceError) -> DeviceError {
    match err {
        DeviceError::Configuration(msg) => {
            DeviceError::Configuration(format!("device '{}': {}", name, msg))
        }
        other => other,
    }
}

/// Read the devices file. Unreadable or malformed files are logged and
/// treated as absent so the legacy fallback still applies.
fn read_device_file(path: &Path) -> Option<IndexMap<String, Value>> {
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Could not read device file {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str::<IndexMap<String, Value>>(&content) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!("Could not parse device file {}: {}", path.display(), e);
            None
        }
    }
}

/// Resolve the full device set, in definition order.
pub fn resolve_devices(
    path: &Path,
    legacy_ip: Option<&str>,
) -> Result<Vec<(String, DeviceConfig)>> {
    if let Some(entries) = read_device_file(path).filter(|e| !e.is_empty()) {
        info!(
            "Loading {} device(s) from {}",
            entries.len(),
            path.display()
        );
        return entries
            .into_iter()
            .map(|(name, value)| {
                if name.trim().is_empty() {
                    return Err(DeviceError::Configuration(format!(
                        "{}: device names cannot be blank",
                        path.display()
                    )));
                }
                let config: DeviceConfig = serde_json::from_value(value).map_err(|e| {
                    DeviceError::Configuration(format!("device '{}': {}", name, e))
                })?;
                config.validate(&name)?;
                Ok((name, config))
            })
            .collect();
    }

    if let Some(ip) = legacy_ip.map(str::trim).filter(|ip| !ip.is_empty()) {
        info!(
            "No device file, using {} for device '{}'",
            LEGACY_DEVICE_ENV, DEFAULT_DEVICE
        );
        return Ok(vec![(
            DEFAULT_DEVICE.to_string(),
            DeviceConfig::TpLink(TpLinkConfig {
                device_ip: ip.to_string(),
            }),
        )]);
    }

    Err(DeviceError::Configuration(format!(
        "no devices configured: create {} or set {}",
        path.display(),
        LEGACY_DEVICE_ENV
    )))
}

/// Resolve devices and build the registry from them.
pub fn load_registry(
    path: &Path,
    legacy_ip: Option<&str>,
    http: &reqwest::Client,
) -> Result<DeviceRegistry> {
    let mut registry = DeviceRegistry::new();
    for (name, config) in resolve_devices(path, legacy_ip)? {
        let device = Device::from_config(config, http).map_err(|e| prefix(&name, e))?;
        registry.register(&name, device)?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::DeviceKind;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn device_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn missing_path() -> std::path::PathBuf {
        let dir = tempfile::tempdir().unwrap();
        dir.path().join("does-not-exist.json")
    }

    #[test]
    fn test_file_with_single_tplink_entry() {
        let file = device_file(r#"{"tree": {"type": "tplink", "device_ip": "192.168.1.50"}}"#);
        let registry = load_registry(file.path(), None, &reqwest::Client::new()).unwrap();

        assert_eq!(registry.names(), vec!["tree"]);
        let device = registry.get("tree").unwrap();
        assert_eq!(device.kind(), DeviceKind::TpLink);
        assert_eq!(device.as_tplink().unwrap().device_ip(), "192.168.1.50");
    }

    #[test]
    fn test_env_fallback_without_file() {
        let registry =
            load_registry(&missing_path(), Some("192.168.1.99"), &reqwest::Client::new())
                .unwrap();

        assert_eq!(registry.names(), vec!["default"]);
        let device = registry.get("default").unwrap();
        assert_eq!(device.kind(), DeviceKind::TpLink);
        assert_eq!(device.as_tplink().unwrap().device_ip(), "192.168.1.99");
    }

    #[test]
    fn test_file_takes_precedence_over_env() {
        let file = device_file(r#"{"lamp": {"type": "tplink", "device_ip": "10.0.0.5"}}"#);
        let devices = resolve_devices(file.path(), Some("192.168.1.99")).unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].0, "lamp");
    }

    #[test]
    fn test_nothing_configured_is_an_error() {
        let result = resolve_devices(&missing_path(), None);
        assert!(matches!(result, Err(DeviceError::Configuration(_))));

        let result = resolve_devices(&missing_path(), Some("   "));
        assert!(matches!(result, Err(DeviceError::Configuration(_))));
    }

    #[test]
    fn test_malformed_file_falls_back_to_env() {
        let file = device_file("{ not json");
        let devices = resolve_devices(file.path(), Some("192.168.1.99")).unwrap();
        assert_eq!(devices[0].0, DEFAULT_DEVICE);
    }

    #[test]
    fn test_empty_file_falls_back_to_env() {
        let file = device_file("{}");
        let devices = resolve_devices(file.path(), Some("192.168.1.99")).unwrap();
        assert_eq!(devices[0].0, DEFAULT_DEVICE);
    }

    #[test]
    fn test_blank_device_name_is_configuration_error() {
        let file = device_file(r#"{"  ": {"type": "tplink", "device_ip": "10.0.0.1"}}"#);
        let result = load_registry(file.path(), Some("192.168.1.99"), &reqwest::Client::new());
        match result {
            Err(DeviceError::Configuration(msg)) => assert!(msg.contains("blank"), "{}", msg),
            other => panic!("expected Configuration error, got {:?}", other.map(|r| r.names().len())),
        }
    }

    #[test]
    fn test_entries_keep_file_order() {
        let file = device_file(
            r#"{
                "zeta": {"type": "tplink", "device_ip": "10.0.0.1"},
                "alpha": {"type": "nanoleaf", "device_ip": "10.0.0.2", "auth_token": "tok"},
                "mid": {"type": "cree", "device_id": "abc", "device_ip": "10.0.0.3",
                        "local_key": "0123456789abcdef"}
            }"#,
        );
        let registry = load_registry(file.path(), None, &reqwest::Client::new()).unwrap();
        assert_eq!(registry.names(), vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_hue_requires_exactly_one_target() {
        let both = device_file(
            r#"{"hue": {"type": "hue", "bridge_ip": "10.0.0.2", "api_key": "k",
                        "light_id": "1", "group_id": "2"}}"#,
        );
        let neither =
            device_file(r#"{"hue": {"type": "hue", "bridge_ip": "10.0.0.2", "api_key": "k"}}"#);

        for file in [both, neither] {
            let result = resolve_devices(file.path(), Some("192.168.1.99"));
            assert!(
                matches!(result, Err(DeviceError::Configuration(_))),
                "got {:?}",
                result
            );
        }

        let group = device_file(
            r#"{"hue": {"type": "hue", "bridge_ip": "10.0.0.2", "api_key": "k", "group_id": "2"}}"#,
        );
        let devices = resolve_devices(group.path(), None).unwrap();
        match &devices[0].1 {
            DeviceConfig::Hue(c) => assert_eq!(c.target().unwrap(), HueTarget::Group("2".into())),
            other => panic!("expected hue config, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_entries_abort() {
        let cases = [
            r#"{"x": {"type": "toaster", "device_ip": "10.0.0.1"}}"#,
            r#"{"x": {"device_ip": "10.0.0.1"}}"#,
            r#"{"x": {"type": "tplink"}}"#,
            r#"{"x": {"type": "tplink", "device_ip": "  "}}"#,
            r#"{"x": {"type": "nanoleaf", "device_ip": "10.0.0.1"}}"#,
            r#"{"x": {"type": "geeni", "device_id": "d", "device_ip": "10.0.0.1", "local_key": "short"}}"#,
            r#"{"x": {"type": "geeni", "device_id": "d", "device_ip": "10.0.0.1",
                      "local_key": "0123456789abcdef", "device_version": "3.4"}}"#,
        ];
        for case in cases {
            let file = device_file(case);
            let result = resolve_devices(file.path(), Some("192.168.1.99"));
            match result {
                Err(DeviceError::Configuration(msg)) => {
                    assert!(msg.contains("'x'"), "message should name the device: {}", msg)
                }
                other => panic!("expected configuration error for {}, got {:?}", case, other),
            }
        }
    }

    #[test]
    fn test_tuya_version_defaults_to_3_3() {
        let file = device_file(
            r#"{"bulb": {"type": "geeni", "device_id": "d", "device_ip": "10.0.0.1",
                         "local_key": "0123456789abcdef"}}"#,
        );
        let devices = resolve_devices(file.path(), None).unwrap();
        match &devices[0].1 {
            DeviceConfig::Geeni(c) => assert_eq!(c.version().unwrap(), Version::V33),
            other => panic!("expected geeni config, got {:?}", other),
        }
    }

    #[test]
    fn test_secrets_not_in_debug_output() {
        let file = device_file(
            r#"{"panels": {"type": "nanoleaf", "device_ip": "10.0.0.2", "auth_token": "super-secret-token"}}"#,
        );
        let devices = resolve_devices(file.path(), None).unwrap();
        let debug = format!("{:?}", devices);
        assert!(!debug.contains("super-secret-token"));
    }
}
