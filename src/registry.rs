//! Name-keyed device registry, built once at startup

use indexmap::IndexMap;
use serde::Serialize;
use tracing::warn;

use crate::adapters::{Capabilities, Device, DeviceKind};
use crate::error::{DeviceError, Result};

/// Summary row for listings (no I/O).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSummary {
    pub name: String,
    pub kind: DeviceKind,
    pub brand: &'static str,
    pub device_type: &'static str,
    pub capabilities: Capabilities,
}

/// Devices by name, in registration order.
///
/// Mutable only while being built; the server shares it behind an `Arc`.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<String, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a device. A second registration under the same name replaces
    /// the first one and keeps its position.
    pub fn register(&mut self, name: &str, device: Device) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DeviceError::Validation(
                "device name cannot be empty".to_string(),
            ));
        }
        if self.devices.insert(name.to_string(), device).is_some() {
            warn!("Device '{}' registered twice, keeping the last definition", name);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Device> {
        self.devices
            .get(name.trim())
            .ok_or_else(|| DeviceError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.devices.contains_key(name.trim())
    }

    pub fn names(&self) -> Vec<&str> {
        self.devices.keys().map(String::as_str).collect()
    }

    pub fn list(&self) -> Vec<DeviceSummary> {
        self.devices
            .iter()
            .map(|(name, device)| DeviceSummary {
                name: name.clone(),
                kind: device.kind(),
                brand: device.brand(),
                device_type: device.device_type(),
                capabilities: device.capabilities(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TpLinkPlug;

    fn plug(ip: &str) -> Device {
        Device::TpLink(TpLinkPlug::new(ip).unwrap())
    }

    fn ip_of(registry: &DeviceRegistry, name: &str) -> String {
        registry
            .get(name)
            .unwrap()
            .as_tplink()
            .unwrap()
            .device_ip()
            .to_string()
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = DeviceRegistry::new();
        registry.register("tree", plug("10.0.0.1")).unwrap();
        registry.register("porch", plug("10.0.0.2")).unwrap();
        registry.register("tree", plug("10.0.0.3")).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(ip_of(&registry, "tree"), "10.0.0.3");
        assert_eq!(registry.names(), vec!["tree", "porch"]);
    }

    #[test]
    fn test_unknown_name_is_not_found() {
        let mut registry = DeviceRegistry::new();
        registry.register("tree", plug("10.0.0.1")).unwrap();

        match registry.get("garage") {
            Err(DeviceError::NotFound(name)) => assert_eq!(name, "garage"),
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert!(!registry.contains("garage"));
    }

    #[test]
    fn test_names_are_trimmed() {
        let mut registry = DeviceRegistry::new();
        registry.register("  tree ", plug("10.0.0.1")).unwrap();
        assert!(registry.contains("tree"));
        assert_eq!(ip_of(&registry, " tree"), "10.0.0.1");
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = DeviceRegistry::new();
        let result = registry.register("   ", plug("10.0.0.1"));
        assert!(matches!(result, Err(DeviceError::Validation(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_list_describes_devices() {
        let mut registry = DeviceRegistry::new();
        registry.register("tree", plug("10.0.0.1")).unwrap();

        let list = registry.list();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].name, "tree");
        assert_eq!(list[0].brand, "tplink");
        assert_eq!(list[0].device_type, "plug");
        assert!(list[0].capabilities.schedules);
        assert!(!list[0].capabilities.brightness);
    }
}
