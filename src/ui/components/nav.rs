//! Device switcher shown above every page.

use dioxus::prelude::*;

use crate::config::DEFAULT_DEVICE;
use crate::registry::DeviceSummary;

/// One link in the device switcher.
#[derive(Debug, Clone, PartialEq)]
pub struct NavEntry {
    pub name: String,
    pub brand: &'static str,
    pub schedules: bool,
}

impl From<DeviceSummary> for NavEntry {
    fn from(summary: DeviceSummary) -> Self {
        Self {
            name: summary.name,
            brand: summary.brand,
            schedules: summary.capabilities.schedules,
        }
    }
}

/// `/` or `/schedules` with the `device` query for non-default devices.
pub fn device_href(path: &str, device: &str) -> String {
    if device == DEFAULT_DEVICE {
        path.to_string()
    } else {
        format!("{}?device={}", path, urlencoding::encode(device))
    }
}

#[derive(Props, Clone, PartialEq)]
pub struct DeviceNavProps {
    pub devices: Vec<NavEntry>,
    /// Currently selected device name
    pub active: String,
}

#[component]
pub fn DeviceNav(props: DeviceNavProps) -> Element {
    // A single device needs no switcher.
    if props.devices.len() < 2 {
        return rsx! {};
    }

    rsx! {
        nav { class: "devices",
            for entry in props.devices.iter() {
                a {
                    key: "{entry.name}",
                    class: if entry.name == props.active { "device active" } else { "device" },
                    href: device_href("/", &entry.name),
                    title: "{entry.brand}",
                    "{entry.name}"
                }
            }
        }
    }
}
