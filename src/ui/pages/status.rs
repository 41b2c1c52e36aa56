//! Device status page with the power toggle.

use dioxus::prelude::*;

use crate::adapters::DeviceStatus;
use crate::ui::components::{device_href, Layout, NavEntry};

#[derive(Props, Clone, PartialEq)]
pub struct StatusPageProps {
    pub devices: Vec<NavEntry>,
    /// Registry name of the shown device
    pub device: String,
    pub status: DeviceStatus,
    /// Link to the schedules page
    #[props(default = false)]
    pub schedules: bool,
}

#[component]
pub fn StatusPage(props: StatusPageProps) -> Element {
    let status = &props.status;
    let heading = status.name.clone().unwrap_or_else(|| props.device.clone());
    let icon = if status.device_type == "plug" { "🔌" } else { "💡" };
    let (button_class, button_label, state_label) = if status.is_on {
        ("toggle on", "Turn Off", "ON")
    } else {
        ("toggle off", "Turn On", "OFF")
    };

    rsx! {
        Layout { title: heading.clone(), devices: props.devices.clone(), active: props.device.clone(),
            div { class: "icon", "{icon}" }
            h1 { "{heading}" }
            form { action: "/toggle", method: "post",
                input { r#type: "hidden", name: "device", value: "{props.device}" }
                button { r#type: "submit", class: button_class, "{button_label}" }
            }
            p { class: "status", "Currently: {state_label}" }
            if let Some(level) = status.brightness {
                p { class: "status", "Brightness: {level}%" }
            }
            if let Some(color) = status.color.as_deref() {
                p { class: "status",
                    "Color: "
                    span { style: "color: {color}", "●" }
                    " {color}"
                }
            }
            if let Some(model) = status.model.as_deref() {
                p { class: "status", small { "{status.brand} {model}" } }
            }
            if props.schedules {
                p { a { href: device_href("/schedules", &props.device), "Schedules" } }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::render_page;
    use serde_json::Map;

    fn status(is_on: bool) -> DeviceStatus {
        DeviceStatus {
            is_on,
            brand: "tplink",
            device_type: "plug",
            name: Some("Christmas Tree".to_string()),
            model: Some("HS103(US)".to_string()),
            brightness: None,
            color: None,
            details: Map::new(),
        }
    }

    fn page(is_on: bool, schedules: bool) -> String {
        render_page(rsx! {
            StatusPage {
                devices: vec![],
                device: "default".to_string(),
                status: status(is_on),
                schedules: schedules,
            }
        })
    }

    #[test]
    fn test_renders_toggle_for_current_state() {
        let html = page(true, false);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("Christmas Tree"));
        assert!(html.contains("Turn Off"));
        assert!(html.contains("Currently: ON"));
        assert!(html.contains(r#"action="/toggle""#));
        assert!(!html.contains("Schedules"));

        let html = page(false, true);
        assert!(html.contains("Turn On"));
        assert!(html.contains("Currently: OFF"));
        assert!(html.contains(r#"href="/schedules""#));
    }
}
