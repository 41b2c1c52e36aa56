//! TP-Link schedule rules: list, add, delete.

use dioxus::prelude::*;

use crate::adapters::tplink_schedule::{ScheduleRule, DAY_NAMES};
use crate::ui::components::{device_href, Layout, NavEntry};

#[derive(Props, Clone, PartialEq)]
pub struct SchedulesPageProps {
    pub devices: Vec<NavEntry>,
    pub device: String,
    pub rules: Vec<ScheduleRule>,
}

fn when(rule: &ScheduleRule) -> String {
    match (rule.time, rule.anchor) {
        (Some(time), _) => time.to_string(),
        (None, Some(anchor)) => anchor.to_string(),
        (None, None) => "-".to_string(),
    }
}

fn days(rule: &ScheduleRule) -> String {
    if !rule.repeat {
        "once".to_string()
    } else {
        rule.days.join(", ")
    }
}

#[component]
pub fn SchedulesPage(props: SchedulesPageProps) -> Element {
    let title = format!("{} schedules", props.device);

    rsx! {
        Layout { title: title.clone(), devices: props.devices.clone(), active: props.device.clone(),
            h1 { "{title}" }
            if props.rules.is_empty() {
                p { class: "status", "No schedules on this device." }
            } else {
                table {
                    thead {
                        tr {
                            th { "Time" }
                            th { "Action" }
                            th { "Days" }
                            th { "Enabled" }
                            th {}
                        }
                    }
                    tbody {
                        for rule in props.rules.iter() {
                            tr { key: "{rule.id}",
                                td { {when(rule)} }
                                td { "{rule.action}" }
                                td { {days(rule)} }
                                td { if rule.enabled { "yes" } else { "no" } }
                                td {
                                    form { class: "inline", action: "/schedules/delete", method: "post",
                                        input { r#type: "hidden", name: "device", value: "{props.device}" }
                                        input { r#type: "hidden", name: "rule_id", value: "{rule.id}" }
                                        button { r#type: "submit", "Delete" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
            form { action: "/schedules/add", method: "post",
                fieldset {
                    legend { "Add schedule" }
                    input { r#type: "hidden", name: "device", value: "{props.device}" }
                    input { r#type: "time", name: "time", required: true }
                    select { name: "action",
                        option { value: "on", "Turn on" }
                        option { value: "off", "Turn off" }
                    }
                    for day in DAY_NAMES {
                        label { key: "{day}",
                            input { r#type: "checkbox", name: "days", value: "{day}" }
                            "{day}"
                        }
                    }
                    button { r#type: "submit", "Add" }
                }
            }
            p { a { href: device_href("/", &props.device), "Back" } }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tplink_schedule::PowerAction;
    use crate::ui::render_page;

    #[test]
    fn test_lists_rules_with_delete_forms() {
        let rules = vec![ScheduleRule {
            id: "RULE1".to_string(),
            name: "turn on at 18:45".to_string(),
            enabled: true,
            time: "18:45".parse().ok(),
            anchor: None,
            action: PowerAction::On,
            days: vec!["mon", "tue"],
            repeat: true,
        }];
        let html = render_page(rsx! {
            SchedulesPage { devices: vec![], device: "porch".to_string(), rules: rules }
        });

        assert!(html.contains("18:45"));
        assert!(html.contains("mon, tue"));
        assert!(html.contains(r#"value="RULE1""#));
        assert!(html.contains(r#"action="/schedules/add""#));
        assert!(html.contains(r#"href="/?device=porch""#));
    }

    #[test]
    fn test_empty_list() {
        let html = render_page(rsx! {
            SchedulesPage { devices: vec![], device: "default".to_string(), rules: vec![] }
        });
        assert!(html.contains("No schedules"));
    }
}
