mod error;
mod schedules;
mod status;

use dioxus::prelude::*;

use super::components::NavEntry;
use super::render_page;
use crate::adapters::tplink_schedule::ScheduleRule;
use crate::adapters::DeviceStatus;

pub use error::ErrorPage;
pub use schedules::SchedulesPage;
pub use status::StatusPage;

pub fn status_page(
    devices: Vec<NavEntry>,
    device: String,
    status: DeviceStatus,
    schedules: bool,
) -> String {
    render_page(rsx! {
        StatusPage { devices: devices, device: device, status: status, schedules: schedules }
    })
}

pub fn schedules_page(devices: Vec<NavEntry>, device: String, rules: Vec<ScheduleRule>) -> String {
    render_page(rsx! {
        SchedulesPage { devices: devices, device: device, rules: rules }
    })
}

pub fn error_page(devices: Vec<NavEntry>, title: &str, message: String) -> String {
    render_page(rsx! {
        ErrorPage { devices: devices, title: title.to_string(), message: message }
    })
}
