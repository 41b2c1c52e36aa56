//! HTML routes: device status, power toggle and TP-Link schedules

use axum::{
    extract::{Query, State},
    response::{Html, Redirect},
    Form,
};
use serde::Deserialize;
use tracing::info;

use super::{AppState, PageError};
use crate::adapters::tplink_schedule::{NewSchedule, Weekdays};
use crate::adapters::{Device, TpLinkPlug};
use crate::config::DEFAULT_DEVICE;
use crate::error::DeviceError;
use crate::ui::components::device_href;
use crate::ui::pages::{schedules_page, status_page};

/// `?device=` / form field. Missing or blank selects the default device.
#[derive(Debug, Default, Deserialize)]
pub struct DeviceParam {
    #[serde(default)]
    pub device: Option<String>,
}

impl DeviceParam {
    fn name(&self) -> String {
        match self.device.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_DEVICE.to_string(),
        }
    }
}

impl AppState {
    fn page_error(&self, error: DeviceError) -> PageError {
        PageError {
            error,
            devices: self.nav(),
        }
    }

    fn device(&self, name: &str) -> Result<&Device, PageError> {
        self.registry.get(name).map_err(|e| self.page_error(e))
    }

    fn plug(&self, name: &str) -> Result<&TpLinkPlug, PageError> {
        let device = self.device(name)?;
        device.as_tplink().ok_or_else(|| {
            self.page_error(DeviceError::NotSupported {
                brand: device.brand(),
                capability: "schedules",
            })
        })
    }
}

/// GET / - status page for the selected device
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<DeviceParam>,
) -> Result<Html<String>, PageError> {
    let name = query.name();
    let device = state.device(&name)?;
    let status = device
        .get_status()
        .await
        .map_err(|e| state.page_error(e))?;
    let schedules = device.capabilities().schedules;

    Ok(Html(status_page(state.nav(), name, status, schedules)))
}

/// POST /toggle - flip power, then back to the status page
pub async fn toggle(
    State(state): State<AppState>,
    Form(form): Form<DeviceParam>,
) -> Result<Redirect, PageError> {
    let name = form.name();
    let is_on = state
        .device(&name)?
        .toggle()
        .await
        .map_err(|e| state.page_error(e))?;
    info!(device = %name, is_on, "Toggled");
    Ok(Redirect::to(&device_href("/", &name)))
}

/// GET /schedules - rules stored on a TP-Link plug
pub async fn schedules(
    State(state): State<AppState>,
    Query(query): Query<DeviceParam>,
) -> Result<Html<String>, PageError> {
    let name = query.name();
    let rules = state
        .plug(&name)?
        .get_schedules()
        .await
        .map_err(|e| state.page_error(e))?;

    Ok(Html(schedules_page(state.nav(), name, rules)))
}

/// Add-rule form; `days` repeats once per checked box.
#[derive(Debug, Default)]
struct ScheduleForm {
    device: DeviceParam,
    time: String,
    action: String,
    days: Vec<String>,
}

impl ScheduleForm {
    fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut form = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "device" => form.device.device = Some(value),
                "time" => form.time = value,
                "action" => form.action = value,
                "days" => form.days.push(value),
                _ => {}
            }
        }
        form
    }

    fn schedule(&self) -> Result<NewSchedule, DeviceError> {
        Ok(NewSchedule {
            time: self.time.parse()?,
            action: self.action.parse()?,
            days: Weekdays::parse(self.days.iter().map(String::as_str))?,
        })
    }
}

/// POST /schedules/add
pub async fn add_schedule(
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Result<Redirect, PageError> {
    let form = ScheduleForm::from_pairs(pairs);
    let name = form.device.name();
    let plug = state.plug(&name)?;
    let schedule = form.schedule().map_err(|e| state.page_error(e))?;

    let id = plug
        .add_schedule(&schedule)
        .await
        .map_err(|e| state.page_error(e))?;
    info!(device = %name, rule = %id, "Added schedule");
    Ok(Redirect::to(&device_href("/schedules", &name)))
}

#[derive(Debug, Deserialize)]
pub struct DeleteForm {
    #[serde(flatten)]
    device: DeviceParam,
    #[serde(default)]
    rule_id: String,
}

/// POST /schedules/delete
pub async fn delete_schedule(
    State(state): State<AppState>,
    Form(form): Form<DeleteForm>,
) -> Result<Redirect, PageError> {
    let name = form.device.name();
    state
        .plug(&name)?
        .delete_schedule(&form.rule_id)
        .await
        .map_err(|e| state.page_error(e))?;
    info!(device = %name, rule = %form.rule_id, "Deleted schedule");
    Ok(Redirect::to(&device_href("/schedules", &name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_blank_device_is_default() {
        assert_eq!(DeviceParam::default().name(), "default");
        let blank = DeviceParam {
            device: Some("  ".to_string()),
        };
        assert_eq!(blank.name(), "default");
    }

    #[test]
    fn test_schedule_form_collects_repeated_days() {
        let form = ScheduleForm::from_pairs(pairs(&[
            ("device", "porch"),
            ("time", "06:30"),
            ("action", "off"),
            ("days", "mon"),
            ("days", "wed"),
        ]));
        assert_eq!(form.device.name(), "porch");

        let schedule = form.schedule().unwrap();
        assert_eq!(schedule.time.minutes(), 390);
        assert_eq!(schedule.days.names(), vec!["mon", "wed"]);
    }

    #[test]
    fn test_schedule_form_rejects_bad_input() {
        let form = ScheduleForm::from_pairs(pairs(&[("time", "25:00"), ("action", "on")]));
        assert!(matches!(form.schedule(), Err(DeviceError::Validation(_))));

        let form = ScheduleForm::from_pairs(pairs(&[("time", "07:00"), ("action", "dim")]));
        assert!(matches!(form.schedule(), Err(DeviceError::Validation(_))));
    }
}
