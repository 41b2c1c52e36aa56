//! On-device schedule rules for Kasa plugs
//!
//! Rules live in the plug's firmware (`schedule` module); this side only
//! lists, adds and deletes them.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

use super::tplink::TpLinkPlug;
use crate::error::{DeviceError, Result};

pub const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

const FULL_DAY_NAMES: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// What a rule does when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
}

impl FromStr for PowerAction {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "on" => Ok(PowerAction::On),
            "off" => Ok(PowerAction::Off),
            other => Err(DeviceError::Validation(format!(
                "action must be 'on' or 'off', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
        })
    }
}

/// Minutes since midnight, parsed from `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < 24 * 60).then_some(Self(minutes))
    }

    pub fn minutes(self) -> u16 {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || DeviceError::Validation(format!("time must be HH:MM, got '{}'", s));
        let (hours, minutes) = s.trim().split_once(':').ok_or_else(invalid)?;
        let hours: u16 = hours.parse().map_err(|_| invalid())?;
        let minutes: u16 = minutes.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }
        Ok(Self(hours * 60 + minutes))
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// Days a rule repeats on, Sunday first (the firmware's `wday` order).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Weekdays([bool; 7]);

impl Weekdays {
    /// Parse day names (`sun`..`sat`, case-insensitive, full names allowed).
    pub fn parse<'a>(days: impl IntoIterator<Item = &'a str>) -> Result<Self> {
        let mut mask = [false; 7];
        for day in days {
            let day = day.trim().to_lowercase();
            if day.is_empty() {
                continue;
            }
            let index = DAY_NAMES
                .iter()
                .zip(FULL_DAY_NAMES)
                .position(|(short, full)| day == *short || day == full)
                .ok_or_else(|| DeviceError::Validation(format!("unknown day '{}'", day)))?;
            mask[index] = true;
        }
        Ok(Self(mask))
    }

    pub fn from_wday(wday: &[u8]) -> Self {
        let mut mask = [false; 7];
        for (slot, value) in mask.iter_mut().zip(wday) {
            *slot = *value != 0;
        }
        Self(mask)
    }

    fn only(date: NaiveDate) -> Self {
        let mut mask = [false; 7];
        mask[date.weekday().num_days_from_sunday() as usize] = true;
        Self(mask)
    }

    pub fn to_wday(self) -> [u8; 7] {
        self.0.map(u8::from)
    }

    pub fn is_empty(self) -> bool {
        !self.0.iter().any(|d| *d)
    }

    pub fn names(self) -> Vec<&'static str> {
        DAY_NAMES
            .iter()
            .zip(self.0)
            .filter_map(|(name, set)| set.then_some(*name))
            .collect()
    }
}

/// A rule as stored on the plug.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleRule {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    /// `None` for sunrise/sunset-relative rules
    pub time: Option<TimeOfDay>,
    /// `sunrise`/`sunset` for relative rules
    pub anchor: Option<&'static str>,
    pub action: PowerAction,
    pub days: Vec<&'static str>,
    pub repeat: bool,
}

/// A rule to create.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSchedule {
    pub time: TimeOfDay,
    pub action: PowerAction,
    pub days: Weekdays,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    enable: u8,
    #[serde(default)]
    wday: Vec<u8>,
    #[serde(default)]
    stime_opt: i64,
    #[serde(default)]
    smin: u16,
    #[serde(default)]
    sact: i64,
    #[serde(default)]
    repeat: u8,
}

impl From<RawRule> for ScheduleRule {
    fn from(raw: RawRule) -> Self {
        let (time, anchor) = match raw.stime_opt {
            1 => (None, Some("sunrise")),
            2 => (None, Some("sunset")),
            _ => (TimeOfDay::from_minutes(raw.smin), None),
        };
        ScheduleRule {
            id: raw.id,
            name: raw.name,
            enabled: raw.enable == 1,
            time,
            anchor,
            action: if raw.sact == 1 {
                PowerAction::On
            } else {
                PowerAction::Off
            },
            days: Weekdays::from_wday(&raw.wday).names(),
            repeat: raw.repeat == 1,
        }
    }
}

impl NewSchedule {
    /// The next date `time` occurs on, from `now` (plug-local clock).
    fn next_date(&self, now: NaiveDateTime) -> NaiveDate {
        let today = now.date();
        if u32::from(self.time.minutes()) * 60 > now.time().num_seconds_from_midnight() {
            today
        } else {
            today.succ_opt().unwrap_or(today)
        }
    }

    /// Repeating rules carry no date. A one-time rule is pinned to the next
    /// occurrence of its time, or the firmware never fires it.
    fn to_rule(&self, now: NaiveDateTime) -> Value {
        let sact = u8::from(self.action == PowerAction::On);
        let (wday, repeat, date) = if self.days.is_empty() {
            let date = self.next_date(now);
            (Weekdays::only(date), 0, Some(date))
        } else {
            (self.days, 1, None)
        };
        json!({
            "stime_opt": 0,
            "smin": self.time.minutes(),
            "sact": sact,
            "wday": wday.to_wday(),
            "repeat": repeat,
            "enable": 1,
            "name": format!("turn {} at {}", self.action, self.time),
            "etime_opt": -1,
            "emin": 0,
            "eact": -1,
            "day": date.map_or(0, |d| d.day()),
            "month": date.map_or(0, |d| d.month()),
            "year": date.map_or(0, |d| d.year()),
            "longitude": 0,
            "latitude": 0,
            "force": 0,
        })
    }
}

impl TpLinkPlug {
    pub async fn get_schedules(&self) -> Result<Vec<ScheduleRule>> {
        let result = self.call("schedule", "get_rules", json!({})).await?;
        let rules: Vec<RawRule> = result
            .get("rule_list")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| {
                DeviceError::Device(format!("{} sent unexpected rules: {}", self.label(), e))
            })?
            .unwrap_or_default();
        Ok(rules.into_iter().map(ScheduleRule::from).collect())
    }

    /// Returns the id the plug assigned to the new rule.
    pub async fn add_schedule(&self, schedule: &NewSchedule) -> Result<String> {
        let response = self
            .request(&json!({
                "schedule": {
                    "add_rule": schedule.to_rule(Local::now().naive_local()),
                    "set_overall_enable": { "enable": 1 },
                }
            }))
            .await?;
        let result = response
            .pointer("/schedule/add_rule")
            .ok_or_else(|| DeviceError::Device(format!("{} did not add the rule", self.label())))?;
        super::tplink::check_err_code(self.label(), result)?;
        Ok(result
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    pub async fn delete_schedule(&self, rule_id: &str) -> Result<()> {
        let rule_id = rule_id.trim();
        if rule_id.is_empty() {
            return Err(DeviceError::Validation("rule id is required".to_string()));
        }
        self.call("schedule", "delete_rule", json!({ "id": rule_id }))
            .await
            .map(|_| ())
    }
}
