//! Philips Hue adapter (Bridge REST API v1)
//!
//! Controls either a single light or a group, never both. The bridge
//! reports failures as `200 OK` with `[{"error": {...}}]` bodies.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{endpoint, http_error, Brightness, DeviceKind, DeviceStatus, LightControl, SmartDevice};
use crate::color::Rgb;
use crate::error::{DeviceError, Result};

const BRIDGE_PORT: u16 = 80;
/// Bridge error type for a bad application key
const UNAUTHORIZED_USER: i64 = 1;

/// What the adapter controls on the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HueTarget {
    Light(String),
    Group(String),
}

impl HueTarget {
    fn collection(&self) -> &'static str {
        match self {
            HueTarget::Light(_) => "lights",
            HueTarget::Group(_) => "groups",
        }
    }

    fn id(&self) -> &str {
        match self {
            HueTarget::Light(id) | HueTarget::Group(id) => id,
        }
    }

    /// Path suffix for state changes
    fn command(&self) -> &'static str {
        match self {
            HueTarget::Light(_) => "state",
            HueTarget::Group(_) => "action",
        }
    }
}

/// Light state as reported for lights (`state`) and groups (`action`).
#[derive(Debug, Default, Deserialize)]
struct HueState {
    #[serde(default)]
    on: bool,
    #[serde(default)]
    bri: Option<u8>,
    #[serde(default)]
    xy: Option<[f64; 2]>,
    #[serde(default)]
    colormode: Option<String>,
    #[serde(default)]
    reachable: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct GroupState {
    #[serde(default)]
    any_on: bool,
}

#[derive(Debug, Deserialize)]
struct HueResource {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    modelid: Option<String>,
    /// Lights
    #[serde(default)]
    state: Option<Value>,
    /// Groups
    #[serde(default)]
    action: Option<HueState>,
}

impl HueResource {
    /// Lights carry `state`; groups carry `action` plus an `any_on` summary.
    fn into_state(self, target: &HueTarget) -> Result<HueState> {
        let malformed =
            |e: serde_json::Error| DeviceError::Device(format!("unexpected Hue state: {}", e));
        match target {
            HueTarget::Light(_) => match self.state {
                Some(state) => serde_json::from_value(state).map_err(malformed),
                None => Ok(HueState::default()),
            },
            HueTarget::Group(_) => {
                let mut action = self.action.unwrap_or_default();
                if let Some(state) = self.state {
                    let group: GroupState = serde_json::from_value(state).map_err(malformed)?;
                    action.on = group.any_on;
                }
                Ok(action)
            }
        }
    }
}

/// First bridge-reported error in a response body, if any.
fn bridge_error(body: &Value) -> Option<(i64, String)> {
    body.as_array()?.iter().find_map(|entry| {
        let error = entry.get("error")?;
        Some((
            error.get("type").and_then(Value::as_i64).unwrap_or_default(),
            error
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        ))
    })
}

/// A Hue light or light group behind a bridge.
pub struct HueLight {
    bridge_ip: String,
    base_url: String,
    api_key: SecretString,
    target: HueTarget,
    client: Client,
    label: String,
}

impl HueLight {
    pub fn new(
        bridge_ip: &str,
        api_key: SecretString,
        target: HueTarget,
        client: Client,
    ) -> Result<Self> {
        let bridge_ip = bridge_ip.trim();
        if bridge_ip.is_empty() {
            return Err(DeviceError::Configuration(
                "bridge_ip is required and cannot be empty".to_string(),
            ));
        }
        if api_key.expose_secret().trim().is_empty() {
            return Err(DeviceError::Configuration(
                "api_key is required and cannot be empty".to_string(),
            ));
        }
        let label = format!("Hue Bridge at {}", bridge_ip);
        Ok(Self {
            bridge_ip: bridge_ip.to_string(),
            base_url: format!("http://{}", endpoint(bridge_ip, BRIDGE_PORT)),
            api_key: SecretString::from(api_key.expose_secret().trim().to_string()),
            target,
            client,
            label,
        })
    }

    pub fn target(&self) -> &HueTarget {
        &self.target
    }

    fn resource_url(&self) -> String {
        format!(
            "{}/api/{}/{}/{}",
            self.base_url,
            self.api_key.expose_secret(),
            self.target.collection(),
            self.target.id()
        )
    }

    fn redact(&self, err: DeviceError) -> DeviceError {
        err.redact(&[&self.api_key])
    }

    fn rejected(&self, kind: i64, description: &str) -> DeviceError {
        if kind == UNAUTHORIZED_USER {
            DeviceError::Device(format!(
                "unauthorized access to {}; check your API key",
                self.label
            ))
        } else {
            DeviceError::Device(format!("{} rejected the request: {}", self.label, description))
        }
    }

    async fn fetch(&self) -> Result<HueResource> {
        debug!(bridge = %self.bridge_ip, target = ?self.target, "Hue fetch");

        let response = self
            .client
            .get(self.resource_url())
            .send()
            .await
            .map_err(|e| self.redact(http_error(&self.label, e)))?;
        if !response.status().is_success() {
            return Err(DeviceError::Device(format!(
                "{} returned {}",
                self.label,
                response.status()
            )));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| self.redact(http_error(&self.label, e)))?;

        if let Some((kind, description)) = bridge_error(&body) {
            return Err(self.redact(self.rejected(kind, &description)));
        }
        serde_json::from_value(body).map_err(|e| {
            DeviceError::Device(format!("{} sent an unexpected reply: {}", self.label, e))
        })
    }

    async fn command(&self, body: Value) -> Result<()> {
        debug!(bridge = %self.bridge_ip, target = ?self.target, %body, "Hue command");

        let url = format!("{}/{}", self.resource_url(), self.target.command());
        let response = self
            .client
            .put(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.redact(http_error(&self.label, e)))?;
        if !response.status().is_success() {
            return Err(DeviceError::Device(format!(
                "{} returned {}",
                self.label,
                response.status()
            )));
        }
        let reply: Value = response
            .json()
            .await
            .map_err(|e| self.redact(http_error(&self.label, e)))?;

        debug!(bridge = %self.bridge_ip, %reply, "Hue response");
        match bridge_error(&reply) {
            Some((kind, description)) => Err(self.redact(self.rejected(kind, &description))),
            None => Ok(()),
        }
    }
}

/// Percent to the bridge's 1-254 scale.
fn to_bri(level: Brightness) -> u8 {
    (f64::from(level.percent()) * 254.0 / 100.0).round().max(1.0) as u8
}

fn from_bri(bri: u8) -> u8 {
    (f64::from(bri) * 100.0 / 254.0).round().min(100.0) as u8
}

#[async_trait]
impl SmartDevice for HueLight {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Hue
    }

    fn device_type(&self) -> &'static str {
        "light"
    }

    async fn turn_on(&self) -> Result<()> {
        self.command(json!({ "on": true })).await
    }

    async fn turn_off(&self) -> Result<()> {
        self.command(json!({ "on": false })).await
    }

    async fn is_on(&self) -> Result<bool> {
        Ok(self.fetch().await?.into_state(&self.target)?.on)
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        let mut resource = self.fetch().await?;
        let name = resource.name.take();
        let model = resource.modelid.take();
        let state = resource.into_state(&self.target)?;

        let mut status = DeviceStatus::new(self, state.on).detail("bridge_ip", self.bridge_ip.as_str());
        status = match &self.target {
            HueTarget::Light(id) => status.detail("light_id", id.as_str()),
            HueTarget::Group(id) => status.detail("group_id", id.as_str()),
        };
        status.name = Some(name.unwrap_or_else(|| match &self.target {
            HueTarget::Light(id) => format!("Light {}", id),
            HueTarget::Group(id) => format!("Group {}", id),
        }));
        status.model = model;
        status.brightness = state.bri.map(from_bri);
        if let Some([x, y]) = state.xy {
            status = status.detail("xy", json!([x, y]));
        }
        if let Some(mode) = state.colormode {
            status = status.detail("colormode", mode);
        }
        if let Some(reachable) = state.reachable {
            status = status.detail("reachable", reachable);
        }
        Ok(status)
    }
}

#[async_trait]
impl LightControl for HueLight {
    async fn set_brightness(&self, level: Brightness) -> Result<()> {
        self.command(json!({ "bri": to_bri(level) })).await
    }

    async fn set_color(&self, color: Rgb) -> Result<()> {
        let (x, y) = color.to_xy().ok_or_else(|| {
            DeviceError::Validation(
                "Hue lights cannot show black; turn the light off instead".to_string(),
            )
        })?;
        self.command(json!({ "xy": [x, y] })).await
    }
}
