//! Vendor device adapters (TP-Link Kasa, Philips Hue, Nanoleaf, Tuya bulbs)
//!
//! Every adapter implements [`SmartDevice`]; light-type adapters also
//! implement [`LightControl`]. The registry stores the closed [`Device`]
//! enum so the HTTP layer can dispatch without knowing vendors.

pub mod hue;
pub mod nanoleaf;
pub mod tplink;
pub mod tplink_schedule;
pub mod tuya;
pub mod tuya_bulb;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

use crate::color::Rgb;
use crate::config::DeviceConfig;
use crate::error::{DeviceError, Result};

pub use hue::{HueLight, HueTarget};
pub use nanoleaf::NanoleafPanels;
pub use tplink::TpLinkPlug;
pub use tuya_bulb::TuyaBulb;

/// Configuration tag of a device. Also doubles as its brand name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    #[serde(rename = "tplink")]
    TpLink,
    Hue,
    Nanoleaf,
    Geeni,
    Cree,
}

impl DeviceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DeviceKind::TpLink => "tplink",
            DeviceKind::Hue => "hue",
            DeviceKind::Nanoleaf => "nanoleaf",
            DeviceKind::Geeni => "geeni",
            DeviceKind::Cree => "cree",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Brightness percentage, validated to `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brightness(u8);

impl Brightness {
    pub fn new(level: i64) -> Result<Self> {
        match u8::try_from(level) {
            Ok(level) if level <= 100 => Ok(Self(level)),
            _ => Err(DeviceError::Validation(format!(
                "brightness must be between 0 and 100, got {}",
                level
            ))),
        }
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    /// Map the percentage linearly onto a vendor range.
    pub fn scale(self, min: u32, max: u32) -> u32 {
        let span = f64::from(max - min);
        min + (span * f64::from(self.0) / 100.0).round() as u32
    }

    /// Inverse of [`Brightness::scale`], clamped to `0..=100`.
    pub fn from_scaled(raw: u32, min: u32, max: u32) -> Self {
        if max <= min {
            return Self(0);
        }
        let raw = raw.clamp(min, max);
        let percent = (f64::from(raw - min) * 100.0 / f64::from(max - min)).round();
        Self(percent as u8)
    }
}

/// Optional capabilities, reported to the UI and JSON API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub brightness: bool,
    pub color: bool,
    pub schedules: bool,
}

/// Live status snapshot. Never contains credentials.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceStatus {
    pub is_on: bool,
    pub brand: &'static str,
    pub device_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Percentage 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<u8>,
    /// `#rrggbb`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Vendor-specific telemetry
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl DeviceStatus {
    pub fn new(device: &dyn SmartDevice, is_on: bool) -> Self {
        Self {
            is_on,
            brand: device.brand(),
            device_type: device.device_type(),
            name: None,
            model: None,
            brightness: None,
            color: None,
            details: Map::new(),
        }
    }

    pub fn detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Capability contract every vendor adapter satisfies.
#[async_trait]
pub trait SmartDevice: Send + Sync {
    fn kind(&self) -> DeviceKind;

    /// `plug` or `light`
    fn device_type(&self) -> &'static str;

    fn brand(&self) -> &'static str {
        self.kind().as_str()
    }

    async fn turn_on(&self) -> Result<()>;

    async fn turn_off(&self) -> Result<()>;

    async fn is_on(&self) -> Result<bool>;

    async fn get_status(&self) -> Result<DeviceStatus>;
}

/// Secondary capability for dimmable, colored lights.
#[async_trait]
pub trait LightControl: SmartDevice {
    async fn set_brightness(&self, level: Brightness) -> Result<()>;

    async fn set_color(&self, color: Rgb) -> Result<()>;
}

/// A configured device. Closed over the supported vendors.
pub enum Device {
    TpLink(TpLinkPlug),
    Hue(HueLight),
    Nanoleaf(NanoleafPanels),
    Geeni(TuyaBulb),
    Cree(TuyaBulb),
}

impl Device {
    /// Construct the adapter for a validated configuration record.
    pub fn from_config(config: DeviceConfig, http: &reqwest::Client) -> Result<Self> {
        Ok(match config {
            DeviceConfig::TpLink(c) => Device::TpLink(TpLinkPlug::new(&c.device_ip)?),
            DeviceConfig::Hue(c) => {
                let target = c.target()?;
                Device::Hue(HueLight::new(&c.bridge_ip, c.api_key, target, http.clone())?)
            }
            DeviceConfig::Nanoleaf(c) => Device::Nanoleaf(NanoleafPanels::new(
                &c.device_ip,
                c.auth_token,
                http.clone(),
            )?),
            DeviceConfig::Geeni(c) => Device::Geeni(TuyaBulb::geeni(c)?),
            DeviceConfig::Cree(c) => Device::Cree(TuyaBulb::cree(c)?),
        })
    }

    fn inner(&self) -> &dyn SmartDevice {
        match self {
            Device::TpLink(d) => d,
            Device::Hue(d) => d,
            Device::Nanoleaf(d) => d,
            Device::Geeni(d) | Device::Cree(d) => d,
        }
    }

    /// Light capability, if this device has one.
    pub fn light(&self) -> Option<&dyn LightControl> {
        match self {
            Device::TpLink(_) => None,
            Device::Hue(d) => Some(d),
            Device::Nanoleaf(d) => Some(d),
            Device::Geeni(d) | Device::Cree(d) => Some(d),
        }
    }

    pub fn as_tplink(&self) -> Option<&TpLinkPlug> {
        match self {
            Device::TpLink(plug) => Some(plug),
            _ => None,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let light = self.light().is_some();
        Capabilities {
            brightness: light,
            color: light,
            schedules: self.as_tplink().is_some(),
        }
    }

    pub fn kind(&self) -> DeviceKind {
        self.inner().kind()
    }

    pub fn brand(&self) -> &'static str {
        self.inner().brand()
    }

    pub fn device_type(&self) -> &'static str {
        self.inner().device_type()
    }

    pub async fn turn_on(&self) -> Result<()> {
        self.inner().turn_on().await
    }

    pub async fn turn_off(&self) -> Result<()> {
        self.inner().turn_off().await
    }

    pub async fn is_on(&self) -> Result<bool> {
        self.inner().is_on().await
    }

    pub async fn get_status(&self) -> Result<DeviceStatus> {
        self.inner().get_status().await
    }

    /// Flip the power state; returns the new state.
    pub async fn toggle(&self) -> Result<bool> {
        if self.is_on().await? {
            self.turn_off().await?;
            Ok(false)
        } else {
            self.turn_on().await?;
            Ok(true)
        }
    }

    /// Range is checked before any network call.
    pub async fn set_brightness(&self, level: i64) -> Result<()> {
        let light = self.require_light("brightness control")?;
        light.set_brightness(Brightness::new(level)?).await
    }

    /// Accepts `#RRGGBB` or a palette name; parsed before any network call.
    pub async fn set_color(&self, color: &str) -> Result<()> {
        let light = self.require_light("color control")?;
        light.set_color(color.parse()?).await
    }

    fn require_light(&self, capability: &'static str) -> Result<&dyn LightControl> {
        self.light().ok_or(DeviceError::NotSupported {
            brand: self.brand(),
            capability,
        })
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind())
            .field("device_type", &self.device_type())
            .finish()
    }
}

/// `host:port`, appending the vendor default port when the configured
/// address has none.
pub(crate) fn endpoint(address: &str, default_port: u16) -> String {
    let address = address.trim();
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            address.to_string()
        }
        _ => format!("{}:{}", address, default_port),
    }
}

/// Map a reqwest failure onto the two-tier taxonomy. URLs are dropped
/// because vendor credentials live in request paths.
pub(crate) fn http_error(device: &str, err: reqwest::Error) -> DeviceError {
    let err = err.without_url();
    if err.is_connect() || err.is_timeout() || err.is_request() {
        DeviceError::connection(device, err)
    } else {
        DeviceError::Device(format!("{}: {}", device, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brightness_range() {
        assert_eq!(Brightness::new(0).unwrap().percent(), 0);
        assert_eq!(Brightness::new(100).unwrap().percent(), 100);
        assert!(matches!(Brightness::new(-1), Err(DeviceError::Validation(_))));
        assert!(matches!(Brightness::new(101), Err(DeviceError::Validation(_))));
        assert!(matches!(Brightness::new(i64::MAX), Err(DeviceError::Validation(_))));
    }

    #[test]
    fn test_brightness_scaling() {
        let half = Brightness::new(50).unwrap();
        assert_eq!(half.scale(10, 1000), 505);
        assert_eq!(Brightness::new(0).unwrap().scale(25, 255), 25);
        assert_eq!(Brightness::new(100).unwrap().scale(25, 255), 255);

        assert_eq!(Brightness::from_scaled(505, 10, 1000).percent(), 50);
        assert_eq!(Brightness::from_scaled(5, 10, 1000).percent(), 0);
        assert_eq!(Brightness::from_scaled(5000, 10, 1000).percent(), 100);
    }

    #[test]
    fn test_endpoint_appends_default_port() {
        assert_eq!(endpoint("192.168.1.50", 9999), "192.168.1.50:9999");
        assert_eq!(endpoint(" 192.168.1.50 ", 9999), "192.168.1.50:9999");
        assert_eq!(endpoint("127.0.0.1:4000", 9999), "127.0.0.1:4000");
        assert_eq!(endpoint("plug.local", 80), "plug.local:80");
    }

    #[tokio::test]
    async fn test_light_calls_on_plug_are_not_supported() {
        let plug = Device::TpLink(TpLinkPlug::new("127.0.0.1:1").unwrap());
        assert!(!plug.capabilities().brightness);
        assert!(plug.capabilities().schedules);

        let result = plug.set_brightness(50).await;
        assert!(
            matches!(result, Err(DeviceError::NotSupported { brand: "tplink", .. })),
            "got {:?}",
            result
        );
        let result = plug.set_color("#ff0000").await;
        assert!(matches!(result, Err(DeviceError::NotSupported { .. })));
    }
}
