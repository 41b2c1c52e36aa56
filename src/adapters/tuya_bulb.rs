//! Tuya-based bulbs (Geeni, Cree Connected)
//!
//! Both speak the same local protocol; they differ only in which data
//! points carry power, mode, brightness and colour.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::tuya::TuyaClient;
use super::{Brightness, DeviceKind, DeviceStatus, LightControl, SmartDevice};
use crate::color::{Hsv, Rgb};
use crate::config::TuyaConfig;
use crate::error::{DeviceError, Result};

/// How a bulb encodes colour in its colour data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorFormat {
    /// `rrggbb0hhhssvv`: RGB hex, then hue (4 digits), saturation and
    /// value (2 digits each, 0-255)
    RgbHsv,
    /// `hhhhssssvvvv`: hue, saturation and value, 4 digits each, s/v 0-1000
    Hsv,
}

impl ColorFormat {
    pub fn encode(self, color: Rgb) -> String {
        self.format(color, color.to_hsv())
    }

    /// Encode an HSV triple as given, so hue and saturation survive a
    /// change of value.
    pub fn encode_hsv(self, hsv: Hsv) -> String {
        self.format(hsv.to_rgb(), hsv)
    }

    fn format(self, color: Rgb, hsv: Hsv) -> String {
        let hue = hsv.hue.round() as u16;
        match self {
            ColorFormat::RgbHsv => format!(
                "{:02x}{:02x}{:02x}{:04x}{:02x}{:02x}",
                color.r,
                color.g,
                color.b,
                hue,
                (hsv.saturation * 255.0).round() as u8,
                (hsv.value * 255.0).round() as u8
            ),
            ColorFormat::Hsv => format!(
                "{:04x}{:04x}{:04x}",
                hue,
                (hsv.saturation * 1000.0).round() as u16,
                (hsv.value * 1000.0).round() as u16
            ),
        }
    }

    pub fn decode(self, raw: &str) -> Option<Rgb> {
        match self {
            ColorFormat::RgbHsv => Some(Rgb::new(
                u8::try_from(hex_field(raw, 0..2)?).ok()?,
                u8::try_from(hex_field(raw, 2..4)?).ok()?,
                u8::try_from(hex_field(raw, 4..6)?).ok()?,
            )),
            ColorFormat::Hsv => self.decode_hsv(raw).map(Hsv::to_rgb),
        }
    }

    pub fn decode_hsv(self, raw: &str) -> Option<Hsv> {
        let (hue, saturation, value, scale) = match self {
            ColorFormat::RgbHsv => (
                hex_field(raw, 6..10)?,
                hex_field(raw, 10..12)?,
                hex_field(raw, 12..14)?,
                255,
            ),
            ColorFormat::Hsv => (
                hex_field(raw, 0..4)?,
                hex_field(raw, 4..8)?,
                hex_field(raw, 8..12)?,
                1000,
            ),
        };
        Some(Hsv {
            hue: f64::from(hue % 360),
            saturation: f64::from(saturation.min(scale)) / f64::from(scale),
            value: f64::from(value.min(scale)) / f64::from(scale),
        })
    }
}

fn hex_field(raw: &str, range: std::ops::Range<usize>) -> Option<u16> {
    raw.get(range).and_then(|s| u16::from_str_radix(s, 16).ok())
}

/// Data point indices for one bulb family.
#[derive(Debug, PartialEq, Eq)]
pub struct DpsLayout {
    pub power: &'static str,
    pub mode: &'static str,
    pub brightness: &'static str,
    pub color: &'static str,
    pub brightness_range: (u32, u32),
    pub color_format: ColorFormat,
}

pub const GEENI: DpsLayout = DpsLayout {
    power: "1",
    mode: "2",
    brightness: "3",
    color: "5",
    brightness_range: (25, 255),
    color_format: ColorFormat::RgbHsv,
};

pub const CREE: DpsLayout = DpsLayout {
    power: "20",
    mode: "21",
    brightness: "22",
    color: "24",
    brightness_range: (10, 1000),
    color_format: ColorFormat::Hsv,
};

/// A Tuya bulb, tagged with the brand it was configured as.
pub struct TuyaBulb {
    kind: DeviceKind,
    layout: &'static DpsLayout,
    client: TuyaClient,
    device_ip: String,
    label: String,
}

impl TuyaBulb {
    pub fn geeni(config: TuyaConfig) -> Result<Self> {
        Self::build(DeviceKind::Geeni, &GEENI, "Geeni", config)
    }

    pub fn cree(config: TuyaConfig) -> Result<Self> {
        Self::build(DeviceKind::Cree, &CREE, "Cree", config)
    }

    fn build(
        kind: DeviceKind,
        layout: &'static DpsLayout,
        brand: &str,
        config: TuyaConfig,
    ) -> Result<Self> {
        let label = format!("{} device at {}", brand, config.device_ip.trim());
        let client = TuyaClient::new(
            &config.device_id,
            &config.device_ip,
            &config.local_key,
            config.version()?,
            label.clone(),
        )?;
        Ok(Self {
            kind,
            layout,
            client,
            device_ip: config.device_ip.trim().to_string(),
            label,
        })
    }

    pub fn layout(&self) -> &'static DpsLayout {
        self.layout
    }

    fn power(&self, dps: &Map<String, Value>) -> Result<bool> {
        dps.get(self.layout.power)
            .and_then(Value::as_bool)
            .ok_or_else(|| {
                DeviceError::Device(format!(
                    "{} did not report its power state (DP {})",
                    self.label, self.layout.power
                ))
            })
    }

    async fn write<const N: usize>(&self, points: [(&str, Value); N]) -> Result<()> {
        let dps: Map<String, Value> = points
            .into_iter()
            .map(|(dp, value)| (dp.to_string(), value))
            .collect();
        self.client.control(dps).await
    }
}

#[async_trait]
impl SmartDevice for TuyaBulb {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn device_type(&self) -> &'static str {
        "light"
    }

    async fn turn_on(&self) -> Result<()> {
        self.write([(self.layout.power, Value::Bool(true))]).await
    }

    async fn turn_off(&self) -> Result<()> {
        self.write([(self.layout.power, Value::Bool(false))]).await
    }

    async fn is_on(&self) -> Result<bool> {
        let dps = self.client.query().await?;
        self.power(&dps)
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        let dps = self.client.query().await?;
        let layout = self.layout;

        let mut status = DeviceStatus::new(self, self.power(&dps)?)
            .detail("device_id", self.client.device_id())
            .detail("device_ip", self.device_ip.as_str())
            .detail("protocol_version", self.client.version().as_str());
        status.brightness = dps
            .get(layout.brightness)
            .and_then(Value::as_u64)
            .map(|raw| {
                let (min, max) = layout.brightness_range;
                Brightness::from_scaled(u32::try_from(raw).unwrap_or(max), min, max).percent()
            });
        status.color = dps
            .get(layout.color)
            .and_then(Value::as_str)
            .and_then(|raw| layout.color_format.decode(raw))
            .map(Rgb::to_hex);
        if let Some(mode) = dps.get(layout.mode).and_then(Value::as_str) {
            status = status.detail("mode", mode);
        }
        Ok(status.detail("raw_dps", Value::Object(dps)))
    }
}

#[async_trait]
impl LightControl for TuyaBulb {
    /// In colour mode the colour's value is rescaled and hue and saturation
    /// kept; otherwise only the white brightness point is written. The mode
    /// point is never touched.
    async fn set_brightness(&self, level: Brightness) -> Result<()> {
        let layout = self.layout;
        let (min, max) = layout.brightness_range;
        let scaled = level.scale(min, max);

        let dps = self.client.query().await?;
        let current = match dps.get(layout.mode).and_then(Value::as_str) {
            Some("colour") => dps
                .get(layout.color)
                .and_then(Value::as_str)
                .and_then(|raw| layout.color_format.decode_hsv(raw)),
            _ => None,
        };

        match current {
            Some(hsv) => {
                let hsv = Hsv {
                    value: f64::from(scaled) / f64::from(max),
                    ..hsv
                };
                self.write([(layout.color, Value::from(layout.color_format.encode_hsv(hsv)))])
                    .await
            }
            None => self.write([(layout.brightness, Value::from(scaled))]).await,
        }
    }

    async fn set_color(&self, color: Rgb) -> Result<()> {
        self.write([
            (self.layout.mode, Value::from("colour")),
            (self.layout.color, Value::from(self.layout.color_format.encode(color))),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::tuya::tests::{start_fake_bulb, LOCAL_KEY};
    use crate::adapters::Device;
    use secrecy::SecretString;
    use serde_json::json;

    fn config(addr: &str, version: &str) -> TuyaConfig {
        TuyaConfig {
            device_id: "bf0123456789abcdef".to_string(),
            device_ip: addr.to_string(),
            local_key: SecretString::from(LOCAL_KEY.to_string()),
            device_version: version.to_string(),
        }
    }

    #[test]
    fn test_geeni_color_encoding() {
        assert_eq!(ColorFormat::RgbHsv.encode(Rgb::new(255, 0, 0)), "ff00000000ffff");
        assert_eq!(ColorFormat::RgbHsv.encode(Rgb::new(0, 0, 255)), "0000ff00f0ffff");
        assert_eq!(
            ColorFormat::RgbHsv.decode("00ff000078ffff"),
            Some(Rgb::new(0, 255, 0))
        );
        assert_eq!(ColorFormat::RgbHsv.decode("zz"), None);
    }

    #[test]
    fn test_cree_color_encoding() {
        assert_eq!(ColorFormat::Hsv.encode(Rgb::new(0, 0, 255)), "00f003e803e8");
        assert_eq!(ColorFormat::Hsv.encode(Rgb::new(255, 255, 255)), "0000000003e8");
        assert_eq!(ColorFormat::Hsv.decode("007803e803e8"), Some(Rgb::new(0, 255, 0)));
        assert_eq!(ColorFormat::Hsv.decode("0078"), None);
    }

    #[tokio::test]
    async fn test_geeni_turn_on_then_off() {
        let (addr, state) = start_fake_bulb(
            crate::adapters::tuya::Version::V33,
            json!({ "1": false, "2": "white", "3": 25 }),
        )
        .await;
        let bulb = TuyaBulb::geeni(config(&addr, "3.3")).unwrap();

        bulb.turn_on().await.unwrap();
        assert!(bulb.is_on().await.unwrap());
        bulb.turn_off().await.unwrap();
        assert!(!bulb.is_on().await.unwrap());
        assert_eq!(state.lock().unwrap().controls[0], json!({ "1": true }));
    }

    #[tokio::test]
    async fn test_cree_turn_on_over_v31() {
        let (addr, state) =
            start_fake_bulb(crate::adapters::tuya::Version::V31, json!({ "20": false })).await;
        let bulb = TuyaBulb::cree(config(&addr, "3.1")).unwrap();

        bulb.turn_on().await.unwrap();
        assert!(bulb.is_on().await.unwrap());
        assert_eq!(state.lock().unwrap().dps["20"], json!(true));
    }

    #[tokio::test]
    async fn test_brightness_in_white_mode_is_scaled() {
        let (addr, state) = start_fake_bulb(
            crate::adapters::tuya::Version::V33,
            json!({ "20": true, "21": "white", "22": 10 }),
        )
        .await;
        let bulb = TuyaBulb::cree(config(&addr, "3.3")).unwrap();

        bulb.set_brightness(Brightness::new(50).unwrap()).await.unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.controls[0], json!({ "22": 505 }));
        assert_eq!(state.dps["21"], json!("white"));
    }

    #[tokio::test]
    async fn test_brightness_keeps_colour() {
        let (addr, state) = start_fake_bulb(
            crate::adapters::tuya::Version::V33,
            json!({ "1": true, "2": "white", "3": 255 }),
        )
        .await;
        let bulb = TuyaBulb::geeni(config(&addr, "3.3")).unwrap();

        bulb.set_color(Rgb::new(255, 0, 0)).await.unwrap();
        bulb.set_brightness(Brightness::new(50).unwrap()).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.controls[1], json!({ "5": "8c00000000ff8c" }));
        assert_eq!(state.dps["2"], json!("colour"));
        let hsv = ColorFormat::RgbHsv
            .decode_hsv(state.dps["5"].as_str().unwrap())
            .unwrap();
        assert_eq!(hsv.hue, 0.0);
        assert_eq!(hsv.saturation, 1.0);
    }

    #[tokio::test]
    async fn test_cree_brightness_keeps_hue_and_saturation() {
        let (addr, state) = start_fake_bulb(
            crate::adapters::tuya::Version::V33,
            json!({ "20": true, "21": "colour", "24": "00f003e803e8" }),
        )
        .await;
        let bulb = TuyaBulb::cree(config(&addr, "3.3")).unwrap();

        bulb.set_brightness(Brightness::new(50).unwrap()).await.unwrap();
        let state = state.lock().unwrap();
        assert_eq!(state.controls[0], json!({ "24": "00f003e801f9" }));
        assert_eq!(state.dps["21"], json!("colour"));
    }

    #[tokio::test]
    async fn test_color_switches_to_colour_mode() {
        let (addr, state) =
            start_fake_bulb(crate::adapters::tuya::Version::V33, json!({ "1": true })).await;
        let bulb = TuyaBulb::geeni(config(&addr, "3.3")).unwrap();

        bulb.set_color(Rgb::new(255, 0, 0)).await.unwrap();
        assert_eq!(
            state.lock().unwrap().controls[0],
            json!({ "2": "colour", "5": "ff00000000ffff" })
        );
    }

    #[tokio::test]
    async fn test_status_decodes_data_points() {
        let (addr, _) = start_fake_bulb(
            crate::adapters::tuya::Version::V33,
            json!({ "1": true, "2": "colour", "3": 255, "5": "00ff000078ffff" }),
        )
        .await;
        let bulb = TuyaBulb::geeni(config(&addr, "3.3")).unwrap();

        let status = bulb.get_status().await.unwrap();
        assert!(status.is_on);
        assert_eq!(status.brand, "geeni");
        assert_eq!(status.device_type, "light");
        assert_eq!(status.brightness, Some(100));
        assert_eq!(status.color.as_deref(), Some("#00ff00"));
        assert_eq!(status.details["mode"], json!("colour"));
        assert_eq!(status.details["protocol_version"], json!("3.3"));
        assert_eq!(status.details["raw_dps"]["3"], json!(255));
    }

    #[tokio::test]
    async fn test_missing_power_point_is_device_error() {
        let (addr, _) =
            start_fake_bulb(crate::adapters::tuya::Version::V33, json!({ "1": true })).await;
        let bulb = TuyaBulb::cree(config(&addr, "3.3")).unwrap();

        match bulb.is_on().await {
            Err(DeviceError::Device(msg)) => assert!(msg.contains("DP 20"), "{}", msg),
            other => panic!("expected Device error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_invalid_brightness_never_reaches_the_bulb() {
        let (addr, state) =
            start_fake_bulb(crate::adapters::tuya::Version::V33, json!({ "1": true })).await;
        let device = Device::Geeni(TuyaBulb::geeni(config(&addr, "3.3")).unwrap());

        let result = device.set_brightness(150).await;
        assert!(matches!(result, Err(DeviceError::Validation(_))));
        let result = device.set_color("chartreuse").await;
        assert!(matches!(result, Err(DeviceError::Validation(_))));
        assert!(state.lock().unwrap().commands.is_empty());
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let result = TuyaBulb::cree(config("10.0.0.7", "3.4"));
        assert!(matches!(result, Err(DeviceError::Configuration(_))));
    }
}
