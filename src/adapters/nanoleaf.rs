//! Nanoleaf adapter (Light Panels, Canvas, Shapes) over the local OpenAPI

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::{endpoint, http_error, Brightness, DeviceKind, DeviceStatus, LightControl, SmartDevice};
use crate::color::Rgb;
use crate::error::{DeviceError, Result};

const OPENAPI_PORT: u16 = 16021;

#[derive(Debug, Default, Deserialize)]
struct Ranged {
    #[serde(default)]
    value: i64,
    #[serde(default)]
    min: Option<i64>,
    #[serde(default)]
    max: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct OnState {
    #[serde(default)]
    value: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PanelState {
    #[serde(default)]
    on: OnState,
    #[serde(default)]
    brightness: Option<Ranged>,
    #[serde(default)]
    color_mode: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Effects {
    #[serde(default)]
    select: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PanelInfo {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    state: PanelState,
    #[serde(default)]
    effects: Effects,
}

/// A Nanoleaf controller, addressed by IP and paired auth token.
pub struct NanoleafPanels {
    device_ip: String,
    base_url: String,
    auth_token: SecretString,
    client: Client,
    label: String,
}

impl NanoleafPanels {
    pub fn new(device_ip: &str, auth_token: SecretString, client: Client) -> Result<Self> {
        let device_ip = device_ip.trim();
        if device_ip.is_empty() {
            return Err(DeviceError::Configuration(
                "device_ip is required and cannot be empty".to_string(),
            ));
        }
        let token = auth_token.expose_secret().trim();
        if token.is_empty() {
            return Err(DeviceError::Configuration(
                "auth_token is required and cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            device_ip: device_ip.to_string(),
            base_url: format!("http://{}/api/v1", endpoint(device_ip, OPENAPI_PORT)),
            auth_token: SecretString::from(token.to_string()),
            client,
            label: format!("Nanoleaf device at {}", device_ip),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}{}",
            self.base_url,
            self.auth_token.expose_secret(),
            path
        )
    }

    /// Non-2xx replies, with the re-pair hint for rejected tokens.
    fn check(&self, response: Response) -> Result<Response> {
        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(DeviceError::Device(format!(
                "authentication failed for {}; hold the power button for 5-7 seconds \
                 and generate a new auth token",
                self.label
            ))),
            status => Err(DeviceError::Device(format!(
                "{} returned {}",
                self.label, status
            ))),
        }
    }

    async fn info(&self) -> Result<PanelInfo> {
        let response = self
            .client
            .get(self.url("/"))
            .send()
            .await
            .map_err(|e| http_error(&self.label, e).redact(&[&self.auth_token]))?;
        self.check(response)?
            .json()
            .await
            .map_err(|e| http_error(&self.label, e).redact(&[&self.auth_token]))
    }

    async fn put_state(&self, body: Value) -> Result<()> {
        debug!(device = %self.device_ip, %body, "Nanoleaf state");
        let response = self
            .client
            .put(self.url("/state"))
            .json(&body)
            .send()
            .await
            .map_err(|e| http_error(&self.label, e).redact(&[&self.auth_token]))?;
        self.check(response).map(|_| ())
    }
}

#[async_trait]
impl SmartDevice for NanoleafPanels {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Nanoleaf
    }

    fn device_type(&self) -> &'static str {
        "light"
    }

    async fn turn_on(&self) -> Result<()> {
        self.put_state(json!({ "on": { "value": true } })).await
    }

    async fn turn_off(&self) -> Result<()> {
        self.put_state(json!({ "on": { "value": false } })).await
    }

    async fn is_on(&self) -> Result<bool> {
        Ok(self.info().await?.state.on.value)
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        let info = self.info().await?;

        let mut status = DeviceStatus::new(self, info.state.on.value)
            .detail("device_ip", self.device_ip.as_str());
        status.name = Some(info.name.unwrap_or_else(|| "Unknown".to_string()));
        status.model = Some(info.model.unwrap_or_else(|| "Unknown".to_string()));
        if let Some(brightness) = info.state.brightness {
            status.brightness = Some(brightness.value.clamp(0, 100) as u8);
            status = status
                .detail("brightness_min", brightness.min.unwrap_or(0))
                .detail("brightness_max", brightness.max.unwrap_or(100));
        }
        if let Some(mode) = info.state.color_mode {
            status = status.detail("color_mode", mode);
        }
        if let Some(effect) = info.effects.select {
            status = status.detail("current_effect", effect);
        }
        Ok(status)
    }
}

#[async_trait]
impl LightControl for NanoleafPanels {
    async fn set_brightness(&self, level: Brightness) -> Result<()> {
        self.put_state(json!({ "brightness": { "value": level.percent() } }))
            .await
    }

    async fn set_color(&self, color: Rgb) -> Result<()> {
        let hsv = color.to_hsv();
        self.put_state(json!({
            "hue": { "value": hsv.hue.round() as u16 },
            "sat": { "value": (hsv.saturation * 100.0).round() as u8 },
            "brightness": { "value": (hsv.value * 100.0).round() as u8 },
        }))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const TOKEN: &str = "nl-token-abcdef";

    fn panels(server: &MockServer) -> NanoleafPanels {
        NanoleafPanels::new(
            &server.address().to_string(),
            SecretString::from(TOKEN.to_string()),
            Client::new(),
        )
        .unwrap()
    }

    async fn stateful_panels() -> MockServer {
        let server = MockServer::start().await;
        let on = Arc::new(AtomicBool::new(false));

        let written = on.clone();
        Mock::given(method("PUT"))
            .and(path(format!("/api/v1/{}/state", TOKEN)))
            .respond_with(move |req: &Request| {
                let body: Value = serde_json::from_slice(&req.body).unwrap();
                if let Some(value) = body.pointer("/on/value").and_then(Value::as_bool) {
                    written.store(value, Ordering::SeqCst);
                }
                ResponseTemplate::new(204)
            })
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path(format!("/api/v1/{}/", TOKEN)))
            .respond_with(move |_: &Request| {
                ResponseTemplate::new(200).set_body_json(json!({
                    "name": "Shapes 4F2A",
                    "model": "NL42",
                    "state": {
                        "on": { "value": on.load(Ordering::SeqCst) },
                        "brightness": { "value": 70, "min": 0, "max": 100 },
                        "colorMode": "effect"
                    },
                    "effects": { "select": "Northern Lights" }
                }))
            })
            .mount(&server)
            .await;

        server
    }

    #[tokio::test]
    async fn test_turn_on_then_off() {
        let server = stateful_panels().await;
        let nl = panels(&server);

        nl.turn_on().await.unwrap();
        assert!(nl.is_on().await.unwrap());
        nl.turn_off().await.unwrap();
        assert!(!nl.is_on().await.unwrap());
    }

    #[tokio::test]
    async fn test_status() {
        let server = stateful_panels().await;
        let status = panels(&server).get_status().await.unwrap();

        assert!(!status.is_on);
        assert_eq!(status.brand, "nanoleaf");
        assert_eq!(status.name.as_deref(), Some("Shapes 4F2A"));
        assert_eq!(status.model.as_deref(), Some("NL42"));
        assert_eq!(status.brightness, Some(70));
        assert_eq!(status.details["color_mode"], json!("effect"));
        assert_eq!(status.details["current_effect"], json!("Northern Lights"));
    }

    #[tokio::test]
    async fn test_color_is_sent_as_hsv() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(format!("/api/v1/{}/state", TOKEN)))
            .and(body_json(json!({
                "hue": { "value": 240 },
                "sat": { "value": 100 },
                "brightness": { "value": 100 }
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        panels(&server).set_color(Rgb::new(0, 0, 255)).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_token_hints_repair() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        match panels(&server).turn_on().await {
            Err(DeviceError::Device(msg)) => {
                assert!(msg.contains("new auth token"), "{}", msg);
                assert!(!msg.contains(TOKEN));
            }
            other => panic!("expected Device error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_is_connection_error() {
        let server = MockServer::start().await;
        let nl = panels(&server);
        drop(server);

        match nl.is_on().await {
            Err(err @ DeviceError::Connection { .. }) => {
                assert!(!err.to_string().contains(TOKEN))
            }
            other => panic!("expected Connection error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = NanoleafPanels::new(
            "10.0.0.9",
            SecretString::from("  ".to_string()),
            Client::new(),
        );
        assert!(matches!(result, Err(DeviceError::Configuration(_))));
    }
}
