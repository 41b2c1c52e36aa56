//! TP-Link Kasa smart plug adapter
//!
//! Speaks the Kasa local protocol: JSON over TCP port 9999, obfuscated with
//! an XOR autokey cipher (initial key 171) and framed by a 4-byte big-endian
//! length. One connection per request.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{endpoint, DeviceKind, DeviceStatus, SmartDevice};
use crate::error::{DeviceError, Result};

const KASA_PORT: u16 = 9999;
const INITIAL_KEY: u8 = 171;
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(5);
/// Replies larger than this are not from a plug
const MAX_REPLY_LEN: usize = 64 * 1024;

/// Encrypt and length-prefix a request.
pub(crate) fn encrypt(plain: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(plain.len() + 4);
    out.extend_from_slice(&(plain.len() as u32).to_be_bytes());
    let mut key = INITIAL_KEY;
    for byte in plain {
        key ^= byte;
        out.push(key);
    }
    out
}

/// Decrypt a payload (without its length prefix).
pub(crate) fn decrypt(cipher: &[u8]) -> Vec<u8> {
    let mut key = INITIAL_KEY;
    cipher
        .iter()
        .map(|&byte| {
            let plain = key ^ byte;
            key = byte;
            plain
        })
        .collect()
}

/// Subset of `system.get_sysinfo` we read.
#[derive(Debug, Deserialize)]
struct SysInfo {
    #[serde(default)]
    relay_state: u8,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    feature: String,
    #[serde(default)]
    mac: Option<String>,
    #[serde(default)]
    on_time: Option<u64>,
    #[serde(default)]
    rssi: Option<i64>,
}

/// Kasa smart plug on the local network.
pub struct TpLinkPlug {
    device_ip: String,
    endpoint: String,
    label: String,
}

impl TpLinkPlug {
    pub fn new(device_ip: &str) -> Result<Self> {
        let device_ip = device_ip.trim();
        if device_ip.is_empty() {
            return Err(DeviceError::Configuration(
                "device_ip is required and cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            device_ip: device_ip.to_string(),
            endpoint: endpoint(device_ip, KASA_PORT),
            label: format!("TP-Link device at {}", device_ip),
        })
    }

    pub fn device_ip(&self) -> &str {
        &self.device_ip
    }

    /// Send one request and return the decoded reply.
    pub(crate) async fn request(&self, request: &Value) -> Result<Value> {
        debug!(device = %self.endpoint, ?request, "Kasa request");

        let plain = serde_json::to_vec(request)
            .map_err(|e| DeviceError::Device(format!("{}: {}", self.label, e)))?;

        let exchange = async {
            let mut stream = TcpStream::connect(&self.endpoint).await?;
            stream.write_all(&encrypt(&plain)).await?;

            let mut len = [0u8; 4];
            stream.read_exact(&mut len).await?;
            let len = u32::from_be_bytes(len) as usize;
            if len > MAX_REPLY_LEN {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("reply of {} bytes is too large", len),
                ));
            }

            let mut reply = vec![0u8; len];
            stream.read_exact(&mut reply).await?;
            Ok(reply)
        };

        let reply = match timeout(TRANSPORT_TIMEOUT, exchange).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => return Err(DeviceError::connection(&self.label, e)),
            Err(_) => return Err(DeviceError::connection(&self.label, "request timed out")),
        };

        let response: Value = serde_json::from_slice(&decrypt(&reply)).map_err(|e| {
            DeviceError::Device(format!("{} sent an unreadable reply: {}", self.label, e))
        })?;

        debug!(device = %self.endpoint, ?response, "Kasa response");
        Ok(response)
    }

    /// Call `module.method` and return its result object, checking `err_code`.
    pub(crate) async fn call(&self, module: &str, method: &str, params: Value) -> Result<Value> {
        let response = self.request(&json!({ module: { method: params } })).await?;
        let result = response
            .get(module)
            .and_then(|m| m.get(method))
            .cloned()
            .ok_or_else(|| {
                DeviceError::Device(format!(
                    "{} did not answer {}.{}",
                    self.label, module, method
                ))
            })?;
        check_err_code(&self.label, &result)?;
        Ok(result)
    }

    async fn sysinfo(&self) -> Result<SysInfo> {
        let info = self.call("system", "get_sysinfo", json!({})).await?;
        serde_json::from_value(info).map_err(|e| {
            DeviceError::Device(format!("{} sent unexpected sysinfo: {}", self.label, e))
        })
    }

    async fn set_relay_state(&self, on: bool) -> Result<()> {
        self.call("system", "set_relay_state", json!({ "state": u8::from(on) }))
            .await
            .map(|_| ())
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }
}

pub(crate) fn check_err_code(label: &str, result: &Value) -> Result<()> {
    match result.get("err_code").and_then(Value::as_i64) {
        Some(0) | None => Ok(()),
        Some(code) => {
            let msg = result
                .get("err_msg")
                .and_then(Value::as_str)
                .unwrap_or("command rejected");
            Err(DeviceError::Device(format!(
                "{} returned error {}: {}",
                label, code, msg
            )))
        }
    }
}

#[async_trait]
impl SmartDevice for TpLinkPlug {
    fn kind(&self) -> DeviceKind {
        DeviceKind::TpLink
    }

    fn device_type(&self) -> &'static str {
        "plug"
    }

    async fn turn_on(&self) -> Result<()> {
        self.set_relay_state(true).await
    }

    async fn turn_off(&self) -> Result<()> {
        self.set_relay_state(false).await
    }

    async fn is_on(&self) -> Result<bool> {
        Ok(self.sysinfo().await?.relay_state == 1)
    }

    async fn get_status(&self) -> Result<DeviceStatus> {
        let info = self.sysinfo().await?;
        let mut status = DeviceStatus::new(self, info.relay_state == 1)
            .detail("device_ip", self.device_ip.as_str())
            .detail("has_emeter", info.feature.contains("ENE"));
        status.name = Some(info.alias.unwrap_or_else(|| "Unknown".to_string()));
        status.model = Some(info.model.unwrap_or_else(|| "Unknown".to_string()));
        if let Some(mac) = info.mac {
            status = status.detail("mac", mac);
        }
        if let Some(on_time) = info.on_time {
            status = status.detail("on_time", on_time);
        }
        if let Some(rssi) = info.rssi {
            status = status.detail("rssi", rssi);
        }
        Ok(status)
    }
}
