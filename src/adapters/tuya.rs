//! Tuya local protocol (versions 3.1 and 3.3)
//!
//! Frame layout, all integers big-endian:
//!
//! ```text
//! 0x000055AA | seq | cmd | len | payload | crc32 | 0x0000AA55
//! ```
//!
//! `len` counts the payload plus the trailing CRC and suffix. Device replies
//! put a 4-byte return code in front of their payload.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::Aes128;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use crc::{Crc, CRC_32_ISO_HDLC};
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::endpoint;
use crate::error::{DeviceError, Result};

pub const TUYA_PORT: u16 = 6668;
const PREFIX: u32 = 0x0000_55AA;
const SUFFIX: u32 = 0x0000_AA55;
const HEADER_LEN: usize = 16;
/// CRC plus suffix
const TRAILER_LEN: usize = 8;
const MAX_FRAME_LEN: usize = 64 * 1024;
/// Unrelated frames (heartbeats, status pushes) tolerated before the answer
const MAX_FRAMES: usize = 3;
const TRANSPORT_TIMEOUT: Duration = Duration::from_secs(5);
/// `"3.3"` plus twelve reserved bytes
const V33_HEADER_LEN: usize = 15;
/// `"3.1"` plus a 16-character MD5 excerpt
const V31_HEADER_LEN: usize = 19;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Command codes used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    Control = 7,
    Status = 8,
    DpQuery = 10,
}

/// Supported local protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Version {
    V31,
    V33,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::V31 => "3.1",
            Version::V33 => "3.3",
        }
    }
}

impl FromStr for Version {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "3.1" => Ok(Version::V31),
            "3.3" => Ok(Version::V33),
            other => Err(DeviceError::Configuration(format!(
                "unsupported Tuya protocol version '{}' (expected 3.1 or 3.3)",
                other
            ))),
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub seq: u32,
    pub cmd: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    /// Return code and body of a device reply. Replies without a return
    /// code are passed through whole.
    pub fn reply(&self) -> (Option<u32>, &[u8]) {
        match self.payload.as_slice() {
            [0, 0, 0, code, rest @ ..] => (Some(u32::from(*code)), rest),
            body => (None, body),
        }
    }
}

pub fn encode_frame(seq: u32, cmd: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + TRAILER_LEN);
    out.extend_from_slice(&PREFIX.to_be_bytes());
    out.extend_from_slice(&seq.to_be_bytes());
    out.extend_from_slice(&cmd.to_be_bytes());
    out.extend_from_slice(&((payload.len() + TRAILER_LEN) as u32).to_be_bytes());
    out.extend_from_slice(payload);
    let crc = CRC32.checksum(&out);
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&SUFFIX.to_be_bytes());
    out
}

fn be_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_be_bytes(word)
}

/// Parse one complete frame, checking prefix, suffix and CRC.
pub fn decode_frame(bytes: &[u8]) -> std::result::Result<Frame, String> {
    if bytes.len() < HEADER_LEN + TRAILER_LEN {
        return Err(format!("frame of {} bytes is truncated", bytes.len()));
    }
    if be_u32(bytes, 0) != PREFIX {
        return Err("bad frame prefix".to_string());
    }
    let len = be_u32(bytes, 12) as usize;
    if len < TRAILER_LEN || HEADER_LEN + len != bytes.len() {
        return Err(format!("frame length {} does not match {} bytes", len, bytes.len()));
    }
    let crc_at = bytes.len() - TRAILER_LEN;
    if be_u32(bytes, crc_at + 4) != SUFFIX {
        return Err("bad frame suffix".to_string());
    }
    if be_u32(bytes, crc_at) != CRC32.checksum(&bytes[..crc_at]) {
        return Err("frame checksum mismatch".to_string());
    }
    Ok(Frame {
        seq: be_u32(bytes, 4),
        cmd: be_u32(bytes, 8),
        payload: bytes[HEADER_LEN..crc_at].to_vec(),
    })
}

/// Read the raw bytes of one frame.
pub(crate) async fn read_raw_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut frame = vec![0u8; HEADER_LEN];
    reader.read_exact(&mut frame).await?;
    if be_u32(&frame, 0) != PREFIX {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "stream is not Tuya framed",
        ));
    }
    let len = be_u32(&frame, 12) as usize;
    if len > MAX_FRAME_LEN {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame of {} bytes is too large", len),
        ));
    }
    frame.resize(HEADER_LEN + len, 0);
    reader.read_exact(&mut frame[HEADER_LEN..]).await?;
    Ok(frame)
}

/// AES-128-ECB with PKCS#7 padding.
pub(crate) fn encrypt(cipher: &Aes128, plain: &[u8]) -> Vec<u8> {
    let pad = 16 - plain.len() % 16;
    let mut data = plain.to_vec();
    data.resize(plain.len() + pad, pad as u8);
    for block in data.chunks_exact_mut(16) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    data
}

pub(crate) fn decrypt(cipher: &Aes128, data: &[u8]) -> std::result::Result<Vec<u8>, &'static str> {
    if data.is_empty() || data.len() % 16 != 0 {
        return Err("ciphertext is not block aligned");
    }
    let mut plain = data.to_vec();
    for block in plain.chunks_exact_mut(16) {
        cipher.decrypt_block(GenericArray::from_mut_slice(block));
    }
    let pad = usize::from(plain[plain.len() - 1]);
    if pad == 0 || pad > 16 || plain[plain.len() - pad..].iter().any(|b| usize::from(*b) != pad) {
        return Err("bad padding (wrong local key?)");
    }
    plain.truncate(plain.len() - pad);
    Ok(plain)
}

/// Whether a frame with code `received` answers `sent`. Some firmware
/// acknowledges CONTROL with a STATUS push.
fn answers(sent: Command, received: u32) -> bool {
    received == sent as u32 || (sent == Command::Control && received == Command::Status as u32)
}

/// Connection parameters and crypto state for one Tuya device.
pub struct TuyaClient {
    device_id: String,
    endpoint: String,
    local_key: SecretString,
    cipher: Aes128,
    version: Version,
    seq: AtomicU32,
    label: String,
}

impl TuyaClient {
    pub fn new(
        device_id: &str,
        device_ip: &str,
        local_key: &SecretString,
        version: Version,
        label: String,
    ) -> Result<Self> {
        let device_id = device_id.trim();
        let device_ip = device_ip.trim();
        if device_id.is_empty() {
            return Err(DeviceError::Configuration(
                "device_id is required and cannot be empty".to_string(),
            ));
        }
        if device_ip.is_empty() {
            return Err(DeviceError::Configuration(
                "device_ip is required and cannot be empty".to_string(),
            ));
        }
        let key = local_key.expose_secret().trim();
        let cipher = Aes128::new_from_slice(key.as_bytes()).map_err(|_| {
            DeviceError::Configuration("local_key must be exactly 16 characters".to_string())
        })?;
        Ok(Self {
            device_id: device_id.to_string(),
            endpoint: endpoint(device_ip, TUYA_PORT),
            local_key: SecretString::from(key.to_string()),
            cipher,
            version,
            seq: AtomicU32::new(1),
            label,
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn version(&self) -> Version {
        self.version
    }

    /// Protocol payload for a JSON command body.
    pub(crate) fn seal(&self, cmd: Command, body: &[u8]) -> Vec<u8> {
        match (self.version, cmd) {
            (Version::V33, Command::Control) => {
                let mut out = Vec::with_capacity(V33_HEADER_LEN + body.len() + 16);
                out.extend_from_slice(b"3.3");
                out.extend_from_slice(&[0u8; 12]);
                out.extend_from_slice(&encrypt(&self.cipher, body));
                out
            }
            (Version::V33, _) => encrypt(&self.cipher, body),
            (Version::V31, Command::Control) => {
                let data = STANDARD.encode(encrypt(&self.cipher, body));
                let digest = format!(
                    "{:x}",
                    md5::compute(format!(
                        "data={}||lpv=3.1||{}",
                        data,
                        self.local_key.expose_secret()
                    ))
                );
                [b"3.1".as_slice(), &digest.as_bytes()[8..24], data.as_bytes()].concat()
            }
            (Version::V31, _) => body.to_vec(),
        }
    }

    /// Decode a reply or request payload. 3.3 payloads are ciphertext with
    /// or without the version header; 3.1 payloads are plain JSON unless
    /// they carry the signed base64 form.
    pub(crate) fn open(&self, payload: &[u8]) -> Result<Option<Value>> {
        let unreadable = |reason: &str| {
            DeviceError::Device(format!("{} sent an unreadable reply: {}", self.label, reason))
        };
        if payload.is_empty() {
            return Ok(None);
        }

        let plain = match self.version {
            Version::V33 => {
                let data = if payload.starts_with(b"3.3") && payload.len() >= V33_HEADER_LEN {
                    &payload[V33_HEADER_LEN..]
                } else {
                    payload
                };
                match decrypt(&self.cipher, data) {
                    Ok(plain) => plain,
                    // Some firmware answers errors in clear text
                    Err(_) if payload.first() == Some(&b'{') => payload.to_vec(),
                    Err(e) => return Err(unreadable(e)),
                }
            }
            Version::V31 if payload.starts_with(b"3.1") && payload.len() >= V31_HEADER_LEN => {
                let data = STANDARD
                    .decode(&payload[V31_HEADER_LEN..])
                    .map_err(|e| unreadable(&e.to_string()))?;
                decrypt(&self.cipher, &data).map_err(unreadable)?
            }
            Version::V31 => payload.to_vec(),
        };

        serde_json::from_slice(&plain)
            .map(Some)
            .map_err(|_| unreadable(&String::from_utf8_lossy(&plain)))
    }

    /// Send one command and return the decoded body of the matching reply.
    async fn exchange(&self, cmd: Command, body: Value) -> Result<Option<Value>> {
        debug!(device = %self.endpoint, ?cmd, %body, "Tuya request");

        let plain = serde_json::to_vec(&body)
            .map_err(|e| DeviceError::Device(format!("{}: {}", self.label, e)))?;
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let request = encode_frame(seq, cmd as u32, &self.seal(cmd, &plain));

        let transfer = async {
            let mut stream = TcpStream::connect(&self.endpoint).await?;
            stream.write_all(&request).await?;
            for _ in 0..MAX_FRAMES {
                let raw = read_raw_frame(&mut stream).await?;
                if answers(cmd, be_u32(&raw, 8)) {
                    return Ok(Some(raw));
                }
            }
            Ok::<_, std::io::Error>(None)
        };

        let raw = match timeout(TRANSPORT_TIMEOUT, transfer).await {
            Ok(Ok(Some(raw))) => raw,
            Ok(Ok(None)) => {
                return Err(DeviceError::Device(format!(
                    "{} never answered command {}",
                    self.label, cmd as u32
                )))
            }
            Ok(Err(e)) => return Err(DeviceError::connection(&self.label, e)),
            Err(_) => return Err(DeviceError::connection(&self.label, "request timed out")),
        };

        let frame = decode_frame(&raw)
            .map_err(|e| DeviceError::Device(format!("{}: {}", self.label, e)))?;
        let (code, reply) = frame.reply();
        if let Some(code) = code.filter(|c| *c != 0) {
            return Err(DeviceError::Device(format!(
                "{} returned error code {}",
                self.label, code
            )));
        }

        let response = self.open(reply)?;
        debug!(device = %self.endpoint, ?response, "Tuya response");
        Ok(response)
    }

    fn timestamp() -> String {
        chrono::Utc::now().timestamp().to_string()
    }

    /// Current data points, keyed by DP index.
    pub async fn query(&self) -> Result<Map<String, Value>> {
        let body = json!({
            "gwId": self.device_id,
            "devId": self.device_id,
            "uid": self.device_id,
            "t": Self::timestamp(),
        });
        let response = self.exchange(Command::DpQuery, body).await?;
        match response.as_ref().and_then(|r| r.get("dps")) {
            Some(Value::Object(dps)) => Ok(dps.clone()),
            _ => Err(DeviceError::Device(format!(
                "{} did not report its data points",
                self.label
            ))),
        }
    }

    /// Write data points.
    pub async fn control(&self, dps: Map<String, Value>) -> Result<()> {
        let body = json!({
            "devId": self.device_id,
            "uid": self.device_id,
            "t": Self::timestamp(),
            "dps": dps,
        });
        self.exchange(Command::Control, body).await.map(|_| ())
    }
}
