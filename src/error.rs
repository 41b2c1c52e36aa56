//! Error taxonomy shared by adapters, the registry and the HTTP layer

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

/// Everything that can go wrong between a request and a physical device.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// Missing or invalid device definitions. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The device (or its bridge) could not be reached.
    #[error("{device} is unreachable: {message}")]
    Connection { device: String, message: String },

    /// The vendor answered but rejected the operation.
    #[error("{0}")]
    Device(String),

    /// The device type has no such capability.
    #[error("{brand} devices do not support {capability}")]
    NotSupported {
        brand: &'static str,
        capability: &'static str,
    },

    /// No device registered under this name.
    #[error("device '{0}' not found")]
    NotFound(String),

    /// Caller input rejected before any network call.
    #[error("{0}")]
    Validation(String),
}

impl DeviceError {
    pub fn connection(device: impl Into<String>, message: impl ToString) -> Self {
        Self::Connection {
            device: device.into(),
            message: message.to_string(),
        }
    }

    /// Short machine-readable name, used in JSON error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection { .. } => "connection",
            Self::Device(_) => "device",
            Self::NotSupported { .. } => "not_supported",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
        }
    }

    /// Replace every occurrence of the given secrets in the error text.
    ///
    /// Vendor errors sometimes echo request URLs or payloads back, and both
    /// can carry API keys.
    pub fn redact(self, secrets: &[&SecretString]) -> Self {
        let scrub = |text: String| redact(&text, secrets);
        match self {
            Self::Configuration(m) => Self::Configuration(scrub(m)),
            Self::Connection { device, message } => Self::Connection {
                device,
                message: scrub(message),
            },
            Self::Device(m) => Self::Device(scrub(m)),
            Self::Validation(m) => Self::Validation(scrub(m)),
            other => other,
        }
    }
}

/// Mask secrets inside free text.
pub fn redact(text: &str, secrets: &[&SecretString]) -> String {
    secrets
        .iter()
        .map(|s| s.expose_secret())
        .filter(|s| !s.is_empty())
        .fold(text.to_string(), |acc, secret| acc.replace(secret, "***"))
}

pub type Result<T, E = DeviceError> = std::result::Result<T, E>;
