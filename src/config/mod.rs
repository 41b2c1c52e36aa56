//! Configuration management
//!
//! Server settings come from the `config` crate (optional `config.*` file in
//! the working directory, overridden by `UHOME_*` environment variables).
//! Device definitions live in their own JSON file, see [`devices`].

pub mod devices;

use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

pub use devices::{
    load_registry, resolve_devices, DeviceConfig, HueConfig, NanoleafConfig, TpLinkConfig,
    TuyaConfig, DEFAULT_DEVICE, LEGACY_DEVICE_ENV,
};

#[derive(Debug, Deserialize)]
pub struct Settings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// JSON file mapping device names to device records
    #[serde(default = "default_devices_file")]
    pub devices_file: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_devices_file() -> PathBuf {
    PathBuf::from(".devices.json")
}

pub fn load_settings() -> Result<Settings> {
    let config = ::config::Config::builder()
        .set_default("port", 8000)?
        .add_source(::config::File::with_name("config").required(false))
        // UHOME_PORT, UHOME_HOST, UHOME_DEVICES_FILE
        .add_source(::config::Environment::with_prefix("UHOME").try_parsing(true))
        .build()?;

    Ok(config.try_deserialize()?)
}
