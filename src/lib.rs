//! Unified Home Control
//!
//! One web control surface for smart plugs and lights from several vendors.
//!
//! This library provides:
//! - TP-Link Kasa plug control, including on-device schedules
//! - Philips Hue light and group control through the bridge
//! - Nanoleaf panel control
//! - Geeni and Cree bulbs over the Tuya local protocol
//! - Server-rendered status pages and a JSON API (axum + Dioxus SSR)

// =============================================================================
// Lints
// =============================================================================

#![deny(unsafe_code)]
#![deny(unused_must_use)]

pub mod adapters;
pub mod api;
pub mod color;
pub mod config;
pub mod error;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod ui;

pub use adapters::{Device, DeviceKind, DeviceStatus, LightControl, SmartDevice};
pub use error::{DeviceError, Result};
pub use registry::DeviceRegistry;
