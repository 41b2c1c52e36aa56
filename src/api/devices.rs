//! JSON device API
//!
//! Reaches every capability, including brightness and color, which the
//! HTML pages do not expose.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{ApiError, AppState};
use crate::adapters::DeviceStatus;
use crate::error::DeviceError;
use crate::registry::DeviceSummary;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Outcome of a command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl CommandResponse {
    fn new(name: String) -> Self {
        Self {
            name,
            is_on: None,
            brightness: None,
            color: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BrightnessRequest {
    pub level: i64,
}

#[derive(Debug, Deserialize)]
pub struct ColorRequest {
    pub color: String,
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, DeviceError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| DeviceError::Validation(rejection.body_text()))
}

/// GET /api/devices
pub async fn list(State(state): State<AppState>) -> Json<Vec<DeviceSummary>> {
    Json(state.registry.list())
}

/// GET /api/devices/{name}
pub async fn status(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<DeviceStatus> {
    Ok(Json(state.registry.get(&name)?.get_status().await?))
}

/// POST /api/devices/{name}/on
pub async fn turn_on(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CommandResponse> {
    state.registry.get(&name)?.turn_on().await?;
    info!(device = %name, "Turned on");
    Ok(Json(CommandResponse {
        is_on: Some(true),
        ..CommandResponse::new(name)
    }))
}

/// POST /api/devices/{name}/off
pub async fn turn_off(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CommandResponse> {
    state.registry.get(&name)?.turn_off().await?;
    info!(device = %name, "Turned off");
    Ok(Json(CommandResponse {
        is_on: Some(false),
        ..CommandResponse::new(name)
    }))
}

/// POST /api/devices/{name}/toggle
pub async fn toggle(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<CommandResponse> {
    let is_on = state.registry.get(&name)?.toggle().await?;
    info!(device = %name, is_on, "Toggled");
    Ok(Json(CommandResponse {
        is_on: Some(is_on),
        ..CommandResponse::new(name)
    }))
}

/// POST /api/devices/{name}/brightness `{"level": 0-100}`
pub async fn set_brightness(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<BrightnessRequest>, JsonRejection>,
) -> ApiResult<CommandResponse> {
    let device = state.registry.get(&name)?;
    let request = body(payload)?;
    device.set_brightness(request.level).await?;
    info!(device = %name, level = request.level, "Set brightness");
    Ok(Json(CommandResponse {
        brightness: Some(request.level),
        ..CommandResponse::new(name)
    }))
}

/// POST /api/devices/{name}/color `{"color": "#RRGGBB" | name}`
pub async fn set_color(
    State(state): State<AppState>,
    Path(name): Path<String>,
    payload: Result<Json<ColorRequest>, JsonRejection>,
) -> ApiResult<CommandResponse> {
    let device = state.registry.get(&name)?;
    let request = body(payload)?;
    device.set_color(&request.color).await?;
    info!(device = %name, color = %request.color, "Set color");
    Ok(Json(CommandResponse {
        color: Some(request.color),
        ..CommandResponse::new(name)
    }))
}
