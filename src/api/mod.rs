//! HTTP handlers and router

pub mod devices;
mod error;
pub mod pages;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::registry::DeviceRegistry;
use crate::ui::components::NavEntry;

pub use error::{status_code, ApiError, PageError};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<DeviceRegistry>,
    pub started: Instant,
}

impl AppState {
    pub fn new(registry: DeviceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            started: Instant::now(),
        }
    }

    /// Device switcher entries, in registration order.
    pub(crate) fn nav(&self) -> Vec<NavEntry> {
        self.registry.list().into_iter().map(NavEntry::from).collect()
    }
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub devices: usize,
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started.elapsed().as_secs(),
        devices: state.registry.len(),
    })
}

/// All routes with tracing, CORS and compression layers.
pub fn router(state: AppState) -> Router {
    Router::new()
        // HTML
        .route("/", get(pages::index))
        .route("/toggle", post(pages::toggle))
        .route("/schedules", get(pages::schedules))
        .route("/schedules/add", post(pages::add_schedule))
        .route("/schedules/delete", post(pages::delete_schedule))
        // JSON
        .route("/status", get(status_handler))
        .route("/api/devices", get(devices::list))
        .route("/api/devices/{name}", get(devices::status))
        .route("/api/devices/{name}/on", post(devices::turn_on))
        .route("/api/devices/{name}/off", post(devices::turn_off))
        .route("/api/devices/{name}/toggle", post(devices::toggle))
        .route("/api/devices/{name}/brightness", post(devices::set_brightness))
        .route("/api/devices/{name}/color", post(devices::set_color))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
