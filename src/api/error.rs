//! Mapping of device errors onto HTTP responses

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::ui::components::NavEntry;
use crate::ui::pages::error_page;

pub fn status_code(err: &DeviceError) -> StatusCode {
    match err {
        DeviceError::Configuration(_) | DeviceError::Device(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DeviceError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
        DeviceError::NotSupported { .. } | DeviceError::Validation(_) => StatusCode::BAD_REQUEST,
        DeviceError::NotFound(_) => StatusCode::NOT_FOUND,
    }
}

fn log(status: StatusCode, err: &DeviceError) {
    if status.is_server_error() {
        warn!(%status, "{}", err);
    } else {
        debug!(%status, "{}", err);
    }
}

/// JSON error body: `{"error": kind, "message": text}`.
#[derive(Debug)]
pub struct ApiError(pub DeviceError);

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_code(&self.0);
        log(status, &self.0);
        let body = json!({
            "error": self.0.kind(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

/// HTML error page, with the device switcher still available.
#[derive(Debug)]
pub struct PageError {
    pub error: DeviceError,
    pub devices: Vec<NavEntry>,
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = status_code(&self.error);
        log(status, &self.error);
        let title = match &self.error {
            DeviceError::NotFound(_) => "Device not found",
            DeviceError::Connection { .. } => "Device unreachable",
            DeviceError::NotSupported { .. } | DeviceError::Validation(_) => "Bad request",
            DeviceError::Configuration(_) | DeviceError::Device(_) => "Device error",
        };
        let html = error_page(self.devices, title, self.error.to_string());
        (status, Html(html)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (DeviceError::Configuration("x".into()), 500),
            (DeviceError::connection("plug", "refused"), 503),
            (DeviceError::Device("rejected".into()), 500),
            (
                DeviceError::NotSupported {
                    brand: "tplink",
                    capability: "color control",
                },
                400,
            ),
            (DeviceError::NotFound("garage".into()), 404),
            (DeviceError::Validation("bad".into()), 400),
        ];
        for (err, expected) in cases {
            assert_eq!(status_code(&err).as_u16(), expected, "{:?}", err);
        }
    }
}
