//! Device snapshot endpoints for dashboards

use std::net::IpAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::ApiState;
use crate::admission::AdmissionState;
use crate::devices::{self, DeviceRecord, DeviceVariant, Measurements};

/// One device as shown to dashboards
#[derive(Debug, Serialize)]
pub struct DeviceResponse {
    pub address: IpAddr,
    pub variant: DeviceVariant,
    pub identity_code: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub resource_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admission: Option<AdmissionState>,
    pub last_seen: DateTime<Utc>,
    pub alive: bool,
    pub measurements: Measurements,
}

impl DeviceResponse {
    fn from_record(state: &ApiState, record: DeviceRecord, now: DateTime<Utc>) -> Self {
        let alive = devices::alive(&record, now, state.liveness_window);
        let admission = state.pipeline.state_of(&record.address);
        Self {
            address: record.address,
            variant: record.variant,
            identity_code: record.identity_code,
            resource_path: record.resource_path,
            admission,
            last_seen: record.last_seen,
            alive,
            measurements: record.measurements,
        }
    }
}

/// Build device routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/", get(list_devices))
        .route("/{address}", get(get_device))
        .with_state(state)
}

/// List every known device
async fn list_devices(State(state): State<Arc<ApiState>>) -> Json<Vec<DeviceResponse>> {
    let now = Utc::now();
    let mut devices: Vec<DeviceResponse> = state
        .handler
        .registry()
        .snapshot()
        .into_iter()
        .map(|record| DeviceResponse::from_record(&state, record, now))
        .collect();
    devices.sort_by_key(|d| d.address);
    Json(devices)
}

/// Get one device by address
async fn get_device(
    State(state): State<Arc<ApiState>>,
    Path(address): Path<String>,
) -> Result<Json<DeviceResponse>, StatusCode> {
    let address: IpAddr = address.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let record = state
        .handler
        .registry()
        .get(&address)
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(DeviceResponse::from_record(&state, record, Utc::now())))
}
