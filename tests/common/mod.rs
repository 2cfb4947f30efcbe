//! Shared test utilities

#![allow(dead_code)]

use std::net::{IpAddr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::connect_info::MockConnectInfo;
use mesh_gateway::api::{self, ApiState};
use mesh_gateway::{Config, Gateway};

/// Sample report from the end-to-end scenario
pub const VALID_REPORT: &str = "0,0,0,0,abc123,0,21,40,1013,5,7,-60,33";

/// Same report with calibration channel 1 zeroed
pub const ZERO_CAL1_REPORT: &str = "0,0,0,0,abc123,0,21,40,1013,0,7,-60,33";

/// A mesh-local node address
#[must_use]
pub fn node(last: u16) -> IpAddr {
    IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, last))
}

/// Build a gateway with default configuration
#[must_use]
pub fn setup_gateway() -> Gateway {
    Gateway::new(&Config::default())
}

/// Build the API router as seen from `peer`
pub fn router_from(gateway: &Gateway, peer: IpAddr) -> Router {
    let state = Arc::new(ApiState {
        handler: gateway.handler.clone(),
        pipeline: gateway.pipeline.clone(),
        resources: gateway.resources.clone(),
        liveness_window: Duration::from_secs(30),
    });
    api::router(state).layer(MockConnectInfo(SocketAddr::new(peer, 49152)))
}
