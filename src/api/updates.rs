//! Report endpoints
//!
//! Nodes `PUT` their reports either to the shared registration path or, once
//! admitted, to their own resource path. Status codes follow the CoAP to
//! HTTP mapping: `2.04 Changed` is `204 No Content`, `4.00 Bad Request` is
//! `400`.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::{ConnectInfo, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::put,
};

use super::ApiState;
use crate::Error;

/// Build report routes
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/{resource}", put(put_report))
        .with_state(state)
}

/// Accept a report on the shared path or an attached per-device path
async fn put_report(
    State(state): State<Arc<ApiState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Path(resource): Path<String>,
    body: Bytes,
) -> Response {
    let sender = peer.ip().to_canonical();

    let Some(address) = owning_address(&state, &resource, sender) else {
        tracing::debug!(sender = %sender, path = %resource, "report for unknown resource");
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.handler.handle(address, &body) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(&e),
    }
}

/// Resolve which device a report belongs to
///
/// The shared path takes the sender address from the connection. A
/// per-device path is keyed to the node it was attached for.
fn owning_address(state: &ApiState, resource: &str, sender: IpAddr) -> Option<IpAddr> {
    if resource == state.resources.well_known_path() {
        return Some(sender);
    }

    let owner = state.resources.resolve(resource)?;
    if owner != sender {
        tracing::debug!(
            sender = %sender,
            owner = %owner,
            path = %resource,
            "report sender differs from path owner"
        );
    }
    Some(owner)
}

fn error_response(e: &Error) -> Response {
    let status = match e {
        Error::MalformedPayload(_) | Error::InvalidReading(_) => StatusCode::BAD_REQUEST,
        Error::UnknownAddress(_) => StatusCode::NOT_FOUND,
        _ => {
            tracing::error!(error = %e, "report handling failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string()).into_response()
}
