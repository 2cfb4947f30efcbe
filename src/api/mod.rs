//! HTTP surface of the gateway
//!
//! Serves node reports on the shared registration path and on every
//! attached resource path, plus read-only snapshot and health endpoints.

pub mod devices;
pub mod health;
pub mod resources;
pub mod updates;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::admission::AdmissionPipeline;
use crate::devices::UpdateHandler;
use crate::devices::liveness::DEFAULT_WINDOW;
use crate::Result;

pub use resources::ResourceTable;

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub handler: UpdateHandler,
    pub pipeline: AdmissionPipeline,
    pub resources: ResourceTable,
    pub liveness_window: Duration,
}

/// Configuration for building an API server
pub struct ApiServerBuilder {
    handler: UpdateHandler,
    pipeline: AdmissionPipeline,
    resources: ResourceTable,
    bind: IpAddr,
    port: u16,
    liveness_window: Duration,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub const fn new(
        handler: UpdateHandler,
        pipeline: AdmissionPipeline,
        resources: ResourceTable,
        bind: IpAddr,
        port: u16,
    ) -> Self {
        Self {
            handler,
            pipeline,
            resources,
            bind,
            port,
            liveness_window: DEFAULT_WINDOW,
        }
    }

    /// Set the liveness window reported by the snapshot endpoints
    #[must_use]
    pub const fn liveness_window(mut self, window: Duration) -> Self {
        self.liveness_window = window;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        let state = Arc::new(ApiState {
            handler: self.handler,
            pipeline: self.pipeline,
            resources: self.resources,
            liveness_window: self.liveness_window,
        });

        ApiServer {
            state,
            bind: self.bind,
            port: self.port,
        }
    }
}

/// API server
pub struct ApiServer {
    state: Arc<ApiState>,
    bind: IpAddr,
    port: u16,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Run the API server until `shutdown` flips to `true`
    ///
    /// In-flight requests are allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = SocketAddr::new(self.bind, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server on {addr}: {e}")))?;

        tracing::info!(
            %addr,
            well_known_path = self.state.resources.well_known_path(),
            "API server listening"
        );

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { crate::shutdown::signalled(&mut shutdown).await })
        .await
        .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> tokio::task::JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}

/// Build the full router over shared state
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .nest("/api/devices", devices::router(state.clone()))
        .merge(health::router())
        .merge(health::ready_router(state.clone()))
        .merge(updates::router(state))
        .layer(TraceLayer::new_for_http())
}
