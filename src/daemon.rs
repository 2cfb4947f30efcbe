//! Daemon - the main gateway service
//!
//! Wires the registry, admission pipeline and HTTP surface together and runs
//! the background tasks (admission consumers, advertiser, exporter) until
//! interrupted.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::admission::{AdmissionPipeline, AdmissionQueues, PathAllocator};
use crate::api::{ApiServer, ApiServerBuilder, ResourceTable};
use crate::devices::{DeviceRegistry, UpdateHandler};
use crate::discovery::{Advertisement, MdnsAdvertiser};
use crate::telemetry::InfluxExporter;
use crate::{Config, Error, Result, shutdown};

/// The core components of a running gateway
///
/// Created once at startup; every task receives clones of these handles.
#[derive(Debug, Clone)]
pub struct Gateway {
    pub registry: DeviceRegistry,
    pub handler: UpdateHandler,
    pub resources: ResourceTable,
    pub pipeline: AdmissionPipeline,
}

impl Gateway {
    /// Assemble the components described by `config`
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let well_known = config.server.well_known_path.as_str();
        let registry = DeviceRegistry::new(AdmissionQueues::new());
        let handler = UpdateHandler::new(registry.clone());
        let resources = ResourceTable::new(well_known);
        let allocator = PathAllocator::new(config.admission.path_length, [well_known]);
        let pipeline =
            AdmissionPipeline::new(registry.clone(), allocator, Arc::new(resources.clone()));

        Self {
            registry,
            handler,
            resources,
            pipeline,
        }
    }

    /// Build the HTTP server over these components
    #[must_use]
    pub fn api_server(&self, config: &Config) -> ApiServer {
        ApiServerBuilder::new(
            self.handler.clone(),
            self.pipeline.clone(),
            self.resources.clone(),
            config.server.bind,
            config.server.port,
        )
        .liveness_window(config.liveness_window)
        .build()
    }
}

/// The mesh gateway daemon
pub struct Daemon {
    config: Config,
    gateway: Gateway,
}

impl Daemon {
    /// Create a new daemon instance
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let gateway = Gateway::new(&config);
        Ok(Self { config, gateway })
    }

    /// The gateway components driven by this daemon
    #[must_use]
    pub const fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Run the daemon until interrupted
    ///
    /// On Ctrl-C every background task is signalled, allowed to finish its
    /// current iteration, and awaited.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP server fails to bind or stops unexpectedly
    pub async fn run(self) -> Result<()> {
        let (shutdown_tx, shutdown_rx) = shutdown::channel();

        let mut server = self
            .gateway
            .api_server(&self.config)
            .spawn(shutdown_rx.clone());
        let tasks = self.spawn_background(&shutdown_rx);

        tracing::info!(
            port = self.config.server.port,
            poll_interval_secs = self.config.admission.poll_interval.as_secs(),
            tasks = tasks.len(),
            "daemon running"
        );

        let early_exit = tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
                }
                tracing::info!("shutdown requested");
                None
            }
            result = &mut server => Some(result),
        };

        let _ = shutdown_tx.send(true);

        for task in tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "background task ended abnormally");
            }
        }

        let server_result = match early_exit {
            Some(result) => result,
            None => server.await,
        };

        tracing::info!(devices = self.gateway.registry.len(), "daemon stopped");

        match server_result {
            Ok(result) => result,
            Err(e) => Err(Error::Config(format!("API server task failed: {e}"))),
        }
    }

    fn spawn_background(&self, shutdown_rx: &tokio::sync::watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let config = &self.config;
        let gateway = &self.gateway;
        let poll = config.admission.poll_interval;

        let mut tasks = vec![
            gateway
                .pipeline
                .spawn_incoming_consumer(poll, shutdown_rx.clone()),
            gateway
                .pipeline
                .spawn_pending_consumer(poll, shutdown_rx.clone()),
        ];

        if config.discovery.enabled {
            match MdnsAdvertiser::new() {
                Ok(advertiser) => {
                    let ad = Advertisement::from_config(
                        &config.discovery,
                        config.server.port,
                        &config.server.well_known_path,
                    );
                    tasks.push(advertiser.spawn(ad, config.discovery.interval, shutdown_rx.clone()));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "mDNS unavailable, gateway will not be advertised");
                }
            }
        } else {
            tracing::info!("service advertisement disabled");
        }

        match &config.telemetry {
            Some(telemetry) => match InfluxExporter::new(telemetry, config.liveness_window) {
                Ok(exporter) => tasks.push(exporter.spawn(
                    gateway.registry.clone(),
                    telemetry.interval,
                    shutdown_rx.clone(),
                )),
                Err(e) => tracing::warn!(error = %e, "telemetry export disabled"),
            },
            None => tracing::info!("no time-series store configured, export disabled"),
        }

        tasks
    }
}
