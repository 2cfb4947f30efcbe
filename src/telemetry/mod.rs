//! Periodic telemetry export to a time-series store
//!
//! Every interval the exporter takes a registry snapshot and writes one
//! point per gas sensor over the InfluxDB v2 HTTP write API. Export is
//! best-effort: failures are logged and the loop carries on.

pub mod line_protocol;

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::TelemetryConfig;
use crate::devices::{self, DeviceRecord, DeviceRegistry};
use crate::{Error, Result};

pub use line_protocol::Point;

/// Request timeout for a single write
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes registry snapshots to InfluxDB
#[derive(Debug, Clone)]
pub struct InfluxExporter {
    client: reqwest::Client,
    write_url: String,
    org: String,
    bucket: String,
    token: Option<String>,
    measurement: String,
    liveness_window: Duration,
}

impl InfluxExporter {
    /// Create an exporter from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(config: &TelemetryConfig, liveness_window: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WRITE_TIMEOUT)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url.trim_end_matches('/')),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
            token: config.token.clone(),
            measurement: config.measurement.clone(),
            liveness_window,
        })
    }

    /// Build one point per gas sensor record, stamped `now`
    #[must_use]
    pub fn points(&self, records: &[DeviceRecord], now: DateTime<Utc>) -> Vec<Point> {
        records
            .iter()
            .filter_map(|record| {
                let readings = record.gas_readings()?;
                let alive = devices::alive(record, now, self.liveness_window);
                Some(
                    Point::new(self.measurement.as_str())
                        .tag("address", record.address.to_string())
                        .tag("identity", record.identity_code.as_str())
                        .int_field("temperature", readings.temperature)
                        .int_field("humidity", readings.humidity)
                        .int_field("pressure", readings.pressure)
                        .int_field("cal1", readings.cal1)
                        .int_field("cal2", readings.cal2)
                        .int_field("rssi", readings.rssi)
                        .int_field("supply", readings.supply)
                        .bool_field("alive", alive)
                        .timestamp(now),
                )
            })
            .collect()
    }

    /// Export the current registry snapshot
    ///
    /// Returns the number of points written.
    ///
    /// # Errors
    ///
    /// Returns `Export` if the store cannot be reached or refuses the write
    pub async fn export(&self, registry: &DeviceRegistry) -> Result<usize> {
        let points = self.points(&registry.snapshot(), Utc::now());
        if points.is_empty() {
            tracing::debug!("no devices to export");
            return Ok(0);
        }

        let body = line_protocol::encode(&points);
        let mut request = self
            .client
            .post(&self.write_url)
            .query(&[
                ("org", self.org.as_str()),
                ("bucket", self.bucket.as_str()),
                ("precision", "ms"),
            ])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body);
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Token {token}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Export(format!("could not reach time-series store: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::Export(format!("write rejected ({status}): {detail}")));
        }

        tracing::info!(points = points.len(), "exported telemetry");
        Ok(points.len())
    }

    /// Spawn the periodic export loop
    #[must_use]
    pub fn spawn(
        self,
        registry: DeviceRegistry,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the first immediate tick
            ticker.tick().await;

            tracing::info!(
                url = %self.write_url,
                interval_secs = interval.as_secs(),
                "telemetry export started"
            );

            loop {
                tokio::select! {
                    () = crate::shutdown::signalled(&mut shutdown) => break,
                    _ = ticker.tick() => {
                        if let Err(e) = self.export(&registry).await {
                            tracing::warn!(error = %e, "telemetry export failed");
                        }
                    }
                }
            }

            tracing::info!("telemetry export stopped");
        })
    }
}
