//! Admission consumers
//!
//! ```text
//! UNSEEN ──first valid report──▶ INCOMING ──path allocated──▶ PENDING ──attached──▶ ATTACHED
//! ```
//!
//! Both queues are drained on a fixed poll interval rather than on every
//! enqueue, so a node becomes addressable within one interval of its first
//! report.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::path::PathAllocator;
use super::{AdmissionState, Dispatcher};
use crate::devices::DeviceRegistry;
use crate::{Error, Result};

/// Moves addresses from first sight to an attached resource path
#[derive(Clone)]
pub struct AdmissionPipeline {
    registry: DeviceRegistry,
    allocator: PathAllocator,
    dispatcher: Arc<dyn Dispatcher>,
}

impl std::fmt::Debug for AdmissionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionPipeline")
            .field("registry", &self.registry)
            .field("allocator", &self.allocator)
            .finish_non_exhaustive()
    }
}

/// Outcome counts of one drain pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    pub processed: usize,
    pub failed: usize,
}

impl AdmissionPipeline {
    #[must_use]
    pub fn new(
        registry: DeviceRegistry,
        allocator: PathAllocator,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Self {
        Self {
            registry,
            allocator,
            dispatcher,
        }
    }

    /// Current admission state of an address, `None` if it was never seen
    #[must_use]
    pub fn state_of(&self, address: &IpAddr) -> Option<AdmissionState> {
        let record = self.registry.get(address)?;
        let queues = self.registry.queues();
        Some(if record.attached {
            AdmissionState::Attached
        } else if queues.is_pending(address) {
            AdmissionState::Pending
        } else if queues.is_incoming(address) {
            AdmissionState::Incoming
        } else {
            AdmissionState::Unadmitted
        })
    }

    /// Allocate paths for every incoming address and move them to pending
    pub fn drain_incoming(&self) -> DrainStats {
        let mut stats = DrainStats::default();
        while let Some(address) = self.registry.queues().pop_incoming() {
            match self.allocate(address) {
                Ok(path) => {
                    stats.processed += 1;
                    tracing::info!(address = %address, path = %path, "resource path allocated");
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(address = %address, error = %e, "admission skipped");
                }
            }
        }
        stats
    }

    fn allocate(&self, address: IpAddr) -> Result<String> {
        let record = self
            .registry
            .get(&address)
            .ok_or(Error::UnknownAddress(address))?;

        if record.has_resource_path() {
            // Already allocated; make sure it still reaches the dispatcher
            if !record.attached {
                self.registry.queues().enqueue_pending(address);
            }
            return Ok(record.resource_path);
        }

        let path = self.allocator.allocate();
        self.registry.assign_resource_path(&address, path.clone())?;
        self.registry.queues().enqueue_pending(address);
        Ok(path)
    }

    /// Attach every pending address; failures go back to pending
    pub fn drain_pending(&self) -> DrainStats {
        let mut stats = DrainStats::default();
        for address in self.registry.queues().drain_pending() {
            match self.attach(address) {
                Ok(path) => {
                    stats.processed += 1;
                    tracing::info!(address = %address, path = %path, "device attached");
                }
                Err(Error::UnknownAddress(_)) => {
                    stats.failed += 1;
                    tracing::warn!(address = %address, "pending address has no record, dropping");
                }
                Err(e) => {
                    stats.failed += 1;
                    self.registry.queues().enqueue_pending(address);
                    tracing::warn!(address = %address, error = %e, "attachment failed, will retry");
                }
            }
        }
        stats
    }

    fn attach(&self, address: IpAddr) -> Result<String> {
        let record = self
            .registry
            .get(&address)
            .ok_or(Error::UnknownAddress(address))?;
        if !record.has_resource_path() {
            return Err(Error::AttachmentFailure {
                path: String::new(),
                reason: "no resource path allocated".to_string(),
            });
        }

        self.dispatcher.attach(&record.resource_path, address)?;
        self.registry.mark_attached(&address)?;
        Ok(record.resource_path)
    }

    /// One full admission cycle: incoming, then pending
    pub fn run_cycle(&self) -> (DrainStats, DrainStats) {
        let incoming = self.drain_incoming();
        let pending = self.drain_pending();
        (incoming, pending)
    }

    /// Spawn the incoming consumer
    #[must_use]
    pub fn spawn_incoming_consumer(
        &self,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            poll_loop("incoming", interval, shutdown, || {
                pipeline.drain_incoming();
            })
            .await;
        })
    }

    /// Spawn the pending consumer
    #[must_use]
    pub fn spawn_pending_consumer(
        &self,
        interval: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let pipeline = self.clone();
        tokio::spawn(async move {
            poll_loop("pending", interval, shutdown, || {
                pipeline.drain_pending();
            })
            .await;
        })
    }
}

/// Run `step` every `interval` until shutdown is signalled
///
/// A step always runs to completion; shutdown is only observed between steps.
pub(crate) async fn poll_loop<F>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut step: F,
) where
    F: FnMut(),
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the first immediate tick
    ticker.tick().await;

    tracing::debug!(consumer = name, interval_ms = interval.as_millis(), "admission consumer started");

    loop {
        tokio::select! {
            () = crate::shutdown::signalled(&mut shutdown) => break,
            _ = ticker.tick() => step(),
        }
    }

    tracing::debug!(consumer = name, "admission consumer stopped");
}
