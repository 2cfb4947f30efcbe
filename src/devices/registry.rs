//! Device registry: the single source of truth for known nodes
//!
//! Each mutation touches one record and finishes while the write lock is
//! held, so readers never see a half-applied update and `snapshot` is a
//! consistent point-in-time copy.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use super::types::{DecodedReport, DeviceRecord};
use crate::admission::AdmissionQueues;
use crate::{Error, Result};

/// Registry of devices keyed by network address
#[derive(Debug, Clone)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<IpAddr, DeviceRecord>>>,
    queues: AdmissionQueues,
}

impl DeviceRegistry {
    /// Create an empty registry that feeds new addresses into `queues`
    #[must_use]
    pub fn new(queues: AdmissionQueues) -> Self {
        Self {
            devices: Arc::new(RwLock::new(HashMap::new())),
            queues,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<IpAddr, DeviceRecord>> {
        self.devices.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<IpAddr, DeviceRecord>> {
        self.devices.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The admission queues this registry feeds
    #[must_use]
    pub const fn queues(&self) -> &AdmissionQueues {
        &self.queues
    }

    /// Record a validated report, stamped with the current time
    pub fn upsert(&self, address: IpAddr, report: DecodedReport) -> DeviceRecord {
        self.upsert_at(address, report, Utc::now())
    }

    /// Record a validated report seen at `seen_at`
    ///
    /// Creates the record on first sight and queues the address for
    /// admission. Later reports overwrite measurements and `last_seen` only;
    /// address, variant, identity and resource path stay as they were.
    pub fn upsert_at(
        &self,
        address: IpAddr,
        report: DecodedReport,
        seen_at: DateTime<Utc>,
    ) -> DeviceRecord {
        let mut devices = self.write();
        let (record, needs_admission) = match devices.get_mut(&address) {
            Some(existing) => {
                if existing.identity_code != report.identity_code {
                    tracing::debug!(
                        address = %address,
                        known = %existing.identity_code,
                        reported = %report.identity_code,
                        "identity code changed, keeping the original"
                    );
                }
                existing.measurements = report.measurements;
                existing.last_seen = seen_at;
                (existing.clone(), !existing.has_resource_path())
            }
            None => {
                let record = DeviceRecord::new(address, report, seen_at);
                devices.insert(address, record.clone());
                tracing::info!(address = %address, variant = %record.variant, "new device registered");
                (record, true)
            }
        };

        // Enqueue under the registry lock so a path assigned in between is
        // never followed by a stale incoming entry. Lock order: registry, queues.
        // A record without a path that fell out of the queues is picked up again here.
        if needs_admission && self.queues.enqueue_incoming(address) {
            tracing::debug!(address = %address, "queued for admission");
        }
        drop(devices);

        record
    }

    /// Get a copy of the record for an address
    #[must_use]
    pub fn get(&self, address: &IpAddr) -> Option<DeviceRecord> {
        self.read().get(address).cloned()
    }

    /// Whether the address has a record
    #[must_use]
    pub fn contains(&self, address: &IpAddr) -> bool {
        self.read().contains_key(address)
    }

    /// Point-in-time copy of every record
    #[must_use]
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.read().values().cloned().collect()
    }

    /// Assign the resource path of an address
    ///
    /// # Errors
    ///
    /// Returns `UnknownAddress` if there is no record and
    /// `PathAlreadyAssigned` if the record already has a path
    pub fn assign_resource_path(&self, address: &IpAddr, path: String) -> Result<DeviceRecord> {
        let mut devices = self.write();
        let record = devices
            .get_mut(address)
            .ok_or(Error::UnknownAddress(*address))?;
        if record.has_resource_path() {
            return Err(Error::PathAlreadyAssigned(*address));
        }
        record.resource_path = path;
        Ok(record.clone())
    }

    /// Flag the record as served by the dispatcher
    ///
    /// # Errors
    ///
    /// Returns `UnknownAddress` if there is no record
    pub fn mark_attached(&self, address: &IpAddr) -> Result<()> {
        let mut devices = self.write();
        let record = devices
            .get_mut(address)
            .ok_or(Error::UnknownAddress(*address))?;
        record.attached = true;
        Ok(())
    }

    /// Number of known devices
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no device has reported yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
