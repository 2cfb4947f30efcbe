//! Device record types

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of device behind an address, fixed when the record is created
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceVariant {
    GasSensor,
}

impl DeviceVariant {
    /// Stable name used in logs and exported telemetry
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GasSensor => "gas_sensor",
        }
    }
}

impl std::fmt::Display for DeviceVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Readings reported by a gas sensor node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasSensorReadings {
    pub temperature: i64,
    pub humidity: i64,
    pub pressure: i64,
    /// First calibration channel, never zero once accepted
    pub cal1: i64,
    /// Second calibration channel, never zero once accepted
    pub cal2: i64,
    /// Received signal strength
    pub rssi: i64,
    /// Supply voltage level
    pub supply: i64,
}

/// Variant-specific measurement payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum Measurements {
    GasSensor(GasSensorReadings),
}

impl Measurements {
    /// The device variant these measurements belong to
    #[must_use]
    pub const fn variant(&self) -> DeviceVariant {
        match self {
            Self::GasSensor(_) => DeviceVariant::GasSensor,
        }
    }
}

/// A report that passed decoding and validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedReport {
    /// Hardware identity code reported by the device (opaque)
    pub identity_code: String,
    pub measurements: Measurements,
}

/// Everything the gateway knows about one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub address: IpAddr,
    pub variant: DeviceVariant,
    pub identity_code: String,
    /// Empty until admission allocates a path; never changes afterwards
    pub resource_path: String,
    /// Set once the dispatcher serves `resource_path`
    pub attached: bool,
    pub last_seen: DateTime<Utc>,
    pub measurements: Measurements,
}

impl DeviceRecord {
    /// Create a record from the first accepted report of an address
    #[must_use]
    pub fn new(address: IpAddr, report: DecodedReport, seen_at: DateTime<Utc>) -> Self {
        Self {
            address,
            variant: report.measurements.variant(),
            identity_code: report.identity_code,
            resource_path: String::new(),
            attached: false,
            last_seen: seen_at,
            measurements: report.measurements,
        }
    }

    /// Whether admission has allocated a resource path
    #[must_use]
    pub fn has_resource_path(&self) -> bool {
        !self.resource_path.is_empty()
    }

    /// Gas sensor readings, if this is a gas sensor
    #[must_use]
    pub const fn gas_readings(&self) -> Option<&GasSensorReadings> {
        match &self.measurements {
            Measurements::GasSensor(readings) => Some(readings),
        }
    }
}
