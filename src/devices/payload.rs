//! Report payload decoding
//!
//! Nodes send a flat, comma-separated UTF-8 record. Each measurement sits at a
//! fixed position:
//!
//! | index | field                   |
//! |-------|-------------------------|
//! | 0-3   | reserved                |
//! | 4     | hardware identity code  |
//! | 5     | reserved                |
//! | 6     | temperature             |
//! | 7     | humidity                |
//! | 8     | pressure                |
//! | 9     | calibration channel 1   |
//! | 10    | calibration channel 2   |
//! | 11    | signal strength (RSSI)  |
//! | 12    | supply level            |
//!
//! Trailing fields beyond index 12 are ignored.

use super::types::{DecodedReport, GasSensorReadings, Measurements};
use crate::{Error, Result};

pub const IDX_IDENTITY: usize = 4;
pub const IDX_TEMPERATURE: usize = 6;
pub const IDX_HUMIDITY: usize = 7;
pub const IDX_PRESSURE: usize = 8;
pub const IDX_CAL1: usize = 9;
pub const IDX_CAL2: usize = 10;
pub const IDX_RSSI: usize = 11;
pub const IDX_SUPPLY: usize = 12;

/// Number of fields a gas sensor report must carry
pub const GAS_SENSOR_FIELD_COUNT: usize = IDX_SUPPLY + 1;

/// Split a raw payload into its ordered fields
///
/// # Errors
///
/// Returns `MalformedPayload` if the payload is not UTF-8
pub fn split_fields(payload: &[u8]) -> Result<Vec<&str>> {
    let text = std::str::from_utf8(payload)
        .map_err(|e| Error::MalformedPayload(format!("payload is not UTF-8: {e}")))?;
    Ok(text.trim().split(',').map(str::trim).collect())
}

/// Decode and validate a raw payload into a report
///
/// # Errors
///
/// Returns `MalformedPayload` when the payload has too few fields or a
/// numeric field does not parse, and `InvalidReading` when either
/// calibration channel is zero
pub fn decode(payload: &[u8]) -> Result<DecodedReport> {
    let fields = split_fields(payload)?;
    let report = decode_fields(&fields)?;
    validate(&report)?;
    Ok(report)
}

/// Map positional fields onto a gas sensor report without validating values
///
/// # Errors
///
/// Returns `MalformedPayload` on short input or unparseable numbers
pub fn decode_fields(fields: &[&str]) -> Result<DecodedReport> {
    if fields.len() < GAS_SENSOR_FIELD_COUNT {
        return Err(Error::MalformedPayload(format!(
            "expected at least {GAS_SENSOR_FIELD_COUNT} fields, got {}",
            fields.len()
        )));
    }

    let identity_code = fields[IDX_IDENTITY].to_string();
    if identity_code.is_empty() {
        return Err(Error::MalformedPayload("empty identity code".to_string()));
    }

    let readings = GasSensorReadings {
        temperature: int_field(fields, IDX_TEMPERATURE, "temperature")?,
        humidity: int_field(fields, IDX_HUMIDITY, "humidity")?,
        pressure: int_field(fields, IDX_PRESSURE, "pressure")?,
        cal1: int_field(fields, IDX_CAL1, "cal1")?,
        cal2: int_field(fields, IDX_CAL2, "cal2")?,
        rssi: int_field(fields, IDX_RSSI, "rssi")?,
        supply: int_field(fields, IDX_SUPPLY, "supply")?,
    };

    Ok(DecodedReport {
        identity_code,
        measurements: Measurements::GasSensor(readings),
    })
}

/// Reject reports whose values the gateway will not record
///
/// # Errors
///
/// Returns `InvalidReading` if a calibration channel is zero
pub fn validate(report: &DecodedReport) -> Result<()> {
    match &report.measurements {
        Measurements::GasSensor(readings) => {
            if readings.cal1 == 0 {
                return Err(Error::InvalidReading("calibration channel 1 is zero".to_string()));
            }
            if readings.cal2 == 0 {
                return Err(Error::InvalidReading("calibration channel 2 is zero".to_string()));
            }
            Ok(())
        }
    }
}

fn int_field(fields: &[&str], idx: usize, name: &str) -> Result<i64> {
    fields[idx].parse().map_err(|e| {
        Error::MalformedPayload(format!("field {idx} ({name}) = {:?}: {e}", fields[idx]))
    })
}
