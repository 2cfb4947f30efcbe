//! Liveness evaluation

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::DeviceRecord;

/// Default liveness window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(30);

/// Whether a record has been heard from within `window` of `now`
///
/// A `last_seen` in the future (clock skew) counts as alive.
#[must_use]
pub fn alive(record: &DeviceRecord, now: DateTime<Utc>, window: Duration) -> bool {
    let Ok(window) = chrono::TimeDelta::from_std(window) else {
        return true;
    };
    now.signed_duration_since(record.last_seen) < window
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv6Addr};

    use chrono::TimeDelta;

    use super::*;
    use crate::devices::types::{DecodedReport, GasSensorReadings, Measurements};

    fn record_seen_at(seen: DateTime<Utc>) -> DeviceRecord {
        DeviceRecord::new(
            IpAddr::V6(Ipv6Addr::LOCALHOST),
            DecodedReport {
                identity_code: "abc123".to_string(),
                measurements: Measurements::GasSensor(GasSensorReadings {
                    temperature: 21,
                    humidity: 40,
                    pressure: 1013,
                    cal1: 5,
                    cal2: 7,
                    rssi: -60,
                    supply: 33,
                }),
            },
            seen,
        )
    }

    #[test]
    fn inside_window_is_alive() {
        let now = Utc::now();
        let record = record_seen_at(now - TimeDelta::seconds(29));
        assert!(alive(&record, now, DEFAULT_WINDOW));
    }

    #[test]
    fn outside_window_is_stale() {
        let now = Utc::now();
        let record = record_seen_at(now - TimeDelta::seconds(31));
        assert!(!alive(&record, now, DEFAULT_WINDOW));
    }

    #[test]
    fn exactly_at_window_is_stale() {
        let now = Utc::now();
        let record = record_seen_at(now - TimeDelta::seconds(30));
        assert!(!alive(&record, now, DEFAULT_WINDOW));
    }

    #[test]
    fn future_timestamp_is_alive() {
        let now = Utc::now();
        let record = record_seen_at(now + TimeDelta::seconds(5));
        assert!(alive(&record, now, DEFAULT_WINDOW));
    }
}
