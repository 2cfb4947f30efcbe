//! Inbound report handling
//!
//! Decodes, validates and applies one report. Admission is a side effect of
//! [`DeviceRegistry::upsert`], so nothing here knows about queues.

use std::net::IpAddr;

use super::payload;
use super::registry::DeviceRegistry;
use super::types::DeviceRecord;
use crate::Result;

/// Applies measurement reports to the registry
#[derive(Debug, Clone)]
pub struct UpdateHandler {
    registry: DeviceRegistry,
}

impl UpdateHandler {
    #[must_use]
    pub const fn new(registry: DeviceRegistry) -> Self {
        Self { registry }
    }

    #[must_use]
    pub const fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Handle a report from `address`
    ///
    /// The registry is only touched when the payload decodes and validates.
    ///
    /// # Errors
    ///
    /// Returns `MalformedPayload` or `InvalidReading`; in both cases the
    /// registry is unchanged
    pub fn handle(&self, address: IpAddr, body: &[u8]) -> Result<DeviceRecord> {
        let report = payload::decode(body).inspect_err(|e| {
            tracing::warn!(address = %address, error = %e, "rejected report");
        })?;

        let record = self.registry.upsert(address, report);
        tracing::debug!(address = %address, path = %record.resource_path, "report applied");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv6Addr;

    use super::*;
    use crate::Error;
    use crate::admission::AdmissionQueues;

    const VALID: &[u8] = b"0,0,0,0,abc123,0,21,40,1013,5,7,-60,33";
    const ZERO_CAL: &[u8] = b"0,0,0,0,abc123,0,21,40,1013,0,7,-60,33";

    fn handler() -> UpdateHandler {
        UpdateHandler::new(DeviceRegistry::new(AdmissionQueues::new()))
    }

    fn a1() -> IpAddr {
        IpAddr::V6(Ipv6Addr::new(0xfd00, 0, 0, 0, 0, 0, 0, 0xa1))
    }

    #[test]
    fn valid_report_creates_record() {
        let handler = handler();
        let record = handler.handle(a1(), VALID).unwrap();
        assert_eq!(record.identity_code, "abc123");
        assert!(handler.registry().contains(&a1()));
        assert!(handler.registry().queues().is_incoming(&a1()));
    }

    #[test]
    fn rejected_report_on_new_address_creates_nothing() {
        let handler = handler();
        let err = handler.handle(a1(), ZERO_CAL).unwrap_err();
        assert!(matches!(err, Error::InvalidReading(_)));
        assert!(handler.registry().is_empty());
        assert_eq!(handler.registry().queues().incoming_len(), 0);
    }

    #[test]
    fn rejected_report_leaves_existing_record_untouched() {
        let handler = handler();
        let before = handler.handle(a1(), VALID).unwrap();

        assert!(handler.handle(a1(), ZERO_CAL).is_err());
        assert!(handler.handle(a1(), b"1,2,3").is_err());

        assert_eq!(handler.registry().get(&a1()).unwrap(), before);
    }
}
