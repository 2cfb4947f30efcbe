//! Device records, the registry that owns them, and report handling
//!
//! Nodes are identified by network address. A record is created on the
//! first valid report and updated in place afterwards; it is never removed,
//! staleness is expressed through `last_seen`.

pub mod handler;
pub mod liveness;
pub mod payload;
pub mod registry;
pub mod types;

pub use handler::UpdateHandler;
pub use liveness::alive;
pub use registry::DeviceRegistry;
pub use types::{DecodedReport, DeviceRecord, DeviceVariant, GasSensorReadings, Measurements};
