//! Mesh Gateway - device registry and admission for low-power sensor meshes
//!
//! Sensor nodes report measurements with a small request/response protocol.
//! The gateway recognizes never-seen nodes, grants each one a stable
//! resource path, keeps their latest readings, and exposes the current
//! snapshot to telemetry export and dashboards.
//!
//! # Architecture
//!
//! ```text
//!   node report ──▶ UpdateHandler ──▶ DeviceRegistry ──(new)──▶ incoming
//!                                          │                      │
//!                                          │         PathAllocator│
//!                                          │                      ▼
//!                                          │                   pending
//!                                          │                      │
//!                                          │           Dispatcher │ (ResourceTable)
//!                                          ▼                      ▼
//!                         snapshot ──▶ exporter / API        attached path
//! ```

pub mod admission;
pub mod api;
pub mod config;
pub mod daemon;
pub mod devices;
pub mod discovery;
pub mod error;
pub mod shutdown;
pub mod telemetry;

pub use admission::{AdmissionPipeline, AdmissionQueues, AdmissionState, Dispatcher, PathAllocator};
pub use api::ResourceTable;
pub use config::Config;
pub use daemon::{Daemon, Gateway};
pub use devices::{DeviceRecord, DeviceRegistry, DeviceVariant, UpdateHandler};
pub use discovery::MdnsAdvertiser;
pub use error::{Error, Result};
pub use telemetry::InfluxExporter;
