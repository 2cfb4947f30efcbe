//! Admission: turning a first-seen address into an addressable resource
//!
//! New addresses land in the *incoming* queue (via the registry), receive a
//! resource path and move to *pending*, and are finally attached to the
//! request dispatcher.

pub mod path;
pub mod pipeline;
pub mod queue;

use std::net::IpAddr;

use serde::Serialize;

use crate::Result;

pub use path::PathAllocator;
pub use pipeline::{AdmissionPipeline, DrainStats};
pub use queue::AdmissionQueues;

/// Where an address stands in admission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdmissionState {
    /// Waiting for a resource path
    Incoming,
    /// Path allocated, waiting for the dispatcher
    Pending,
    /// Served at its resource path
    Attached,
    /// Known but in no queue; picked up again on its next report
    Unadmitted,
}

/// Binds resource paths to live request handlers
pub trait Dispatcher: Send + Sync {
    /// Serve `path` on behalf of `address`
    ///
    /// # Errors
    ///
    /// Returns `AttachmentFailure` if the path cannot be bound
    fn attach(&self, path: &str, address: IpAddr) -> Result<()>;
}
