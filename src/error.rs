//! Error types for the mesh gateway

use std::net::IpAddr;

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the mesh gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Report payload could not be decoded (field count, encoding, number format)
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// Report decoded cleanly but carries a value the gateway refuses
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    /// An operation referenced an address with no device record
    #[error("unknown address: {0}")]
    UnknownAddress(IpAddr),

    /// The dispatcher refused to bind a resource path
    #[error("attachment failure for {path}: {reason}")]
    AttachmentFailure { path: String, reason: String },

    /// A resource path was already assigned to the address
    #[error("resource path already assigned to {0}")]
    PathAlreadyAssigned(IpAddr),

    /// Service advertisement error
    #[error("advertisement error: {0}")]
    Advertisement(String),

    /// Telemetry export error
    #[error("export error: {0}")]
    Export(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
