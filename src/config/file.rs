//! TOML configuration file loading
//!
//! Supports `~/.config/mesh-gateway/config.toml` (or an explicit path) as a
//! persistent config source. All fields are optional; the file is a partial
//! overlay on top of defaults.

use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfigFile {
    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub admission: AdmissionFileConfig,

    #[serde(default)]
    pub liveness: LivenessFileConfig,

    #[serde(default)]
    pub discovery: DiscoveryFileConfig,

    #[serde(default)]
    pub telemetry: TelemetryFileConfig,
}

/// Listener configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerFileConfig {
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    /// Shared path accepting first reports from any node
    pub well_known_path: Option<String>,
}

/// Admission pipeline configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionFileConfig {
    pub poll_interval_secs: Option<u64>,
    pub path_length: Option<usize>,
}

/// Liveness configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LivenessFileConfig {
    pub window_secs: Option<u64>,
}

/// mDNS advertisement configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryFileConfig {
    pub enabled: Option<bool>,
    pub service_type: Option<String>,
    pub instance_name: Option<String>,
    pub advertise_address: Option<IpAddr>,
    pub interval_secs: Option<u64>,
}

/// Time-series export configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryFileConfig {
    pub url: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
    pub token: Option<String>,
    pub measurement: Option<String>,
    pub interval_secs: Option<u64>,
}

/// Load the TOML config file
///
/// An explicit `path` must exist and parse. Without one, the standard path
/// is tried and a missing or unreadable file falls back to defaults.
///
/// # Errors
///
/// Returns error if an explicitly given file cannot be read or parsed
pub fn load_config_file(path: Option<&Path>) -> Result<GatewayConfigFile> {
    if let Some(path) = path {
        let content = std::fs::read_to_string(path)?;
        let config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "loaded config file");
        return Ok(config);
    }

    let Some(path) = config_file_path() else {
        return Ok(GatewayConfigFile::default());
    };

    if !path.exists() {
        return Ok(GatewayConfigFile::default());
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                Ok(config)
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                Ok(GatewayConfigFile::default())
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            Ok(GatewayConfigFile::default())
        }
    }
}

/// Return the config file path: `~/.config/mesh-gateway/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "omni", "mesh-gateway")
        .map(|d| d.config_dir().join("config.toml"))
}
