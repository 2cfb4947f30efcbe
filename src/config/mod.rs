//! Configuration management for the mesh gateway
//!
//! Layers, lowest first: built-in defaults, the TOML config file, then
//! `MESHGW_*` environment variables.

pub mod file;

use std::net::{IpAddr, Ipv6Addr};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::admission::path::DEFAULT_PATH_LEN;
use crate::devices::liveness::DEFAULT_WINDOW;
use crate::discovery::mdns::SERVICE_TYPE;
use crate::{Error, Result};

pub use file::{GatewayConfigFile, load_config_file};

/// Default listening port
pub const DEFAULT_PORT: u16 = 5683;

/// Default shared registration path
pub const DEFAULT_WELL_KNOWN_PATH: &str = "common";

/// Default admission poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Default advertisement refresh interval
pub const DEFAULT_ADVERTISE_INTERVAL: Duration = Duration::from_secs(30);

/// Default telemetry export interval
pub const DEFAULT_EXPORT_INTERVAL: Duration = Duration::from_secs(15);

/// Shortest resource path token accepted
const MIN_PATH_LEN: usize = 8;

/// Upper bound for every configured interval (one week)
const MAX_INTERVAL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Mesh gateway configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub admission: AdmissionConfig,
    /// Nodes silent for longer than this are reported as not alive
    pub liveness_window: Duration,
    pub discovery: DiscoveryConfig,
    /// Export is disabled when no store URL is configured
    pub telemetry: Option<TelemetryConfig>,
}

/// HTTP listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub well_known_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            well_known_path: DEFAULT_WELL_KNOWN_PATH.to_string(),
        }
    }
}

/// Admission pipeline configuration
#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    /// How often each admission queue is drained
    pub poll_interval: Duration,
    /// Length of generated resource path tokens
    pub path_length: usize,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            path_length: DEFAULT_PATH_LEN,
        }
    }
}

/// mDNS advertisement configuration
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    pub service_type: String,
    /// Instance name; the host name when unset
    pub instance_name: Option<String>,
    /// Address to advertise; auto-detected when unset
    pub advertise_address: Option<IpAddr>,
    pub interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_type: SERVICE_TYPE.to_string(),
            instance_name: None,
            advertise_address: None,
            interval: DEFAULT_ADVERTISE_INTERVAL,
        }
    }
}

/// Time-series export configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Base URL of the store (e.g. `http://localhost:8086`)
    pub url: String,
    pub org: String,
    pub bucket: String,
    pub token: Option<String>,
    pub measurement: String,
    pub interval: Duration,
}

impl Config {
    /// Load configuration from the config file and process environment
    ///
    /// # Errors
    ///
    /// Returns error if an explicit config file cannot be loaded or a value
    /// is invalid
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = load_config_file(path)?;
        Self::from_layers(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with environment lookups
    ///
    /// # Errors
    ///
    /// Returns `Config` if an environment value does not parse or a merged
    /// value is out of range
    pub fn from_layers<F>(file: GatewayConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ServerConfig::default();
        let server = ServerConfig {
            bind: env_parse(&env, "MESHGW_BIND")?
                .or(file.server.bind)
                .unwrap_or(defaults.bind),
            port: env_parse(&env, "MESHGW_PORT")?
                .or(file.server.port)
                .unwrap_or(defaults.port),
            well_known_path: env("MESHGW_WELL_KNOWN_PATH")
                .or(file.server.well_known_path)
                .unwrap_or(defaults.well_known_path),
        };

        let admission = AdmissionConfig {
            poll_interval: secs(
                env_parse(&env, "MESHGW_POLL_INTERVAL_SECS")?.or(file.admission.poll_interval_secs),
                DEFAULT_POLL_INTERVAL,
            ),
            path_length: file.admission.path_length.unwrap_or(DEFAULT_PATH_LEN),
        };

        let liveness_window = secs(
            env_parse(&env, "MESHGW_LIVENESS_WINDOW_SECS")?.or(file.liveness.window_secs),
            DEFAULT_WINDOW,
        );

        let discovery_defaults = DiscoveryConfig::default();
        let discovery = DiscoveryConfig {
            enabled: env_parse(&env, "MESHGW_DISCOVERY_ENABLED")?
                .or(file.discovery.enabled)
                .unwrap_or(discovery_defaults.enabled),
            service_type: file
                .discovery
                .service_type
                .unwrap_or(discovery_defaults.service_type),
            instance_name: env("MESHGW_INSTANCE_NAME").or(file.discovery.instance_name),
            advertise_address: env_parse(&env, "MESHGW_ADVERTISE_ADDRESS")?
                .or(file.discovery.advertise_address),
            interval: secs(file.discovery.interval_secs, DEFAULT_ADVERTISE_INTERVAL),
        };

        let telemetry_file = file.telemetry;
        let telemetry = env("MESHGW_INFLUX_URL")
            .or(telemetry_file.url)
            .map(|url| -> Result<TelemetryConfig> {
                Ok(TelemetryConfig {
                    url,
                    org: env("MESHGW_INFLUX_ORG")
                        .or(telemetry_file.org)
                        .unwrap_or_default(),
                    bucket: env("MESHGW_INFLUX_BUCKET")
                        .or(telemetry_file.bucket)
                        .unwrap_or_default(),
                    token: env("MESHGW_INFLUX_TOKEN").or(telemetry_file.token),
                    measurement: telemetry_file
                        .measurement
                        .unwrap_or_else(|| "mesh_sensor".to_string()),
                    interval: secs(
                        env_parse(&env, "MESHGW_EXPORT_INTERVAL_SECS")?
                            .or(telemetry_file.interval_secs),
                        DEFAULT_EXPORT_INTERVAL,
                    ),
                })
            })
            .transpose()?;

        let config = Self {
            server,
            admission,
            liveness_window,
            discovery,
            telemetry,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check ranges that the types alone do not enforce
    ///
    /// # Errors
    ///
    /// Returns `Config` describing the first invalid value
    pub fn validate(&self) -> Result<()> {
        let path = &self.server.well_known_path;
        if path.is_empty() || path.contains('/') {
            return Err(Error::Config(format!(
                "well-known path must be a single non-empty segment, got {path:?}"
            )));
        }
        if self.admission.path_length < MIN_PATH_LEN {
            return Err(Error::Config(format!(
                "resource path length must be at least {MIN_PATH_LEN}, got {}",
                self.admission.path_length
            )));
        }

        let mut intervals = vec![
            ("admission poll interval", self.admission.poll_interval),
            ("liveness window", self.liveness_window),
            ("advertisement interval", self.discovery.interval),
        ];
        if let Some(telemetry) = &self.telemetry {
            intervals.push(("export interval", telemetry.interval));
            if telemetry.bucket.is_empty() {
                return Err(Error::Config("telemetry bucket is required".to_string()));
            }
        }
        for (name, value) in intervals {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
            if value > MAX_INTERVAL {
                return Err(Error::Config(format!(
                    "{name} must be at most {} seconds, got {}",
                    MAX_INTERVAL.as_secs(),
                    value.as_secs()
                )));
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            admission: AdmissionConfig::default(),
            liveness_window: DEFAULT_WINDOW,
            discovery: DiscoveryConfig::default(),
            telemetry: None,
        }
    }
}

fn secs(value: Option<u64>, default: Duration) -> Duration {
    value.map_or(default, Duration::from_secs)
}

fn env_parse<T, F>(env: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    env(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid {key}={raw:?}: {e}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = Config::from_layers(GatewayConfigFile::default(), env_of(&[])).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.well_known_path, "common");
        assert_eq!(config.admission.poll_interval, Duration::from_secs(30));
        assert_eq!(config.liveness_window, Duration::from_secs(30));
        assert!(config.discovery.enabled);
        assert!(config.telemetry.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let file: GatewayConfigFile = toml::from_str(
            "[server]\nport = 6000\n[admission]\npoll_interval_secs = 10\n",
        )
        .unwrap();
        let config =
            Config::from_layers(file, env_of(&[("MESHGW_PORT", "7000")])).unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.admission.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn telemetry_enabled_by_url() {
        let config = Config::from_layers(
            GatewayConfigFile::default(),
            env_of(&[
                ("MESHGW_INFLUX_URL", "http://influx:8086"),
                ("MESHGW_INFLUX_BUCKET", "sensors"),
                ("MESHGW_INFLUX_TOKEN", "secret"),
            ]),
        )
        .unwrap();

        let telemetry = config.telemetry.unwrap();
        assert_eq!(telemetry.url, "http://influx:8086");
        assert_eq!(telemetry.bucket, "sensors");
        assert_eq!(telemetry.token.as_deref(), Some("secret"));
        assert_eq!(telemetry.interval, Duration::from_secs(15));
    }

    #[test]
    fn invalid_env_value_is_rejected() {
        let err = Config::from_layers(
            GatewayConfigFile::default(),
            env_of(&[("MESHGW_PORT", "not-a-port")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let file: GatewayConfigFile =
            toml::from_str("[admission]\npoll_interval_secs = 0\n").unwrap();
        assert!(Config::from_layers(file, env_of(&[])).is_err());
    }

    #[test]
    fn oversized_interval_is_rejected() {
        let err = Config::from_layers(
            GatewayConfigFile::default(),
            env_of(&[("MESHGW_LIVENESS_WINDOW_SECS", u64::MAX.to_string().as_str())]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let file: GatewayConfigFile =
            toml::from_str("[admission]\npoll_interval_secs = 604800\n").unwrap();
        assert!(Config::from_layers(file, env_of(&[])).is_ok());
    }

    #[test]
    fn nested_well_known_path_is_rejected() {
        let err = Config::from_layers(
            GatewayConfigFile::default(),
            env_of(&[("MESHGW_WELL_KNOWN_PATH", "a/b")]),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
