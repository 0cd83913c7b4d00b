//! Application-level configuration loading for network ports and logging paths.

use std::{env, fs, io::ErrorKind, net::SocketAddr, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/fieldhub.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FIELDHUB_CONFIG_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Port the HTTP and websocket server listens on.
    pub http_port: u16,
    /// Port driver stations dial for the TCP control connection.
    pub ds_tcp_port: u16,
    /// Port the arena listens on for UDP status packets.
    pub ds_udp_receive_port: u16,
    /// Driver-station-side port control packets are sent to.
    pub ds_udp_send_port: u16,
    /// Directory for per-match driver station logs; logging is off when absent.
    pub ds_log_dir: Option<PathBuf>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in
    /// defaults. A `PORT` environment variable overrides the HTTP port either
    /// way.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let mut config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        if let Some(port) = env::var("PORT").ok().and_then(|value| value.parse().ok()) {
            config.http_port = port;
        }
        config
    }

    /// Bind address for the HTTP server.
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }

    /// Bind address for the driver station TCP listener.
    pub fn ds_tcp_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.ds_tcp_port))
    }

    /// Bind address for the driver station UDP status listener.
    pub fn ds_udp_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.ds_udp_receive_port))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            ds_tcp_port: 1750,
            ds_udp_receive_port: 1160,
            ds_udp_send_port: 1121,
            ds_log_dir: None,
        }
    }
}

/// JSON representation of the configuration file located at
/// [`DEFAULT_CONFIG_PATH`]. Every field is optional; absent fields keep their
/// defaults.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawConfig {
    http_port: Option<u16>,
    ds_tcp_port: Option<u16>,
    ds_udp_receive_port: Option<u16>,
    ds_udp_send_port: Option<u16>,
    ds_log_dir: Option<PathBuf>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            http_port: raw.http_port.unwrap_or(defaults.http_port),
            ds_tcp_port: raw.ds_tcp_port.unwrap_or(defaults.ds_tcp_port),
            ds_udp_receive_port: raw.ds_udp_receive_port.unwrap_or(defaults.ds_udp_receive_port),
            ds_udp_send_port: raw.ds_udp_send_port.unwrap_or(defaults.ds_udp_send_port),
            ds_log_dir: raw.ds_log_dir,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_standard_field_ports() {
        let config = AppConfig::default();
        assert_eq!(config.ds_tcp_port, 1750);
        assert_eq!(config.ds_udp_receive_port, 1160);
        assert_eq!(config.ds_udp_send_port, 1121);
        assert_eq!(config.http_addr().port(), 8080);
        assert!(config.ds_log_dir.is_none());
    }

    #[test]
    fn partial_config_files_keep_defaults() {
        let raw: RawConfig = serde_json::from_str(r#"{"httpPort": 9090}"#).unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.http_port, 9090);
        assert_eq!(config.ds_tcp_port, 1750);
    }
}
