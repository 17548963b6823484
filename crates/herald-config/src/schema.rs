//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Backend server settings
    pub server: RawServerConfig,

    /// Push worker settings
    #[serde(default)]
    pub push: RawPushConfig,

    /// Connectivity probe settings
    #[serde(default)]
    pub connectivity: RawConnectivityConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: RawStorageConfig,
}

/// Backend server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawServerConfig {
    /// Base URL of the REST backend, e.g. "https://api.example.com"
    pub api_base_url: String,

    /// Path of the event stream endpoint (default: "/events")
    pub events_path: Option<String>,

    /// Name of the cookie carrying the stream credential (default: "sse_token")
    pub token_cookie: Option<String>,
}

/// Push worker settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawPushConfig {
    /// Whether the push worker runs at all (default: true)
    pub enabled: Option<bool>,

    /// Server-provided public key, base64url-encoded.
    /// Required for subscribe operations, not for the rest of the daemon.
    pub public_key: Option<String>,

    /// Base URL of the push gateway
    pub gateway_url: Option<String>,
}

/// Connectivity probe settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawConnectivityConfig {
    /// URL probed for connectivity (default: a generate_204 endpoint)
    pub check_url: Option<String>,

    /// Probe interval in seconds (default: 30)
    pub check_interval_seconds: Option<u64>,

    /// Probe timeout in seconds (default: 5)
    pub check_timeout_seconds: Option<u64>,
}

/// Storage settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawStorageConfig {
    /// Data directory for the store (default: XDG data dir)
    pub data_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [server]
            api_base_url = "https://api.example.com"
            events_path = "/stream"
            token_cookie = "session"

            [push]
            enabled = true
            public_key = "BASE64KEY"
            gateway_url = "https://push.example.com"

            [connectivity]
            check_url = "https://api.example.com/health"
            check_interval_seconds = 15
            check_timeout_seconds = 3

            [storage]
            data_dir = "/var/lib/heraldd"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.events_path.as_deref(), Some("/stream"));
        assert_eq!(config.push.public_key.as_deref(), Some("BASE64KEY"));
        assert_eq!(config.connectivity.check_interval_seconds, Some(15));
    }

    #[test]
    fn optional_sections_default() {
        let toml_str = r#"
            config_version = 1

            [server]
            api_base_url = "https://api.example.com"
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert!(config.push.enabled.is_none());
        assert!(config.connectivity.check_url.is_none());
        assert!(config.storage.data_dir.is_none());
    }
}
