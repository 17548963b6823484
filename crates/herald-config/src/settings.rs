//! Typed settings derived from the raw schema

use crate::RawConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Default event stream path on the backend.
pub const DEFAULT_EVENTS_PATH: &str = "/events";

/// Default name of the cookie carrying the stream credential.
pub const DEFAULT_TOKEN_COOKIE: &str = "sse_token";

/// Default connectivity probe target.
pub const DEFAULT_CHECK_URL: &str = "https://connectivitycheck.gstatic.com/generate_204";

/// Validated daemon settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub push: PushSettings,
    pub connectivity: ConnectivitySettings,
    pub storage: StorageSettings,
}

/// Backend server settings
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Base URL without a trailing slash
    pub api_base_url: String,
    pub events_path: String,
    pub token_cookie: String,
}

impl ServerSettings {
    /// Full URL of the event stream endpoint.
    pub fn events_url(&self) -> String {
        format!("{}{}", self.api_base_url, self.events_path)
    }
}

/// Push worker settings
#[derive(Debug, Clone)]
pub struct PushSettings {
    pub enabled: bool,
    pub public_key: Option<String>,
    pub gateway_url: Option<String>,
}

/// Connectivity probe settings
#[derive(Debug, Clone)]
pub struct ConnectivitySettings {
    pub check_url: String,
    pub check_interval: Duration,
    pub check_timeout: Duration,
}

/// Storage settings
#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub data_dir: PathBuf,
}

impl Settings {
    /// Convert a validated raw config into typed settings.
    pub fn from_raw(raw: RawConfig) -> Self {
        let api_base_url = raw.server.api_base_url.trim_end_matches('/').to_string();

        Self {
            server: ServerSettings {
                api_base_url,
                events_path: raw
                    .server
                    .events_path
                    .unwrap_or_else(|| DEFAULT_EVENTS_PATH.to_string()),
                token_cookie: raw
                    .server
                    .token_cookie
                    .unwrap_or_else(|| DEFAULT_TOKEN_COOKIE.to_string()),
            },
            push: PushSettings {
                enabled: raw.push.enabled.unwrap_or(true),
                public_key: raw.push.public_key,
                gateway_url: raw.push.gateway_url,
            },
            connectivity: ConnectivitySettings {
                check_url: raw
                    .connectivity
                    .check_url
                    .unwrap_or_else(|| DEFAULT_CHECK_URL.to_string()),
                check_interval: Duration::from_secs(
                    raw.connectivity.check_interval_seconds.unwrap_or(30),
                ),
                check_timeout: Duration::from_secs(
                    raw.connectivity.check_timeout_seconds.unwrap_or(5),
                ),
            },
            storage: StorageSettings {
                data_dir: raw
                    .storage
                    .data_dir
                    .unwrap_or_else(herald_util::default_data_dir),
            },
        }
    }
}
