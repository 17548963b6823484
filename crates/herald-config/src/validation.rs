//! Configuration validation

use crate::RawConfig;
use thiserror::Error;

/// A single validation failure
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("server.api_base_url must not be empty")]
    EmptyApiBaseUrl,

    #[error("{field} must be an http(s) URL, got {value:?}")]
    InvalidUrl { field: &'static str, value: String },

    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },

    #[error("push.public_key must not be empty when set")]
    EmptyPublicKey,
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Validate a raw config, collecting every failure rather than stopping at
/// the first one.
pub fn validate_config(raw: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if raw.server.api_base_url.trim().is_empty() {
        errors.push(ValidationError::EmptyApiBaseUrl);
    } else if !is_http_url(&raw.server.api_base_url) {
        errors.push(ValidationError::InvalidUrl {
            field: "server.api_base_url",
            value: raw.server.api_base_url.clone(),
        });
    }

    if let Some(gateway) = &raw.push.gateway_url
        && !is_http_url(gateway)
    {
        errors.push(ValidationError::InvalidUrl {
            field: "push.gateway_url",
            value: gateway.clone(),
        });
    }

    if let Some(key) = &raw.push.public_key
        && key.trim().is_empty()
    {
        errors.push(ValidationError::EmptyPublicKey);
    }

    if let Some(url) = &raw.connectivity.check_url
        && !is_http_url(url)
    {
        errors.push(ValidationError::InvalidUrl {
            field: "connectivity.check_url",
            value: url.clone(),
        });
    }

    if raw.connectivity.check_interval_seconds == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            field: "connectivity.check_interval_seconds",
        });
    }

    if raw.connectivity.check_timeout_seconds == Some(0) {
        errors.push(ValidationError::ZeroDuration {
            field: "connectivity.check_timeout_seconds",
        });
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(config: &str) -> RawConfig {
        toml::from_str(config).unwrap()
    }

    #[test]
    fn valid_config_passes() {
        let config = raw(r#"
            config_version = 1

            [server]
            api_base_url = "https://api.example.com"
        "#);

        assert!(validate_config(&config).is_empty());
    }

    #[test]
    fn bad_scheme_rejected() {
        let config = raw(r#"
            config_version = 1

            [server]
            api_base_url = "ftp://api.example.com"
        "#);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], ValidationError::InvalidUrl { .. }));
    }

    #[test]
    fn multiple_errors_collected() {
        let config = raw(r#"
            config_version = 1

            [server]
            api_base_url = ""

            [push]
            gateway_url = "not-a-url"

            [connectivity]
            check_interval_seconds = 0
        "#);

        let errors = validate_config(&config);
        assert_eq!(errors.len(), 3);
    }
}
