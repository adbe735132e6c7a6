//! Application configuration structures
//!
//! Plain data carriers deserialized by the infra config loader. Numeric
//! fields with sensible defaults fall back to the domain constants when
//! absent from the source file or environment.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_REQUESTS_PER_SECOND, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub clio: ClioConfig,
}

/// SQLite database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path
    pub path: String,
    /// Connection pool size
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Clio API client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClioConfig {
    /// Base URL of the Clio REST API (e.g. `https://app.clio.com/api/v4`)
    pub base_url: String,
    /// OAuth token endpoint used for refresh grants
    pub token_url: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret (confidential clients only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Fixed-rate ceiling for outbound requests, in requests per second
    #[serde(default = "default_max_requests_per_second")]
    pub max_requests_per_second: u32,
    /// Retry budget shared by all recovery paths of one logical request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

fn default_pool_size() -> u32 {
    4
}

fn default_max_requests_per_second() -> u32 {
    DEFAULT_MAX_REQUESTS_PER_SECOND
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clio_config_defaults_fill_missing_fields() {
        let json = r#"{
            "base_url": "https://app.clio.com/api/v4",
            "token_url": "https://app.clio.com/oauth/token",
            "client_id": "abc123"
        }"#;

        let config: ClioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_requests_per_second, DEFAULT_MAX_REQUESTS_PER_SECOND);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECS);
        assert!(config.client_secret.is_none());
    }

    #[test]
    fn test_full_config_roundtrip() {
        let config = Config {
            database: DatabaseConfig { path: "lexflow.db".to_string(), pool_size: 8 },
            clio: ClioConfig {
                base_url: "https://app.clio.com/api/v4".to_string(),
                token_url: "https://app.clio.com/oauth/token".to_string(),
                client_id: "abc123".to_string(),
                client_secret: Some("s3cret".to_string()),
                max_requests_per_second: 4,
                max_retries: 3,
                request_timeout_seconds: 30,
            },
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.database.path, "lexflow.db");
        assert_eq!(parsed.database.pool_size, 8);
        assert_eq!(parsed.clio.client_secret.as_deref(), Some("s3cret"));
    }
}
