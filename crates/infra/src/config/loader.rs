//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `LEXFLOW_CONFIG`: Explicit config file path (skips probing)
//! - `LEXFLOW_DB_PATH`: Database file path
//! - `LEXFLOW_DB_POOL_SIZE`: Connection pool size (optional)
//! - `LEXFLOW_CLIO_BASE_URL`: Base URL of the Clio REST API
//! - `LEXFLOW_CLIO_TOKEN_URL`: OAuth token endpoint
//! - `LEXFLOW_CLIO_CLIENT_ID`: OAuth client id
//! - `LEXFLOW_CLIO_CLIENT_SECRET`: OAuth client secret (optional)
//! - `LEXFLOW_CLIO_MAX_RPS`: Outbound request ceiling per second (optional)
//! - `LEXFLOW_CLIO_MAX_RETRIES`: Retry budget per logical request (optional)
//! - `LEXFLOW_CLIO_TIMEOUT_SECS`: Per-request timeout in seconds (optional)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./lexflow.json` or `./lexflow.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};

use lexflow_domain::constants::{
    DEFAULT_MAX_REQUESTS_PER_SECOND, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use lexflow_domain::{ClioConfig, Config, DatabaseConfig, LexFlowError, Result};

const DEFAULT_POOL_SIZE: u32 = 4;

/// Load configuration with automatic fallback strategy
///
/// Reads a local `.env` file if one exists, then attempts to load from
/// environment variables. If any required variables are missing, falls
/// back to loading from a config file.
///
/// # Errors
/// Returns `LexFlowError::Config` if:
/// - Configuration cannot be loaded from either source
/// - File format is invalid
/// - Required fields are missing
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded environment from .env");
    }

    // Try loading from environment first
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            // Fall back to file, honoring an explicit LEXFLOW_CONFIG path
            let explicit = std::env::var("LEXFLOW_CONFIG").ok().map(PathBuf::from);
            load_from_file(explicit)
        }
    }
}

/// Load configuration from environment variables
///
/// The database path and the Clio connection variables are required;
/// numeric tuning knobs fall back to the same defaults the file format
/// uses when left out.
///
/// # Errors
/// Returns `LexFlowError::Config` if required variables are missing
/// or have invalid values.
pub fn load_from_env() -> Result<Config> {
    let db_path = env_var("LEXFLOW_DB_PATH")?;
    let db_pool_size = env_parse("LEXFLOW_DB_POOL_SIZE", DEFAULT_POOL_SIZE)?;

    let base_url = env_var("LEXFLOW_CLIO_BASE_URL")?;
    let token_url = env_var("LEXFLOW_CLIO_TOKEN_URL")?;
    let client_id = env_var("LEXFLOW_CLIO_CLIENT_ID")?;
    let client_secret = std::env::var("LEXFLOW_CLIO_CLIENT_SECRET").ok();

    let max_requests_per_second =
        env_parse("LEXFLOW_CLIO_MAX_RPS", DEFAULT_MAX_REQUESTS_PER_SECOND)?;
    let max_retries = env_parse("LEXFLOW_CLIO_MAX_RETRIES", DEFAULT_MAX_RETRIES)?;
    let request_timeout_seconds =
        env_parse("LEXFLOW_CLIO_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;

    Ok(Config {
        database: DatabaseConfig { path: db_path, pool_size: db_pool_size },
        clio: ClioConfig {
            base_url,
            token_url,
            client_id,
            client_secret,
            max_requests_per_second,
            max_retries,
            request_timeout_seconds,
        },
    })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `LexFlowError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(LexFlowError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            LexFlowError::Config("No config file found in the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| LexFlowError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `LexFlowError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| LexFlowError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| LexFlowError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(LexFlowError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches for config files in the following locations (in order):
/// 1. Current working directory (`./config.{json,toml}`,
///    `./lexflow.{json,toml}`)
/// 2. Parent directories (up to 2 levels)
/// 3. Relative to executable location
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(vec![
            cwd.join("config.json"),
            cwd.join("config.toml"),
            cwd.join("lexflow.json"),
            cwd.join("lexflow.toml"),
            cwd.join("../config.json"),
            cwd.join("../config.toml"),
            cwd.join("../../config.json"),
            cwd.join("../../config.toml"),
        ]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(vec![
                exe_dir.join("config.json"),
                exe_dir.join("config.toml"),
                exe_dir.join("lexflow.json"),
                exe_dir.join("lexflow.toml"),
                exe_dir.join("../config.json"),
                exe_dir.join("../config.toml"),
                exe_dir.join("../../config.json"),
                exe_dir.join("../../config.toml"),
            ]);
        }
    }

    // Return first existing candidate
    candidates.into_iter().find(|path| path.exists())
}

/// Get required environment variable
///
/// # Errors
/// Returns `LexFlowError::Config` if the variable is not set.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        LexFlowError::Config(format!("Missing required environment variable: {}", key))
    })
}

/// Parse an optional numeric environment variable
///
/// An unset variable yields `default`; a set but unparsable one is an
/// error rather than a silent fallback.
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| LexFlowError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use once_cell::sync::Lazy;
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

    const ALL_VARS: &[&str] = &[
        "LEXFLOW_DB_PATH",
        "LEXFLOW_DB_POOL_SIZE",
        "LEXFLOW_CLIO_BASE_URL",
        "LEXFLOW_CLIO_TOKEN_URL",
        "LEXFLOW_CLIO_CLIENT_ID",
        "LEXFLOW_CLIO_CLIENT_SECRET",
        "LEXFLOW_CLIO_MAX_RPS",
        "LEXFLOW_CLIO_MAX_RETRIES",
        "LEXFLOW_CLIO_TIMEOUT_SECS",
    ];

    fn clear_env() {
        for var in ALL_VARS {
            std::env::remove_var(var);
        }
    }

    fn set_required_env() {
        std::env::set_var("LEXFLOW_DB_PATH", "/tmp/lexflow-test.db");
        std::env::set_var("LEXFLOW_CLIO_BASE_URL", "https://app.clio.test/api/v4");
        std::env::set_var("LEXFLOW_CLIO_TOKEN_URL", "https://app.clio.test/oauth/token");
        std::env::set_var("LEXFLOW_CLIO_CLIENT_ID", "client-abc");
    }

    #[test]
    fn test_load_from_env_all_vars_set() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        set_required_env();
        std::env::set_var("LEXFLOW_DB_POOL_SIZE", "8");
        std::env::set_var("LEXFLOW_CLIO_CLIENT_SECRET", "s3cret");
        std::env::set_var("LEXFLOW_CLIO_MAX_RPS", "2");
        std::env::set_var("LEXFLOW_CLIO_MAX_RETRIES", "5");
        std::env::set_var("LEXFLOW_CLIO_TIMEOUT_SECS", "45");

        let result = load_from_env();
        assert!(result.is_ok(), "Should load config from env vars, error: {:?}", result.err());

        let config = result.unwrap();
        assert_eq!(config.database.path, "/tmp/lexflow-test.db");
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.clio.base_url, "https://app.clio.test/api/v4");
        assert_eq!(config.clio.client_secret.as_deref(), Some("s3cret"));
        assert_eq!(config.clio.max_requests_per_second, 2);
        assert_eq!(config.clio.max_retries, 5);
        assert_eq!(config.clio.request_timeout_seconds, 45);

        clear_env();
    }

    #[test]
    fn test_load_from_env_fills_optional_defaults() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        set_required_env();

        let config = load_from_env().expect("required vars are set");
        assert_eq!(config.database.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.clio.client_secret.is_none());
        assert_eq!(config.clio.max_requests_per_second, DEFAULT_MAX_REQUESTS_PER_SECOND);
        assert_eq!(config.clio.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.clio.request_timeout_seconds, DEFAULT_REQUEST_TIMEOUT_SECS);

        clear_env();
    }

    #[test]
    fn test_load_from_env_missing_var() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        let result = load_from_env();
        assert!(result.is_err(), "Should fail with missing env var");

        let err = result.unwrap_err();
        assert!(matches!(err, LexFlowError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_env_invalid_number() {
        let _guard = ENV_LOCK.lock().expect("env mutex poisoned");
        clear_env();

        set_required_env();
        std::env::set_var("LEXFLOW_DB_POOL_SIZE", "not-a-number");

        let result = load_from_env();
        assert!(result.is_err(), "Should fail with invalid pool size");

        let err = result.unwrap_err();
        assert!(matches!(err, LexFlowError::Config(_)), "Should be a Config error");

        clear_env();
    }

    #[test]
    fn test_load_from_file_json() {
        let json_content = r#"{
            "database": {
                "path": "test.db",
                "pool_size": 4
            },
            "clio": {
                "base_url": "https://app.clio.test/api/v4",
                "token_url": "https://app.clio.test/oauth/token",
                "client_id": "client-abc",
                "client_secret": "s3cret",
                "max_requests_per_second": 4,
                "max_retries": 3,
                "request_timeout_seconds": 30
            }
        }"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(json_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_ok(), "Should load config from JSON file");

        let config = result.unwrap();
        assert_eq!(config.database.path, "test.db");
        assert_eq!(config.database.pool_size, 4);
        assert_eq!(config.clio.client_id, "client-abc");

        // Cleanup
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_toml() {
        let toml_content = r#"
[database]
path = "test.db"
pool_size = 6

[clio]
base_url = "https://app.clio.test/api/v4"
token_url = "https://app.clio.test/oauth/token"
client_id = "client-abc"
max_requests_per_second = 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("toml");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_ok(), "Should load config from TOML file");

        let config = result.unwrap();
        assert_eq!(config.database.pool_size, 6);
        assert_eq!(config.clio.max_requests_per_second, 2);
        // Fields left out of the file fall back to their defaults
        assert_eq!(config.clio.max_retries, DEFAULT_MAX_RETRIES);
        assert!(config.clio.client_secret.is_none());

        // Cleanup
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_from_file_not_found() {
        let result = load_from_file(Some(PathBuf::from("/nonexistent/config.json")));
        assert!(result.is_err(), "Should fail when file not found");

        let err = result.unwrap_err();
        assert!(matches!(err, LexFlowError::Config(_)), "Should be a Config error");
    }

    #[test]
    fn test_load_from_file_invalid_json() {
        let invalid_json = r#"{ "this is": "not valid json" "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_json.as_bytes()).unwrap();
        let path = temp_file.path().with_extension("json");
        std::fs::copy(temp_file.path(), &path).unwrap();

        let result = load_from_file(Some(path.clone()));
        assert!(result.is_err(), "Should fail with invalid JSON");

        // Cleanup
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_config_unsupported_format() {
        let content = "some content";
        let path = PathBuf::from("test.yaml");
        let result = parse_config(content, &path);
        assert!(result.is_err(), "Should fail with unsupported format");
    }
}
