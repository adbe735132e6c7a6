//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Remote client configuration
pub const DEFAULT_MAX_REQUESTS_PER_SECOND: u32 = 4;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const TOKEN_REFRESH_THRESHOLD_SECS: i64 = 300; // Refresh 5 min before expiry

// Poll scheduler configuration
pub const DEFAULT_POLL_INTERVAL_MINUTES: u32 = 15;
pub const MIN_POLL_INTERVAL_MINUTES: u32 = 1;

// Settings keys (app_settings table)
pub const SETTING_POLL_INTERVAL_MINUTES: &str = "poll_interval_minutes";
pub const SETTING_AUTO_NOTIFY: &str = "auto_notify";

// Error capture configuration
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 256;
pub const ERROR_TRUNCATE_SUFFIX: &str = "...";
