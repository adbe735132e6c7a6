//! Clio-specific error types and classification
//!
//! Categorizes Clio API failures so callers get retry recommendations and
//! user-facing messaging, with conversion into domain error types.

use lexflow_domain::LexFlowError;
use reqwest::StatusCode;
use std::fmt;

/// Clio error category for external consumption
///
/// Classifies errors by type to enable appropriate retry strategies
/// and user-facing messaging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClioErrorCategory {
    /// Network is offline or unreachable
    NetworkOffline,

    /// Network request timed out
    NetworkTimeout,

    /// Clio server is unavailable (5xx errors)
    ServerUnavailable,

    /// Authentication failed (401, 403)
    Authentication,

    /// Rate limit exceeded (429)
    RateLimited,

    /// Requested record does not exist (404)
    NotFound,

    /// Write rejected because the record changed remotely (409, 412)
    Conflict,

    /// Invalid request or data (remaining 4xx)
    Validation,

    /// Unknown or unclassified error
    Unknown,
}

impl ClioErrorCategory {
    /// Returns true if this error type should be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NetworkOffline
                | Self::NetworkTimeout
                | Self::ServerUnavailable
                | Self::RateLimited
        )
    }

    /// Returns recommended retry delay in seconds
    pub fn retry_delay_secs(&self) -> Option<u64> {
        match self {
            Self::NetworkOffline => Some(30),
            Self::NetworkTimeout => Some(10),
            Self::ServerUnavailable => Some(60),
            Self::RateLimited => Some(120),
            _ => None,
        }
    }

    /// Returns user-friendly message for this category
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NetworkOffline => {
                "No network connection. Please check your internet connection and try again."
            }
            Self::NetworkTimeout => {
                "Clio took too long to respond. Please try again in a few moments."
            }
            Self::ServerUnavailable => {
                "Clio is temporarily unavailable. This is usually temporary. Please try again in \
                 a minute."
            }
            Self::Authentication => {
                "Authentication failed. Please sign out and sign in again to refresh your Clio \
                 credentials."
            }
            Self::RateLimited => {
                "Too many requests to Clio. Please wait a couple minutes before trying again."
            }
            Self::NotFound => "The requested record no longer exists in Clio.",
            Self::Conflict => {
                "The record changed in Clio since it was last loaded. Please refresh and try \
                 again."
            }
            Self::Validation => {
                "Clio rejected the request data. Please check the submitted values."
            }
            Self::Unknown => {
                "An unexpected error occurred. Please try again or contact support if the problem \
                 persists."
            }
        }
    }
}

impl fmt::Display for ClioErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkOffline => write!(f, "Network Offline"),
            Self::NetworkTimeout => write!(f, "Network Timeout"),
            Self::ServerUnavailable => write!(f, "Server Unavailable"),
            Self::Authentication => write!(f, "Authentication Failed"),
            Self::RateLimited => write!(f, "Rate Limited"),
            Self::NotFound => write!(f, "Not Found"),
            Self::Conflict => write!(f, "Conflict"),
            Self::Validation => write!(f, "Validation Error"),
            Self::Unknown => write!(f, "Unknown Error"),
        }
    }
}

/// Internal Clio-specific error with retry metadata
///
/// Used within the Clio module for detailed error handling. External
/// callers receive `LexFlowError` via conversion.
#[derive(Debug, Clone)]
pub struct ClioError {
    category: ClioErrorCategory,
    message: String,
    context: Option<String>,
    retry_after: Option<u64>,
}

impl ClioError {
    /// Create a new Clio error
    pub fn new(category: ClioErrorCategory, message: impl Into<String>) -> Self {
        Self { category, message: message.into(), context: None, retry_after: None }
    }

    /// Create an unknown error (used for unexpected failures)
    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ClioErrorCategory::Unknown, message)
    }

    /// Add context to the error, typically the response body
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Attach a server-provided retry hint (Retry-After header, seconds)
    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Get the error category
    pub fn category(&self) -> &ClioErrorCategory {
        &self.category
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Get the error context
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns true if this error should be retried
    pub fn is_retryable(&self) -> bool {
        self.category.is_retryable()
    }

    /// Returns the retry delay to honor, preferring the server hint
    pub fn retry_delay_secs(&self) -> Option<u64> {
        self.retry_after.or_else(|| self.category.retry_delay_secs())
    }

    /// Returns the server-provided Retry-After hint, if any
    pub fn retry_after_hint(&self) -> Option<u64> {
        self.retry_after
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        let base = self.category.user_message();
        if let Some(ctx) = &self.context {
            format!("{} Details: {}", base, ctx)
        } else {
            base.to_string()
        }
    }

    /// Classify HTTP status code into error category
    pub fn from_status_code(status: StatusCode) -> Self {
        let category = match status.as_u16() {
            401 | 403 => ClioErrorCategory::Authentication,
            404 => ClioErrorCategory::NotFound,
            409 | 412 => ClioErrorCategory::Conflict,
            429 => ClioErrorCategory::RateLimited,
            400..=499 => ClioErrorCategory::Validation,
            500..=599 => ClioErrorCategory::ServerUnavailable,
            _ => ClioErrorCategory::Unknown,
        };

        Self::new(
            category,
            format!("HTTP {}: {}", status.as_u16(), status.canonical_reason().unwrap_or("Unknown")),
        )
    }

    /// Convert to domain error type
    pub fn into_domain_error(self) -> LexFlowError {
        match self.category {
            ClioErrorCategory::Authentication => LexFlowError::Auth(self.user_message()),
            ClioErrorCategory::RateLimited => LexFlowError::RateLimit(self.user_message()),
            ClioErrorCategory::ServerUnavailable => LexFlowError::Server(self.user_message()),
            ClioErrorCategory::NotFound => LexFlowError::NotFound(self.user_message()),
            ClioErrorCategory::Conflict => LexFlowError::Conflict(self.user_message()),
            ClioErrorCategory::Validation => LexFlowError::InvalidInput(self.user_message()),
            ClioErrorCategory::NetworkOffline | ClioErrorCategory::NetworkTimeout => {
                LexFlowError::Network(self.user_message())
            }
            ClioErrorCategory::Unknown => LexFlowError::Internal(self.user_message()),
        }
    }
}

impl fmt::Display for ClioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.category, self.message)?;
        if let Some(ctx) = &self.context {
            write!(f, " ({})", ctx)?;
        }
        Ok(())
    }
}

impl std::error::Error for ClioError {}

/// Convert reqwest errors to Clio errors
impl From<reqwest::Error> for ClioError {
    fn from(err: reqwest::Error) -> Self {
        let (category, message) = if err.is_timeout() {
            (ClioErrorCategory::NetworkTimeout, "Request timed out".to_string())
        } else if err.is_connect() {
            (ClioErrorCategory::NetworkOffline, "Failed to connect to Clio".to_string())
        } else if let Some(status) = err.status() {
            return Self::from_status_code(status).with_context(err.to_string());
        } else if err.is_request() {
            (ClioErrorCategory::Validation, "Invalid request".to_string())
        } else {
            (ClioErrorCategory::Unknown, "Network error".to_string())
        };

        Self::new(category, message).with_context(err.to_string())
    }
}

impl From<StatusCode> for ClioError {
    fn from(status: StatusCode) -> Self {
        Self::from_status_code(status)
    }
}

impl From<ClioError> for LexFlowError {
    fn from(err: ClioError) -> Self {
        err.into_domain_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories_carry_delay_hints() {
        for category in [
            ClioErrorCategory::NetworkOffline,
            ClioErrorCategory::NetworkTimeout,
            ClioErrorCategory::ServerUnavailable,
            ClioErrorCategory::RateLimited,
        ] {
            assert!(category.is_retryable());
            assert!(category.retry_delay_secs().is_some());
        }
    }

    #[test]
    fn terminal_categories_are_not_retryable() {
        for category in [
            ClioErrorCategory::Authentication,
            ClioErrorCategory::NotFound,
            ClioErrorCategory::Conflict,
            ClioErrorCategory::Validation,
            ClioErrorCategory::Unknown,
        ] {
            assert!(!category.is_retryable());
            assert_eq!(category.retry_delay_secs(), None);
        }
    }

    #[test]
    fn status_401_maps_to_authentication() {
        let err = ClioError::from_status_code(StatusCode::UNAUTHORIZED);
        assert_eq!(err.category(), &ClioErrorCategory::Authentication);
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_404_maps_to_not_found() {
        let err = ClioError::from_status_code(StatusCode::NOT_FOUND);
        assert_eq!(err.category(), &ClioErrorCategory::NotFound);
    }

    #[test]
    fn status_409_and_412_map_to_conflict() {
        let err = ClioError::from_status_code(StatusCode::CONFLICT);
        assert_eq!(err.category(), &ClioErrorCategory::Conflict);

        let err = ClioError::from_status_code(StatusCode::PRECONDITION_FAILED);
        assert_eq!(err.category(), &ClioErrorCategory::Conflict);
    }

    #[test]
    fn status_429_maps_to_rate_limited() {
        let err = ClioError::from_status_code(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.category(), &ClioErrorCategory::RateLimited);
        assert!(err.is_retryable());
    }

    #[test]
    fn status_422_maps_to_validation() {
        let err = ClioError::from_status_code(StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.category(), &ClioErrorCategory::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_503_maps_to_server_unavailable() {
        let err = ClioError::from_status_code(StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.category(), &ClioErrorCategory::ServerUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn retry_after_hint_overrides_category_default() {
        let err = ClioError::from_status_code(StatusCode::TOO_MANY_REQUESTS).with_retry_after(7);
        assert_eq!(err.retry_delay_secs(), Some(7));
        assert_eq!(err.retry_after_hint(), Some(7));

        let bare = ClioError::from_status_code(StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(bare.retry_delay_secs(), Some(120));
        assert_eq!(bare.retry_after_hint(), None);
    }

    #[test]
    fn error_with_context_includes_details() {
        let err = ClioError::new(ClioErrorCategory::Validation, "Bad bill payload")
            .with_context("state must be one of draft, awaiting_approval");

        assert!(err.user_message().contains("Details:"));
        assert!(err.user_message().contains("awaiting_approval"));
    }

    #[test]
    fn converts_to_domain_error() {
        let clio_err = ClioError::new(ClioErrorCategory::Authentication, "Token expired");
        let domain_err: LexFlowError = clio_err.into();

        match domain_err {
            LexFlowError::Auth(msg) => {
                assert!(msg.contains("Authentication failed"));
            }
            _ => panic!("Expected Auth error variant"),
        }

        let conflict: LexFlowError =
            ClioError::from_status_code(StatusCode::CONFLICT).into_domain_error();
        assert!(matches!(conflict, LexFlowError::Conflict(_)));

        let rate: LexFlowError =
            ClioError::from_status_code(StatusCode::TOO_MANY_REQUESTS).into_domain_error();
        assert!(matches!(rate, LexFlowError::RateLimit(_)));

        let server: LexFlowError =
            ClioError::from_status_code(StatusCode::BAD_GATEWAY).into_domain_error();
        assert!(matches!(server, LexFlowError::Server(_)));
    }
}
