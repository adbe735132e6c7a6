//! Clio OAuth token lifecycle
//!
//! Manages bearer tokens for the Clio API:
//! - Authorization code exchange and refresh token grants
//! - Auto-refresh before expiry (configurable threshold, default 5 min)
//! - Listener notification so callers can persist fresh tokens
//! - Thread-safe access to the current token set

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lexflow_domain::constants::TOKEN_REFRESH_THRESHOLD_SECS;
use lexflow_domain::{ClioConfig, LexFlowError};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use url::Url;

use super::errors::{ClioError, ClioErrorCategory};

/// OAuth 2.0 access and refresh tokens with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API authentication
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (always "bearer" for the Clio API)
    pub token_type: String,

    /// Access token lifetime in seconds
    pub expires_in: i64,

    /// Absolute expiration timestamp (UTC)
    /// Calculated from expires_in at token creation/retrieval time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// Granted scopes (space-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl TokenSet {
    /// Create a new `TokenSet` with calculated expiration time
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at = if expires_in > 0 {
            Some(Utc::now() + chrono::Duration::seconds(expires_in))
        } else {
            None
        };

        Self {
            access_token,
            refresh_token,
            token_type: "bearer".to_string(),
            expires_in,
            expires_at,
            scope: None,
        }
    }

    /// Check if the access token is expired or will expire within the given
    /// threshold
    ///
    /// Returns `true` if the token is expired or will expire within the
    /// threshold, `false` if it's still valid beyond the threshold or if no
    /// expiry is set.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let threshold = chrono::Duration::seconds(threshold_seconds);
                Utc::now() + threshold >= expires_at
            }
            None => false,
        }
    }

    /// Get seconds until token expiration
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }

    /// Update expiration timestamp based on current time and expires_in
    ///
    /// Useful when retrieving tokens from storage to recalculate expires_at
    pub fn refresh_expiry_timestamp(&mut self) {
        if self.expires_in > 0 {
            self.expires_at = Some(Utc::now() + chrono::Duration::seconds(self.expires_in));
        }
    }
}

/// OAuth token response from the Clio authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749).
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub token_type: String,
    pub expires_in: i64,
    pub scope: Option<String>,
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        let mut tokens =
            TokenSet::new(response.access_token, response.refresh_token, response.expires_in);
        tokens.token_type = response.token_type;
        tokens.scope = response.scope;
        tokens
    }
}

/// Receives every token update so the caller can persist it
///
/// Invoked after each successful grant (code exchange or refresh). A
/// listener failure fails the grant, since in-memory tokens must never
/// diverge from what the caller stored.
#[async_trait]
pub trait TokenUpdateListener: Send + Sync {
    async fn on_tokens_updated(&self, tokens: &TokenSet) -> Result<(), LexFlowError>;
}

/// Listener that discards token updates, for callers with nothing to persist
pub struct NoopTokenListener;

#[async_trait]
impl TokenUpdateListener for NoopTokenListener {
    async fn on_tokens_updated(&self, _tokens: &TokenSet) -> Result<(), LexFlowError> {
        Ok(())
    }
}

/// Token manager with auto-refresh
///
/// Manages the full token lifecycle:
/// 1. Exchanges authorization codes and refresh tokens against the token URL
/// 2. Automatically refreshes tokens before expiry
/// 3. Notifies the listener so fresh tokens can be persisted
/// 4. Provides thread-safe access to current tokens
pub struct TokenManager {
    http: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: Option<String>,
    listener: Arc<dyn TokenUpdateListener>,
    current_tokens: Arc<RwLock<Option<TokenSet>>>,
    refresh_lock: Mutex<()>,
    refresh_threshold_seconds: i64,
}

impl TokenManager {
    /// Create a new token manager from the Clio configuration
    ///
    /// # Errors
    /// Returns a configuration error if the token URL is invalid or the
    /// HTTP client cannot be constructed.
    pub fn new(
        config: &ClioConfig,
        listener: Arc<dyn TokenUpdateListener>,
    ) -> Result<Self, LexFlowError> {
        let token_url = Url::parse(&config.token_url)
            .map_err(|e| LexFlowError::Config(format!("invalid token URL: {e}")))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .no_proxy()
            .build()
            .map_err(|e| LexFlowError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            listener,
            current_tokens: Arc::new(RwLock::new(None)),
            refresh_lock: Mutex::new(()),
            refresh_threshold_seconds: TOKEN_REFRESH_THRESHOLD_SECS,
        })
    }

    /// Load previously persisted tokens into memory
    ///
    /// Should be called on startup with whatever the listener last stored.
    /// Does not notify the listener.
    pub async fn seed_tokens(&self, mut tokens: TokenSet) {
        if tokens.expires_at.is_none() {
            tokens.refresh_expiry_timestamp();
        }
        *self.current_tokens.write().await = Some(tokens);
        debug!("Token manager seeded with stored tokens");
    }

    /// Store new tokens and notify the listener
    pub async fn store_tokens(&self, tokens: TokenSet) -> Result<(), ClioError> {
        self.listener.on_tokens_updated(&tokens).await.map_err(|e| {
            ClioError::new(ClioErrorCategory::Unknown, "token listener failed")
                .with_context(e.to_string())
        })?;

        *self.current_tokens.write().await = Some(tokens);
        info!("Tokens stored successfully");
        Ok(())
    }

    /// Get current access token, refreshing first when near expiry
    ///
    /// This is the primary method for retrieving access tokens.
    ///
    /// # Errors
    /// Returns an authentication error if no tokens are loaded or the
    /// refresh fails.
    pub async fn get_access_token(&self) -> Result<String, ClioError> {
        self.refresh_if_needed().await?;

        let tokens = self.current_tokens.read().await;
        tokens.as_ref().map(|t| t.access_token.clone()).ok_or_else(not_authenticated)
    }

    /// Get current token set (without auto-refresh)
    pub async fn get_tokens(&self) -> Option<TokenSet> {
        self.current_tokens.read().await.clone()
    }

    /// Check if tokens are loaded
    pub async fn is_authenticated(&self) -> bool {
        self.current_tokens.read().await.is_some()
    }

    /// Exchange an authorization code for a token set
    ///
    /// Used once at sign-in, after the user authorizes the app in Clio.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<(), ClioError> {
        let mut params = vec![
            ("grant_type", "authorization_code".to_string()),
            ("code", code.to_string()),
            ("redirect_uri", redirect_uri.to_string()),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let tokens = self.request_tokens(&params).await?;
        self.store_tokens(tokens).await?;

        info!("Authorization code exchanged for tokens");
        Ok(())
    }

    /// Refresh the access token using the stored refresh token
    ///
    /// Called reactively after a 401 and proactively near expiry.
    pub async fn refresh_tokens(&self) -> Result<(), ClioError> {
        let _guard = self.refresh_lock.lock().await;
        self.do_refresh().await
    }

    /// Seconds until the current token expires, if known
    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        let tokens = self.current_tokens.read().await;
        tokens.as_ref().and_then(|t| t.seconds_until_expiry())
    }

    /// Refresh proactively when the token is within the expiry threshold
    ///
    /// Checks again under the refresh lock so concurrent callers trigger at
    /// most one grant.
    async fn refresh_if_needed(&self) -> Result<(), ClioError> {
        if !self.should_refresh().await {
            return Ok(());
        }

        let _guard = self.refresh_lock.lock().await;
        if !self.should_refresh().await {
            return Ok(());
        }
        self.do_refresh().await
    }

    async fn should_refresh(&self) -> bool {
        let tokens = self.current_tokens.read().await;
        match tokens.as_ref() {
            Some(t) => t.is_expired(self.refresh_threshold_seconds),
            None => false,
        }
    }

    /// Execute the refresh grant. Caller must hold `refresh_lock`.
    async fn do_refresh(&self) -> Result<(), ClioError> {
        let refresh_token = {
            let tokens = self.current_tokens.read().await;
            match tokens.as_ref() {
                Some(t) => t.refresh_token.clone().ok_or_else(|| {
                    ClioError::new(
                        ClioErrorCategory::Authentication,
                        "no refresh token available",
                    )
                })?,
                None => return Err(not_authenticated()),
            }
        };

        let mut params = vec![
            ("grant_type", "refresh_token".to_string()),
            ("refresh_token", refresh_token.clone()),
            ("client_id", self.client_id.clone()),
        ];
        if let Some(secret) = &self.client_secret {
            params.push(("client_secret", secret.clone()));
        }

        let mut tokens = self.request_tokens(&params).await?;

        // Clio may omit the refresh token on refresh grants; keep the old one
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token);
        }

        self.store_tokens(tokens).await?;
        info!("Successfully refreshed access token");
        Ok(())
    }

    /// POST the grant parameters to the token URL and parse the response
    async fn request_tokens(&self, params: &[(&str, String)]) -> Result<TokenSet, ClioError> {
        let response = self.http.post(self.token_url.clone()).form(params).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token grant rejected");
            return Err(ClioError::new(
                ClioErrorCategory::Authentication,
                format!("token grant failed: HTTP {}", status.as_u16()),
            )
            .with_context(body));
        }

        let token_response: TokenResponse = response.json().await.map_err(|e| {
            ClioError::unknown("failed to parse token response").with_context(e.to_string())
        })?;

        Ok(token_response.into())
    }
}

fn not_authenticated() -> ClioError {
    ClioError::new(ClioErrorCategory::Authentication, "not authenticated (no tokens)")
}
