//! Clio API client
//!
//! Wraps reqwest with the behavior every Clio call needs: request pacing,
//! bearer auth with proactive and reactive token refresh, bounded retries
//! with exponential backoff, Retry-After handling, and cursor pagination.
//! Typed operations cover bills, line items, activities, contacts, matters
//! and users.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lexflow_domain::constants::{
    DEFAULT_MAX_REQUESTS_PER_SECOND, DEFAULT_MAX_RETRIES, DEFAULT_REQUEST_TIMEOUT_SECS,
};
use lexflow_domain::{
    ActivityUpdate, BillListFilter, BillState, ClioActivity, ClioBill, ClioConfig, ClioContact,
    ClioLineItem, ClioMatter, ClioUser, LexFlowError, Result,
};
use lexflow_core::BillingRemote;
use reqwest::header::{ACCEPT, AUTHORIZATION, IF_MATCH, RETRY_AFTER};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};
use url::Url;

use super::auth::TokenManager;
use super::errors::ClioError;
use super::throttle::RequestPacer;
use super::types::{ListEnvelope, RecordEnvelope};

const DEFAULT_BASE_BACKOFF: Duration = Duration::from_millis(200);

/// Clio API client with pacing, auth and retry built in
pub struct ClioClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: Arc<TokenManager>,
    pacer: RequestPacer,
    max_retries: u32,
    base_backoff: Duration,
}

impl ClioClient {
    /// Start building a new client.
    pub fn builder() -> ClioClientBuilder {
        ClioClientBuilder::default()
    }

    /// Convenience constructor from the Clio configuration.
    pub fn new(config: &ClioConfig, tokens: Arc<TokenManager>) -> Result<Self> {
        Self::builder()
            .base_url(&config.base_url)
            .max_requests_per_second(config.max_requests_per_second)
            .max_retries(config.max_retries)
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build(tokens)
    }

    // ========================================================================
    // Users
    // ========================================================================

    /// List firm users without pagination gaps
    pub async fn list_all_users(&self) -> Result<Vec<ClioUser>> {
        Ok(self.get_all_pages(self.endpoint("users")?).await?)
    }

    // ========================================================================
    // Contacts
    // ========================================================================

    pub async fn list_contacts(&self) -> Result<Vec<ClioContact>> {
        Ok(self.get_all_pages(self.endpoint("contacts")?).await?)
    }

    // ========================================================================
    // Matters
    // ========================================================================

    pub async fn list_matters(&self) -> Result<Vec<ClioMatter>> {
        Ok(self.get_all_pages(self.endpoint("matters")?).await?)
    }

    // ========================================================================
    // Bills
    // ========================================================================

    /// Move a bill to a new state
    ///
    /// The caller supplies the etag from the last read; Clio rejects the
    /// write with a conflict when the bill changed since.
    pub async fn update_bill_state(
        &self,
        id: i64,
        state: BillState,
        etag: &str,
    ) -> Result<ClioBill> {
        let url = self.endpoint(&format!("bills/{id}"))?;
        let body = serde_json::json!({ "data": { "state": state.to_string() } });
        let response = self.execute(Method::PATCH, url, Some(&body), Some(etag)).await?;
        Ok(parse_record::<ClioBill>(response).await?)
    }

    /// Void a bill, removing it from the payable workflow
    pub async fn void_bill(&self, id: i64, etag: &str) -> Result<ClioBill> {
        self.update_bill_state(id, BillState::Void, etag).await
    }

    /// Delete a bill outright
    pub async fn delete_bill(&self, id: i64, etag: &str) -> Result<()> {
        let url = self.endpoint(&format!("bills/{id}"))?;
        self.execute(Method::DELETE, url, None, Some(etag)).await?;
        Ok(())
    }

    pub async fn get_line_item(&self, id: i64) -> Result<ClioLineItem> {
        Ok(self.get_record(&format!("line_items/{id}")).await?)
    }

    // ========================================================================
    // Activities
    // ========================================================================

    pub async fn get_activity(&self, id: i64) -> Result<ClioActivity> {
        Ok(self.get_record(&format!("activities/{id}")).await?)
    }

    pub async fn list_activities(&self) -> Result<Vec<ClioActivity>> {
        Ok(self.get_all_pages(self.endpoint("activities")?).await?)
    }

    /// Apply an edit to a time or expense entry
    pub async fn update_activity(
        &self,
        id: i64,
        update: &ActivityUpdate,
        etag: &str,
    ) -> Result<ClioActivity> {
        let url = self.endpoint(&format!("activities/{id}"))?;
        let body = serde_json::json!({ "data": update });
        let response = self.execute(Method::PATCH, url, Some(&body), Some(etag)).await?;
        Ok(parse_record::<ClioActivity>(response).await?)
    }

    pub async fn delete_activity(&self, id: i64, etag: &str) -> Result<()> {
        let url = self.endpoint(&format!("activities/{id}"))?;
        self.execute(Method::DELETE, url, None, Some(etag)).await?;
        Ok(())
    }

    // ========================================================================
    // Request plumbing
    // ========================================================================

    /// Resolve a relative API path against the base URL
    fn endpoint(&self, path: &str) -> std::result::Result<Url, ClioError> {
        self.base_url
            .join(path)
            .map_err(|e| ClioError::unknown(format!("invalid endpoint path {path:?}: {e}")))
    }

    /// Fetch one record envelope
    async fn get_record<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> std::result::Result<T, ClioError> {
        let url = self.endpoint(path)?;
        let response = self.execute(Method::GET, url, None, None).await?;
        parse_record(response).await
    }

    /// Walk every page of a list endpoint, preserving server order
    ///
    /// Pages are fetched eagerly until `meta.paging.next` disappears. Each
    /// page fetch goes through the full paced and retried request path.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        first_url: Url,
    ) -> std::result::Result<Vec<T>, ClioError> {
        let mut all = Vec::new();
        let mut next_url = Some(first_url);

        while let Some(url) = next_url {
            let response = self.execute(Method::GET, url, None, None).await?;
            let envelope: ListEnvelope<T> = parse_json(response).await?;

            next_url = match envelope.next_page_url() {
                Some(next) => Some(Url::parse(next).map_err(|e| {
                    ClioError::unknown(format!("invalid next page URL from Clio: {e}"))
                })?),
                None => None,
            };
            all.extend(envelope.data);
        }

        debug!(count = all.len(), "Completed paginated fetch");
        Ok(all)
    }

    /// Execute one logical request with pacing, auth and bounded retries
    ///
    /// One shared attempt budget covers every failure class: a 401 consumes
    /// an attempt and forces a token refresh before the retry; 429 honors
    /// the server's Retry-After hint when present; 5xx and network failures
    /// back off exponentially. Remaining 4xx responses fail immediately
    /// with the response body captured.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        if_match: Option<&str>,
    ) -> std::result::Result<Response, ClioError> {
        let max_attempts = self.max_retries.saturating_add(1);

        for attempt in 1..=max_attempts {
            self.pacer.wait().await;

            // Refreshes proactively when near expiry; fails fast when the
            // client holds no tokens at all
            let token = self.tokens.get_access_token().await?;

            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(AUTHORIZATION, format!("Bearer {token}"))
                .header(ACCEPT, "application/json");
            if let Some(etag) = if_match {
                request = request.header(IF_MATCH, etag);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(attempt, %method, %url, "Sending Clio request");

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    debug!(attempt, status = status.as_u16(), "Received Clio response");

                    if status.is_success() {
                        return Ok(response);
                    }

                    let error = classify_response(status, response).await;

                    if status == StatusCode::UNAUTHORIZED && attempt < max_attempts {
                        warn!(attempt, "Clio returned 401, refreshing token before retry");
                        self.tokens.refresh_tokens().await?;
                        continue;
                    }

                    if error.is_retryable() && attempt < max_attempts {
                        let delay = error
                            .retry_after_hint()
                            .map_or_else(|| self.backoff_delay(attempt), Duration::from_secs);
                        debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            status = status.as_u16(),
                            "Retrying Clio request"
                        );
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }

                    return Err(error);
                }
                Err(err) => {
                    debug!(attempt, %method, %url, error = %err, "Clio request failed");
                    let error = ClioError::from(err);

                    if error.is_retryable() && attempt < max_attempts {
                        let delay = self.backoff_delay(attempt);
                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        continue;
                    }

                    return Err(error);
                }
            }
        }

        Err(ClioError::unknown("request retries exhausted without producing a result"))
    }

    fn backoff_delay(&self, retry_number: u32) -> Duration {
        let shift = retry_number.saturating_sub(1).min(8);
        let multiplier = 1u32 << shift;
        self.base_backoff.saturating_mul(multiplier)
    }
}

#[async_trait]
impl BillingRemote for ClioClient {
    async fn who_am_i(&self) -> Result<ClioUser> {
        Ok(self.get_record("users/who_am_i").await?)
    }

    async fn get_user(&self, id: i64) -> Result<ClioUser> {
        Ok(self.get_record(&format!("users/{id}")).await?)
    }

    async fn list_users(&self) -> Result<Vec<ClioUser>> {
        self.list_all_users().await
    }

    async fn get_contact(&self, id: i64) -> Result<ClioContact> {
        Ok(self.get_record(&format!("contacts/{id}")).await?)
    }

    async fn get_matter(&self, id: i64) -> Result<ClioMatter> {
        Ok(self.get_record(&format!("matters/{id}")).await?)
    }

    async fn get_bill(&self, id: i64) -> Result<ClioBill> {
        Ok(self.get_record(&format!("bills/{id}")).await?)
    }

    async fn list_bills(&self, filter: &BillListFilter) -> Result<Vec<ClioBill>> {
        let mut url = self.endpoint("bills").map_err(LexFlowError::from)?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(state) = &filter.state {
                query.append_pair("state", &state.to_string());
            }
            if let Some(client_id) = filter.client_id {
                query.append_pair("client_id", &client_id.to_string());
            }
            if let Some(matter_id) = filter.matter_id {
                query.append_pair("matter_id", &matter_id.to_string());
            }
            if let Some(updated_since) = &filter.updated_since {
                query.append_pair("updated_since", &updated_since.to_rfc3339());
            }
        }
        Ok(self.get_all_pages(url).await?)
    }

    async fn list_bill_line_items(&self, bill_id: i64) -> Result<Vec<ClioLineItem>> {
        let mut url = self.endpoint("line_items").map_err(LexFlowError::from)?;
        url.query_pairs_mut().append_pair("bill_id", &bill_id.to_string());
        Ok(self.get_all_pages(url).await?)
    }
}

/// Builder for [`ClioClient`].
#[derive(Debug)]
pub struct ClioClientBuilder {
    base_url: String,
    max_requests_per_second: u32,
    max_retries: u32,
    timeout: Duration,
    base_backoff: Duration,
}

impl Default for ClioClientBuilder {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            max_requests_per_second: DEFAULT_MAX_REQUESTS_PER_SECOND,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }
}

impl ClioClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn max_requests_per_second(mut self, rps: u32) -> Self {
        self.max_requests_per_second = rps;
        self
    }

    /// Configure the number of retries after the initial attempt.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    pub fn build(self, tokens: Arc<TokenManager>) -> Result<ClioClient> {
        // A trailing slash makes Url::join append instead of replacing the
        // last path segment
        let mut base = self.base_url;
        if base.is_empty() {
            return Err(LexFlowError::Config("Clio base URL is required".into()));
        }
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| LexFlowError::Config(format!("invalid Clio base URL: {e}")))?;

        let pacer = RequestPacer::new(self.max_requests_per_second)?;

        let http = reqwest::Client::builder()
            .timeout(self.timeout)
            .no_proxy()
            .build()
            .map_err(|e| LexFlowError::Config(format!("failed to build HTTP client: {e}")))?;

        info!(
            base_url = %base_url,
            rps = self.max_requests_per_second,
            max_retries = self.max_retries,
            "Clio client initialised"
        );

        Ok(ClioClient {
            http,
            base_url,
            tokens,
            pacer,
            max_retries: self.max_retries,
            base_backoff: self.base_backoff,
        })
    }
}

/// Turn a non-success response into a classified error
///
/// Reads the Retry-After hint before consuming the body, and attaches the
/// body as context so terminal failures carry what the server said.
async fn classify_response(status: StatusCode, response: Response) -> ClioError {
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok());

    let body = response.text().await.unwrap_or_default();

    let mut error = ClioError::from_status_code(status);
    if !body.is_empty() {
        error = error.with_context(body);
    }
    if let Some(seconds) = retry_after {
        error = error.with_retry_after(seconds);
    }
    error
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> std::result::Result<T, ClioError> {
    response.json::<T>().await.map_err(|e| {
        ClioError::unknown("failed to parse Clio response").with_context(e.to_string())
    })
}

async fn parse_record<T: DeserializeOwned>(
    response: Response,
) -> std::result::Result<T, ClioError> {
    Ok(parse_json::<RecordEnvelope<T>>(response).await?.data)
}
