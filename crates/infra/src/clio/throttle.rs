//! Request pacing for the Clio API
//!
//! Clio enforces a fixed request budget per token, so every outgoing call
//! shares one pacer per client instance. The pacer spreads requests at a
//! minimum interval rather than allowing bursts, which keeps a long
//! pagination walk inside the budget.

use std::time::Duration;

use lexflow_domain::LexFlowError;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Paces requests to a fixed minimum interval
///
/// Callers serialize on an internal lock, so concurrent requests leave the
/// pacer one interval apart.
pub struct RequestPacer {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RequestPacer {
    /// Create a pacer from a requests-per-second budget
    ///
    /// # Errors
    /// Returns a configuration error when the budget is zero.
    pub fn new(max_requests_per_second: u32) -> Result<Self, LexFlowError> {
        if max_requests_per_second == 0 {
            return Err(LexFlowError::Config(
                "max_requests_per_second must be greater than 0".into(),
            ));
        }

        let min_interval = Duration::from_millis(1000 / u64::from(max_requests_per_second));
        Ok(Self { min_interval, last_request: Mutex::new(None) })
    }

    /// The enforced gap between consecutive requests
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until the next request slot is available
    ///
    /// The first call returns immediately; each later call sleeps out the
    /// remainder of the interval since the previous slot.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(wait_ms = remaining.as_millis() as u64, "Pacing Clio request");
                tokio::time::sleep(remaining).await;
            }
        }

        *last = Some(Instant::now());
    }
}
