//! Background poll scheduler for periodic reconciliation passes
//!
//! Wraps the reconciler in a Tokio background task that runs one pass
//! immediately on start and then repeats on a fixed timer. The interval
//! comes from persisted settings and is read once when the scheduler
//! starts, so interval changes take effect on the next restart.
//!
//! # Lifecycle
//!
//! The scheduler moves between stopped and running. Starting an already
//! running scheduler is a no-op; stopping a stopped one is an error.
//! Manual passes can be triggered at any time and run outside the timer
//! cadence.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use lexflow_core::{SettingsStore, SyncReconciler};
use lexflow_domain::{PassOutcome, PollStatus, Result as DomainResult};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Shared state the poll loop and manual triggers both operate on
struct PollLoopContext {
    reconciler: Arc<SyncReconciler>,
    settings: Arc<dyn SettingsStore>,
    last_pass: Arc<Mutex<Option<PassOutcome>>>,
}

/// Periodic reconciliation scheduler
///
/// Runs bill passes on a repeating timer and keeps a snapshot of the most
/// recently completed pass for status queries.
pub struct PollScheduler {
    reconciler: Arc<SyncReconciler>,
    settings: Arc<dyn SettingsStore>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
    last_pass: Arc<Mutex<Option<PassOutcome>>>,
}

impl PollScheduler {
    /// Create a new poll scheduler
    ///
    /// # Arguments
    ///
    /// * `reconciler` - Reconciler that executes the passes
    /// * `settings` - Settings store the poll interval is read from
    pub fn new(reconciler: Arc<SyncReconciler>, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            reconciler,
            settings,
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
            last_pass: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Runs one pass immediately, then repeats at the configured interval.
    /// Calling start while the scheduler is already running logs and does
    /// nothing; the running timer is left untouched.
    ///
    /// # Errors
    ///
    /// Returns error if the poll interval cannot be read from settings
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            info!("Poll scheduler already running; start request ignored");
            return Ok(());
        }

        let interval_minutes = self
            .settings
            .poll_interval_minutes()
            .await
            .map_err(|e| SchedulerError::StartFailed(e.to_string()))?;
        let interval = Duration::from_secs(u64::from(interval_minutes) * 60);

        info!(interval_minutes, "Starting poll scheduler");

        // Create a new cancellation token (supports restart after stop)
        self.cancellation_token = CancellationToken::new();

        let context = self.loop_context();
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::poll_loop(context, interval, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Poll scheduler started");
        Ok(())
    }

    /// Stop the scheduler
    ///
    /// Cancels the background task and waits up to five seconds for it to
    /// finish the pass it may be in the middle of.
    ///
    /// # Errors
    ///
    /// Returns error if scheduler is not running
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping poll scheduler");

        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => debug!("Poll task completed cleanly"),
                Ok(Err(e)) => return Err(SchedulerError::TaskJoinFailed(e.to_string())),
                Err(_) => return Err(SchedulerError::Timeout { seconds: 5 }),
            }
        }

        info!("Poll scheduler stopped");
        Ok(())
    }

    /// Run a single pass immediately, outside the repeating timer
    ///
    /// Works whether or not the scheduler is running, and never disturbs
    /// the timer cadence. The outcome is returned to the caller and also
    /// recorded as the latest pass.
    pub async fn trigger_now(&self) -> DomainResult<PassOutcome> {
        info!("Manual reconciliation pass requested");
        Self::run_pass(&self.loop_context()).await
    }

    /// Snapshot of the scheduler state and the most recent pass
    pub async fn status(&self) -> PollStatus {
        PollStatus { active: self.is_running(), last_pass: self.last_pass.lock().await.clone() }
    }

    /// Check if the scheduler is currently running
    ///
    /// A scheduler is considered running if it has an active task handle
    /// that hasn't finished.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    fn loop_context(&self) -> PollLoopContext {
        PollLoopContext {
            reconciler: Arc::clone(&self.reconciler),
            settings: Arc::clone(&self.settings),
            last_pass: Arc::clone(&self.last_pass),
        }
    }

    /// Main polling loop
    async fn poll_loop(context: PollLoopContext, interval: Duration, cancel: CancellationToken) {
        // First pass fires immediately; the timer only paces the repeats.
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Poll loop cancelled before first pass");
                return;
            }
            _ = Self::run_and_log(&context) => {}
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Poll loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    Self::run_and_log(&context).await;
                }
            }
        }
    }

    async fn run_and_log(context: &PollLoopContext) {
        match Self::run_pass(context).await {
            Ok(outcome) => {
                debug!(
                    processed = outcome.report.records_processed,
                    created = outcome.report.records_created,
                    "Scheduled pass completed"
                );
            }
            Err(e) => {
                error!(error = %e, "Scheduled pass failed");
            }
        }
    }

    /// Execute one reconciliation pass and record its outcome
    async fn run_pass(context: &PollLoopContext) -> DomainResult<PassOutcome> {
        let report = context.reconciler.run_bill_pass().await?;

        let outcome = PassOutcome {
            new_bills: report.records_created,
            completed_at: Utc::now().timestamp(),
            report,
        };

        if outcome.new_bills > 0 {
            match context.settings.auto_notify().await {
                Ok(true) => {
                    info!(new_bills = outcome.new_bills, "New bills are waiting for review");
                }
                Ok(false) => {}
                Err(e) => warn!(error = %e, "Could not read the auto-notify setting"),
            }
        }

        *context.last_pass.lock().await = Some(outcome.clone());
        Ok(outcome)
    }
}

/// Ensure scheduler is stopped when dropped
impl Drop for PollScheduler {
    fn drop(&mut self) {
        // Note: Can't check task_handle (async), so check if token is not cancelled
        // This is best-effort cleanup in Drop
        if !self.cancellation_token.is_cancelled() {
            warn!("PollScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
