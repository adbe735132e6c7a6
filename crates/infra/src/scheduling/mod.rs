//! Scheduling infrastructure for background reconciliation
//!
//! Provides the poll scheduler that keeps the local store current:
//! explicit lifecycle management (start/stop), a join handle for the
//! spawned task, cancellation token support, and timeout wrapping on
//! shutdown.

pub mod error;
pub mod poll_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use poll_scheduler::PollScheduler;
