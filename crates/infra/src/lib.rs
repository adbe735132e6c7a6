//! # LexFlow Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Database implementations (SQLite repositories)
//! - Clio API client (auth, throttling, retries, pagination)
//! - Poll scheduler for periodic reconciliation
//! - Configuration loading
//!
//! ## Architecture
//! - Implements traits defined in `lexflow-core`
//! - Depends on `lexflow-domain` and `lexflow-core`
//! - Contains all "impure" code (I/O, external services)

pub mod clio;
pub mod config;
pub mod database;
pub mod errors;
pub mod scheduling;

// Re-export commonly used items
pub use clio::*;
pub use config::*;
pub use database::*;
pub use errors::*;
pub use scheduling::*;
