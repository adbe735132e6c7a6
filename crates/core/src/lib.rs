//! # LexFlow Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits)
//! - The sync reconciliation service
//!
//! ## Architecture Principles
//! - Only depends on `lexflow-domain`
//! - No database or HTTP code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod clio_ports;
pub mod sync;

// Re-export specific items to avoid ambiguity
pub use clio_ports::BillingRemote;
pub use sync::ports::{
    ActivityStore, BillStore, ContactStore, MatterStore, SettingsStore, SyncRunStore, UserStore,
};
pub use sync::reconciler::{RecordChange, SyncReconciler, SyncStores};
