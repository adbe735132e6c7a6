//! Sync reconciliation service and its persistence ports

pub mod ports;
pub mod reconciler;

pub use reconciler::{RecordChange, SyncReconciler, SyncStores};
