//! Domain types and models

pub mod billing;
pub mod clio;
pub mod report;

// Re-export local record types for convenience
pub use billing::{
    Activity, Bill, BillState, Contact, Matter, SyncRun, SyncRunKind, SyncRunStatus, UserProfile,
};
// Re-export remote payload types
pub use clio::{
    ActivityUpdate, BillListFilter, ClioActivity, ClioBill, ClioContact, ClioLineItem, ClioMatter,
    ClioReference, ClioUser,
};
// Re-export reconciliation reporting types
pub use report::{PassOutcome, PollStatus, SyncFailure, SyncReport};
