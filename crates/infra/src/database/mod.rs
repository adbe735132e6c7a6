//! Database implementations

pub mod activity_repository;
pub mod bill_repository;
pub mod contact_repository;
pub mod manager;
pub mod matter_repository;
pub mod settings_repository;
pub mod sync_run_repository;
pub mod user_repository;

pub use activity_repository::*;
pub use bill_repository::*;
pub use contact_repository::*;
pub use manager::*;
pub use matter_repository::*;
pub use settings_repository::*;
pub use sync_run_repository::*;
pub use user_repository::*;
