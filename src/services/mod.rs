pub mod cache;
pub mod classifier;
pub mod denormalize;
pub mod identity;
pub mod insights;
pub mod scheduler;
pub mod sync_service;

pub use scheduler::SyncScheduler;
pub use sync_service::{SyncReport, SyncService, SyncStats};
