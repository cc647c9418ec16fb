//! Maintenance domain module (partial-completion tracking).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod task;

pub use task::{MaintenanceProgress, MaintenanceTask, MaintenanceTaskId, TaskStatus};
