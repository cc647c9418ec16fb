//! Borrowing domain module (one-unit loan records).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod record;

pub use record::{BorrowStatus, BorrowingId, BorrowingRecord};
