//! Disposal domain module (permanent quantity reduction).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod gate;
pub mod transaction;

pub use gate::DisposalGate;
pub use transaction::{DisposalId, DisposalStatus, DisposalTransaction};
