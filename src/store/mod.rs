//! In-memory user store.
//!
//! # Data Flow
//! ```text
//! handler
//!     → UserStore operation (own span + nested diagnostic fields)
//!     → DashMap<u64, UserRecord> / AtomicU64 id counter
//!     → clone of the record(s) returned to the handler
//! ```
//!
//! # Design Decisions
//! - The map and the counter are the only shared mutable state
//! - Ids are allocated right before the insert, after the processing delay,
//!   so allocation order equals insertion order
//! - No map guard is held across an `.await`

pub mod memory;
pub mod record;

use thiserror::Error;

pub use memory::UserStore;
pub use record::{NewUser, UserRecord};

/// Errors raised by store operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Deliberate failure used to exercise the error path end to end.
    #[error("This is a simulated error")]
    Simulated,

    /// The id counter reached `u64::MAX`.
    #[error("User id space exhausted")]
    IdSpaceExhausted,
}

impl StoreError {
    /// Short name recorded on spans.
    pub const fn kind(&self) -> &'static str {
        match self {
            StoreError::Simulated => "SimulatedError",
            StoreError::IdSpaceExhausted => "IdSpaceExhausted",
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(StoreError::Simulated.to_string(), "This is a simulated error");
        assert_eq!(StoreError::Simulated.kind(), "SimulatedError");
    }
}
