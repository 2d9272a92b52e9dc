//! Structured outcomes of engine operations.

use thiserror::Error;

use parkhub_core::error::{AppError, ErrorKind};
use parkhub_core::types::id::{ReservationId, SpotId};

/// Every way an allocator, lifecycle, capacity or user operation can fail.
///
/// All of them leave the Entity Store untouched: the transaction of the
/// failing operation is rolled back.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed or missing input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Fewer available spots than requested. Nothing was booked.
    #[error("Insufficient capacity: requested {requested}, available {available}")]
    InsufficientCapacity {
        /// Spots asked for.
        requested: i64,
        /// Spots that were available.
        available: i64,
    },

    /// A shrink or delete would destroy an occupied spot.
    #[error("Capacity conflict: spot {spot_number} is occupied")]
    CapacityConflict {
        /// Number of the first occupied spot in the way.
        spot_number: i32,
    },

    /// Missing entity, or a reservation not owned by the caller or no
    /// longer active.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Park was already confirmed for this reservation.
    #[error("Reservation {0} is already parked")]
    AlreadyParked(ReservationId),

    /// Lost the race for a spot. Only seen inside the allocator.
    #[error("Spot {0} was claimed concurrently")]
    ConcurrencyConflict(SpotId),

    /// The principal lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Infrastructure failure.
    #[error(transparent)]
    Store(#[from] AppError),
}

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// The [`ErrorKind`] a transport layer should report.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InsufficientCapacity { .. }
            | Self::CapacityConflict { .. }
            | Self::AlreadyParked(_)
            | Self::ConcurrencyConflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Forbidden(_) => ErrorKind::Authorization,
            Self::Store(e) => e.kind,
        }
    }

    pub(crate) fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
