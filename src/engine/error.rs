use thiserror::Error;
use ulid::Ulid;

use crate::validate::FieldErrors;

/// Why a candidate was not admitted. The first failing rule wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Start time must be before end time")]
    InvalidInterval,
    #[error("Reservation cannot start in the past")]
    PastStart,
    /// Carries the id of the reservation that already holds the slot.
    #[error("Reservation overlaps with an existing one")]
    Overlap(Ulid),
}

impl Rejection {
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::InvalidInterval => "invalid_interval",
            Rejection::PastStart => "past_start",
            Rejection::Overlap(_) => "overlap",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Reservation not found")]
pub struct NotFound(pub Ulid);

/// Outcome of validate-then-admit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReserveError {
    #[error("{0}")]
    Invalid(#[from] FieldErrors),
    #[error("{0}")]
    Rejected(#[from] Rejection),
}
