use serde_json::Value;
use tracing::debug;
use ulid::Ulid;

use crate::model::*;
use crate::observability::{ADMISSIONS_TOTAL, CANCELLATIONS_TOTAL, RESERVATIONS_ACTIVE};
use crate::validate::validate_reservation;

use super::conflict::{check_interval, check_no_overlap, now_ms};
use super::{Engine, NotFound, Rejection, ReserveError};

impl Engine {
    /// Admit a candidate against the current wall clock.
    pub async fn admit(&self, candidate: Candidate) -> Result<Reservation, Rejection> {
        self.admit_at(candidate, now_ms()).await
    }

    /// Admit a candidate with `now` fixed by the caller.
    ///
    /// Rules run in order: ordering, no past start, no overlap. The overlap
    /// check and the insert happen under one write lock on the room.
    pub async fn admit_at(&self, candidate: Candidate, now: Ms) -> Result<Reservation, Rejection> {
        let result = self.try_admit(candidate, now).await;
        match &result {
            Ok(r) => {
                metrics::counter!(ADMISSIONS_TOTAL, "outcome" => "admitted").increment(1);
                metrics::gauge!(RESERVATIONS_ACTIVE).increment(1.0);
                debug!(id = %r.id, room = %r.room_id, "reservation admitted");
            }
            Err(rejection) => {
                metrics::counter!(ADMISSIONS_TOTAL, "outcome" => rejection.label()).increment(1);
                debug!(reason = rejection.label(), "reservation rejected");
            }
        }
        result
    }

    async fn try_admit(&self, candidate: Candidate, now: Ms) -> Result<Reservation, Rejection> {
        let span = check_interval(&candidate, now)?;

        let rs = self.room_or_insert(&candidate.room_id);
        let mut guard = rs.write().await;
        check_no_overlap(&guard, &span)?;

        let reservation = Reservation {
            id: Ulid::new(),
            room_id: candidate.room_id,
            span,
        };
        self.reservation_to_room
            .insert(reservation.id, reservation.room_id.clone());
        guard.insert_reservation(reservation.clone());
        Ok(reservation)
    }

    /// Validate a raw payload, then admit it.
    pub async fn reserve(&self, payload: &Value) -> Result<Reservation, ReserveError> {
        let candidate = validate_reservation(payload).inspect_err(|errors| {
            metrics::counter!(ADMISSIONS_TOTAL, "outcome" => "invalid").increment(1);
            debug!(fields = ?errors.fields(), "reservation payload invalid");
        })?;
        Ok(self.admit(candidate).await?)
    }

    pub async fn cancel(&self, id: Ulid) -> Result<(), NotFound> {
        let result = self.try_cancel(id).await;
        let outcome = if result.is_ok() { "cancelled" } else { "not_found" };
        metrics::counter!(CANCELLATIONS_TOTAL, "outcome" => outcome).increment(1);
        if result.is_ok() {
            metrics::gauge!(RESERVATIONS_ACTIVE).decrement(1.0);
        }
        debug!(%id, outcome, "cancel");
        result
    }

    async fn try_cancel(&self, id: Ulid) -> Result<(), NotFound> {
        let room_id = self.get_room_for_reservation(&id).ok_or(NotFound(id))?;
        let rs = self.get_room(&room_id).ok_or(NotFound(id))?;
        let mut guard = rs.write().await;
        // A concurrent cancel may have won between the lookup and the lock.
        guard.remove_reservation(id).ok_or(NotFound(id))?;
        self.reservation_to_room.remove(&id);
        Ok(())
    }
}
