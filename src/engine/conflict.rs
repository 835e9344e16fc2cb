use crate::model::*;

use super::Rejection;

pub(crate) fn now_ms() -> Ms {
    chrono::Utc::now().timestamp_millis()
}

/// Rules that need no store access: ordering, then no past start.
pub(crate) fn check_interval(candidate: &Candidate, now: Ms) -> Result<Span, Rejection> {
    let span = candidate.span().ok_or(Rejection::InvalidInterval)?;
    if span.start < now {
        return Err(Rejection::PastStart);
    }
    Ok(span)
}

/// Caller must hold the room's write lock across this check and the insert.
pub(crate) fn check_no_overlap(rs: &RoomState, span: &Span) -> Result<(), Rejection> {
    match rs.overlapping(span).next() {
        Some(existing) => Err(Rejection::Overlap(existing.id)),
        None => Ok(()),
    }
}
