use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds. The only time type.
pub type Ms = i64;

/// Render an instant as RFC 3339 in UTC with millisecond precision.
pub fn format_ms(ms: Ms) -> String {
    match DateTime::<Utc>::from_timestamp_millis(ms) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => ms.to_string(),
    }
}

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    #[serde(rename = "startTime", with = "iso_ms")]
    pub start: Ms,
    #[serde(rename = "endTime", with = "iso_ms")]
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// `None` unless `start < end`.
    pub fn try_new(start: Ms, end: Ms) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Serde adapter: `Ms` on the inside, ISO-8601 text on the outside.
mod iso_ms {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::{Ms, format_ms};

    pub fn serialize<S: Serializer>(ms: &Ms, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&format_ms(*ms))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Ms, D::Error> {
        let text = String::deserialize(d)?;
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc).timestamp_millis())
            .map_err(de::Error::custom)
    }
}

/// A validated reservation request that has not been admitted yet.
///
/// Ordering of `start` and `end` is not guaranteed here; the engine checks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub room_id: String,
    pub start: Ms,
    pub end: Ms,
}

impl Candidate {
    pub fn new(room_id: impl Into<String>, start: Ms, end: Ms) -> Self {
        Self {
            room_id: room_id.into(),
            start,
            end,
        }
    }

    pub fn span(&self) -> Option<Span> {
        Span::try_new(self.start, self.end)
    }
}

/// An admitted reservation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Ulid,
    pub room_id: String,
    #[serde(flatten)]
    pub span: Span,
}

impl Reservation {
    pub fn start_time(&self) -> String {
        format_ms(self.span.start)
    }

    pub fn end_time(&self) -> String {
        format_ms(self.span.end)
    }
}

#[derive(Debug, Clone)]
pub struct RoomState {
    pub id: String,
    /// Admitted reservations, sorted by `span.start`. They never overlap,
    /// so this is end order as well.
    pub reservations: Vec<Reservation>,
}

impl RoomState {
    pub fn new(id: String) -> Self {
        Self {
            id,
            reservations: Vec::new(),
        }
    }

    /// Insert reservation maintaining sort order by span.start.
    pub fn insert_reservation(&mut self, reservation: Reservation) {
        let pos = self
            .reservations
            .binary_search_by_key(&reservation.span.start, |r| r.span.start)
            .unwrap_or_else(|e| e);
        self.reservations.insert(pos, reservation);
    }

    /// Remove reservation by id.
    pub fn remove_reservation(&mut self, id: Ulid) -> Option<Reservation> {
        let pos = self.reservations.iter().position(|r| r.id == id)?;
        Some(self.reservations.remove(pos))
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .reservations
            .partition_point(|r| r.span.start < query.end);
        self.reservations[..right_bound]
            .iter()
            .filter(move |r| r.span.end > query.start)
    }
}
