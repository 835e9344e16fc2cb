use crate::model::*;

use super::Engine;

impl Engine {
    /// All current reservations of a room, ordered by start time.
    /// Unknown rooms have no reservations.
    pub async fn list_by_room(&self, room_id: &str) -> Vec<Reservation> {
        let Some(rs) = self.get_room(room_id) else {
            return Vec::new();
        };
        let guard = rs.read().await;
        guard.reservations.clone()
    }
}
