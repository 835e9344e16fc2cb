mod conflict;
mod error;
mod mutations;
mod queries;

pub use error::{NotFound, Rejection, ReserveError};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use ulid::Ulid;

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// The reservation store and admission engine.
///
/// Rooms are locked independently: admissions and cancellations on one room
/// are serialized by its write lock, and never wait on another room.
pub struct Engine {
    pub(super) rooms: DashMap<String, SharedRoomState>,
    /// Reverse lookup: reservation id → room id
    pub(super) reservation_to_room: DashMap<Ulid, String>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            reservation_to_room: DashMap::new(),
        }
    }

    pub fn get_room(&self, room_id: &str) -> Option<SharedRoomState> {
        self.rooms.get(room_id).map(|e| e.value().clone())
    }

    /// Rooms are created lazily and never pruned: an admission may already
    /// hold the `Arc` of a room that just became empty.
    pub(super) fn room_or_insert(&self, room_id: &str) -> SharedRoomState {
        if let Some(rs) = self.get_room(room_id) {
            return rs;
        }
        self.rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(RoomState::new(room_id.to_string()))))
            .value()
            .clone()
    }

    pub fn get_room_for_reservation(&self, id: &Ulid) -> Option<String> {
        self.reservation_to_room.get(id).map(|e| e.value().clone())
    }

    /// Number of live reservations across all rooms.
    pub fn reservation_count(&self) -> usize {
        self.reservation_to_room.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
