//! Connection registry.
//!
//! Tracks which connections are joined to which room. A room exists exactly
//! while it has at least one member, and a connection is a member of at most
//! one room. Every operation takes the same lock, so joins and leaves from
//! different connections are linearizable.

use crate::connection::ConnectionId;
use crate::error::RelayError;
use crate::room::{validate_room_id, Room, RoomId};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// Default upper bound on concurrently open rooms.
pub const DEFAULT_MAX_ROOMS: usize = 10_000;

/// Result of a successful join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// Room size after the join.
    pub room_size: usize,
    /// Room the connection was moved out of, if it was tracked elsewhere.
    pub previous_room: Option<RoomId>,
    /// `false` if the connection was already a member of this room.
    pub newly_joined: bool,
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Number of non-empty rooms.
    pub room_count: usize,
    /// Number of connections joined to some room.
    pub connection_count: usize,
}

#[derive(Debug, Default)]
struct Inner {
    rooms: HashMap<RoomId, Room>,
    memberships: HashMap<ConnectionId, RoomId>,
}

impl Inner {
    /// Remove a connection from its room, deleting the room if it empties.
    fn remove_membership(&mut self, connection_id: &ConnectionId) -> Option<RoomId> {
        let room_id = self.memberships.remove(connection_id)?;

        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.leave(connection_id);
            if room.is_empty() {
                self.rooms.remove(&room_id);
                debug!(room = %room_id, "Deleted empty room");
            }
        }

        Some(room_id)
    }
}

/// Process-wide room membership.
#[derive(Debug)]
pub struct Registry {
    inner: Mutex<Inner>,
    max_rooms: usize,
}

impl Registry {
    /// Create a registry with the default room limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_rooms(DEFAULT_MAX_ROOMS)
    }

    /// Create a registry allowing at most `max_rooms` open rooms.
    #[must_use]
    pub fn with_max_rooms(max_rooms: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_rooms,
        }
    }

    // Poisoning is ignored: no critical section panics mid-update.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a connection to a room, creating the room if needed.
    ///
    /// Joining the room the connection is already in changes nothing. Joining
    /// a different room first removes the connection from its current one.
    ///
    /// # Errors
    ///
    /// Returns an error if the room ID is invalid or a new room would exceed
    /// the room limit.
    pub fn join(
        &self,
        room_id: &str,
        connection_id: &ConnectionId,
    ) -> Result<JoinOutcome, RelayError> {
        validate_room_id(room_id).map_err(RelayError::InvalidRoom)?;

        let mut inner = self.lock();

        if inner.memberships.get(connection_id).map(String::as_str) == Some(room_id) {
            let room_size = inner.rooms.get(room_id).map_or(0, Room::len);
            return Ok(JoinOutcome {
                room_size,
                previous_room: None,
                newly_joined: false,
            });
        }

        // A sole member moving out frees its current room
        let freed = inner
            .memberships
            .get(connection_id)
            .and_then(|current| inner.rooms.get(current))
            .map_or(0, |room| usize::from(room.len() == 1));
        if !inner.rooms.contains_key(room_id) && inner.rooms.len() - freed >= self.max_rooms {
            return Err(RelayError::MaxRoomsReached);
        }

        let previous_room = inner.remove_membership(connection_id);
        if let Some(previous) = &previous_room {
            info!(
                connection = %connection_id,
                from = %previous,
                to = %room_id,
                "Connection switched rooms"
            );
        }

        let room = inner.rooms.entry(room_id.to_string()).or_insert_with(|| {
            debug!(room = %room_id, "Creating new room");
            Room::new(room_id)
        });
        room.join(connection_id.clone());
        let room_size = room.len();

        inner
            .memberships
            .insert(connection_id.clone(), room_id.to_string());

        Ok(JoinOutcome {
            room_size,
            previous_room,
            newly_joined: true,
        })
    }

    /// Remove a connection from the room it is in.
    ///
    /// Returns the room it left, or `None` if it was not in any room.
    pub fn leave(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.lock().remove_membership(connection_id)
    }

    /// Get the number of members in a room (0 if it does not exist).
    #[must_use]
    pub fn room_size(&self, room_id: &str) -> usize {
        self.lock().rooms.get(room_id).map_or(0, Room::len)
    }

    /// Snapshot of a room's members.
    #[must_use]
    pub fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        self.lock()
            .rooms
            .get(room_id)
            .map(Room::members)
            .unwrap_or_default()
    }

    /// Get the room a connection is in.
    #[must_use]
    pub fn room_of(&self, connection_id: &ConnectionId) -> Option<RoomId> {
        self.lock().memberships.get(connection_id).cloned()
    }

    /// Check if a room exists.
    #[must_use]
    pub fn contains_room(&self, room_id: &str) -> bool {
        self.lock().rooms.contains_key(room_id)
    }

    /// Get all room names.
    #[must_use]
    pub fn room_names(&self) -> Vec<RoomId> {
        self.lock().rooms.keys().cloned().collect()
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.lock();
        RegistryStats {
            room_count: inner.rooms.len(),
            connection_count: inner.memberships.len(),
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id)
    }

    #[test]
    fn test_join_creates_and_leave_deletes_room() {
        let registry = Registry::new();
        let c = conn("c");

        let outcome = registry.join("r2", &c).unwrap();
        assert_eq!(outcome.room_size, 1);
        assert!(outcome.newly_joined);
        assert!(registry.contains_room("r2"));

        assert_eq!(registry.leave(&c), Some("r2".to_string()));
        assert!(!registry.contains_room("r2"));
        assert_eq!(registry.room_size("r2"), 0);
        assert!(registry.room_names().is_empty());
    }

    #[test]
    fn test_join_is_idempotent() {
        let registry = Registry::new();
        let a = conn("a");

        registry.join("r1", &a).unwrap();
        let outcome = registry.join("r1", &a).unwrap();

        assert_eq!(outcome.room_size, 1);
        assert!(!outcome.newly_joined);
        assert_eq!(outcome.previous_room, None);
        assert_eq!(registry.room_size("r1"), 1);
    }

    #[test]
    fn test_room_size_tracks_joins_and_leaves() {
        let registry = Registry::new();
        let ids: Vec<_> = (0..5).map(|i| conn(&format!("c{}", i))).collect();

        for (i, id) in ids.iter().enumerate() {
            assert_eq!(registry.join("r1", id).unwrap().room_size, i + 1);
        }
        assert_eq!(registry.room_size("r1"), 5);

        registry.leave(&ids[0]);
        registry.leave(&ids[3]);
        assert_eq!(registry.room_size("r1"), 3);

        let mut members = registry.members("r1");
        members.sort();
        assert_eq!(members, vec![ids[1].clone(), ids[2].clone(), ids[4].clone()]);

        for id in &ids {
            registry.leave(id);
        }
        assert_eq!(registry.room_size("r1"), 0);
        assert!(!registry.contains_room("r1"));
    }

    #[test]
    fn test_leave_unknown_connection_is_noop() {
        let registry = Registry::new();
        registry.join("r1", &conn("a")).unwrap();

        assert_eq!(registry.leave(&conn("ghost")), None);
        assert_eq!(registry.room_size("r1"), 1);
    }

    #[test]
    fn test_join_other_room_moves_connection() {
        let registry = Registry::new();
        let a = conn("a");
        let b = conn("b");

        registry.join("r1", &a).unwrap();
        registry.join("r1", &b).unwrap();

        let outcome = registry.join("r2", &a).unwrap();
        assert_eq!(outcome.previous_room, Some("r1".to_string()));
        assert_eq!(outcome.room_size, 1);

        assert_eq!(registry.room_size("r1"), 1);
        assert_eq!(registry.room_of(&a), Some("r2".to_string()));

        // Single-member room is removed when its member moves away
        registry.join("r3", &b).unwrap();
        assert!(!registry.contains_room("r1"));

        // Leaving only touches the current room
        assert_eq!(registry.leave(&a), Some("r2".to_string()));
        assert_eq!(registry.room_size("r3"), 1);
    }

    #[test]
    fn test_invalid_room() {
        let registry = Registry::new();
        assert!(matches!(
            registry.join("", &conn("a")),
            Err(RelayError::InvalidRoom(_))
        ));
        assert_eq!(registry.stats().room_count, 0);
    }

    #[test]
    fn test_max_rooms() {
        let registry = Registry::with_max_rooms(2);
        registry.join("r1", &conn("a")).unwrap();
        registry.join("r2", &conn("b")).unwrap();

        assert_eq!(
            registry.join("r3", &conn("c")),
            Err(RelayError::MaxRoomsReached)
        );
        // Existing rooms still accept members
        assert!(registry.join("r1", &conn("c")).is_ok());
    }

    #[test]
    fn test_switch_room_at_limit() {
        let registry = Registry::with_max_rooms(1);
        let a = conn("a");
        registry.join("r1", &a).unwrap();

        // Sole member moving out: the room count stays at one
        let outcome = registry.join("r2", &a).unwrap();
        assert_eq!(outcome.previous_room, Some("r1".to_string()));
        assert_eq!(registry.room_names(), vec!["r2".to_string()]);

        // With company left behind, a move would open a second room
        registry.join("r2", &conn("b")).unwrap();
        assert_eq!(registry.join("r3", &a), Err(RelayError::MaxRoomsReached));
        assert_eq!(registry.room_of(&a), Some("r2".to_string()));
        assert_eq!(registry.room_size("r2"), 2);
    }

    #[test]
    fn test_stats() {
        let registry = Registry::new();
        registry.join("r1", &conn("a")).unwrap();
        registry.join("r1", &conn("b")).unwrap();
        registry.join("r2", &conn("c")).unwrap();

        let stats = registry.stats();
        assert_eq!(stats.room_count, 2);
        assert_eq!(stats.connection_count, 3);
    }

    #[test]
    fn test_concurrent_joins_and_leaves() {
        let registry = Arc::new(Registry::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    let ids: Vec<_> = (0..100)
                        .map(|i| ConnectionId::new(format!("t{}-c{}", t, i)))
                        .collect();
                    for id in &ids {
                        registry.join("shared", id).unwrap();
                    }
                    for id in &ids {
                        assert_eq!(registry.leave(id), Some("shared".to_string()));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!registry.contains_room("shared"));
        assert_eq!(registry.stats().connection_count, 0);
    }
}
