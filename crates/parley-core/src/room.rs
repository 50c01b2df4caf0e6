//! Room abstraction for Parley.
//!
//! Rooms are named groups of connections that receive each other's
//! signaling and chat events.

use crate::connection::ConnectionId;
use std::collections::HashSet;
use tracing::debug;

/// Maximum room name length in bytes.
pub const MAX_ROOM_ID_LENGTH: usize = 256;

/// A room identifier, chosen by clients.
pub type RoomId = String;

/// Validate a room identifier.
///
/// # Errors
///
/// Returns an error message if the room identifier is invalid.
pub fn validate_room_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Room ID cannot be empty");
    }
    if id.len() > MAX_ROOM_ID_LENGTH {
        return Err("Room ID too long");
    }
    if id.chars().any(char::is_control) {
        return Err("Room ID contains control characters");
    }
    Ok(())
}

/// A set of connections sharing a room.
#[derive(Debug, Clone)]
pub struct Room {
    /// Room name.
    id: RoomId,
    /// Connections currently joined.
    members: HashSet<ConnectionId>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>) -> Self {
        Self {
            id: id.into(),
            members: HashSet::new(),
        }
    }

    /// Get the room name.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Check if the room has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Check if a connection is a member.
    #[must_use]
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.members.contains(connection_id)
    }

    /// Add a connection.
    ///
    /// Returns `true` if the connection was not already a member.
    pub fn join(&mut self, connection_id: ConnectionId) -> bool {
        let added = self.members.insert(connection_id);
        if added {
            debug!(room = %self.id, members = self.members.len(), "Connection joined room");
        }
        added
    }

    /// Remove a connection.
    ///
    /// Returns `true` if the connection was a member.
    pub fn leave(&mut self, connection_id: &ConnectionId) -> bool {
        let removed = self.members.remove(connection_id);
        if removed {
            debug!(room = %self.id, connection = %connection_id, "Connection left room");
        }
        removed
    }

    /// Get all member IDs.
    #[must_use]
    pub fn members(&self) -> Vec<ConnectionId> {
        self.members.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_creation() {
        let room = Room::new("lobby");
        assert_eq!(room.id(), "lobby");
        assert_eq!(room.len(), 0);
        assert!(room.is_empty());
    }

    #[test]
    fn test_room_join_leave() {
        let mut room = Room::new("lobby");
        let a = ConnectionId::new("conn-a");
        let b = ConnectionId::new("conn-b");

        assert!(room.join(a.clone()));
        assert!(room.join(b.clone()));
        assert_eq!(room.len(), 2);

        // Joining twice does not duplicate membership
        assert!(!room.join(a.clone()));
        assert_eq!(room.len(), 2);

        assert!(room.leave(&a));
        assert!(!room.contains(&a));
        assert!(room.contains(&b));

        // Leaving twice is a no-op
        assert!(!room.leave(&a));
        assert_eq!(room.len(), 1);
    }

    #[test]
    fn test_room_id_validation() {
        assert!(validate_room_id("lobby").is_ok());
        assert!(validate_room_id("sala de espera 🎧").is_ok());
        assert!(validate_room_id("").is_err());
        assert!(validate_room_id("bad\nroom").is_err());

        let long_id = "a".repeat(MAX_ROOM_ID_LENGTH + 1);
        assert!(validate_room_id(&long_id).is_err());
    }
}
