//! Audience resolution.
//!
//! Every outbound event is addressed to an [`Audience`]. Turning an audience
//! into concrete connection IDs is a pure function of the room's member list,
//! so routing can be checked without a live transport.

use crate::connection::ConnectionId;
use crate::room::RoomId;
use parley_protocol::OutboundEvent;

/// Who an outbound event is for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// A single connection.
    Connection(ConnectionId),
    /// Every member of a room.
    Room(RoomId),
    /// Every member of a room except one connection, usually the sender.
    RoomExcept { room: RoomId, except: ConnectionId },
}

impl Audience {
    /// The room this audience is drawn from, if any.
    #[must_use]
    pub fn room(&self) -> Option<&str> {
        match self {
            Audience::Connection(_) => None,
            Audience::Room(room) | Audience::RoomExcept { room, .. } => Some(room),
        }
    }
}

/// Resolve an audience against a snapshot of its room's members.
///
/// `members` is ignored for [`Audience::Connection`].
#[must_use]
pub fn resolve(audience: &Audience, members: &[ConnectionId]) -> Vec<ConnectionId> {
    match audience {
        Audience::Connection(id) => vec![id.clone()],
        Audience::Room(_) => members.to_vec(),
        Audience::RoomExcept { except, .. } => members
            .iter()
            .filter(|member| *member != except)
            .cloned()
            .collect(),
    }
}

/// An outbound event paired with its audience.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// Recipients.
    pub audience: Audience,
    /// Event to deliver.
    pub event: OutboundEvent,
}

impl Dispatch {
    /// Address an event to one connection.
    #[must_use]
    pub fn to_connection(target: ConnectionId, event: OutboundEvent) -> Self {
        Self {
            audience: Audience::Connection(target),
            event,
        }
    }

    /// Address an event to a whole room.
    #[must_use]
    pub fn to_room(room: impl Into<RoomId>, event: OutboundEvent) -> Self {
        Self {
            audience: Audience::Room(room.into()),
            event,
        }
    }

    /// Address an event to a room minus one connection.
    #[must_use]
    pub fn to_room_except(
        room: impl Into<RoomId>,
        except: ConnectionId,
        event: OutboundEvent,
    ) -> Self {
        Self {
            audience: Audience::RoomExcept {
                room: room.into(),
                except,
            },
            event,
        }
    }
}
