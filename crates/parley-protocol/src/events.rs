//! Event types for the Parley wire protocol.
//!
//! Every frame on the wire is a JSON envelope `{"event": <name>, "data": <payload>}`.
//! Inbound events come from clients; outbound events are produced by the relay.
//! Opaque payloads (chat messages, SDP, ICE candidates) are kept as raw JSON so
//! they reach recipients byte-for-byte as the sender wrote them.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::fmt;

/// An opaque JSON payload relayed without interpretation.
pub type Payload = Box<RawValue>;

/// Display name used on the wire when a client joins without one.
pub const DEFAULT_DISPLAY_NAME: &str = "Guest";

/// Inbound event identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    JoinRoom,
    SendMessage,
    CallRequest,
    Offer,
    Answer,
    IceCandidate,
    CallRejected,
    EndCall,
    RejoinCall,
}

impl EventKind {
    /// All inbound event kinds.
    pub const ALL: [EventKind; 9] = [
        EventKind::JoinRoom,
        EventKind::SendMessage,
        EventKind::CallRequest,
        EventKind::Offer,
        EventKind::Answer,
        EventKind::IceCandidate,
        EventKind::CallRejected,
        EventKind::EndCall,
        EventKind::RejoinCall,
    ];

    /// The wire name of this event.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::JoinRoom => "join-room",
            EventKind::SendMessage => "send-message",
            EventKind::CallRequest => "call-request",
            EventKind::Offer => "offer",
            EventKind::Answer => "answer",
            EventKind::IceCandidate => "ice-candidate",
            EventKind::CallRejected => "call-rejected",
            EventKind::EndCall => "end-call",
            EventKind::RejoinCall => "rejoin-call",
        }
    }

    /// Look up an event kind by its wire name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event received from a client.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    /// Join a room, optionally announcing a display name.
    JoinRoom {
        room_id: String,
        user_name: Option<String>,
    },

    /// Chat message for everyone in the room, sender included.
    SendMessage { room_id: String, message: Payload },

    /// Ask the other members to start a call.
    CallRequest { room_id: String },

    /// Session description offer.
    Offer { room_id: String, offer: Payload },

    /// Session description answer.
    Answer { room_id: String, answer: Payload },

    /// Network candidate.
    IceCandidate { room_id: String, candidate: Payload },

    /// Decline an incoming call.
    CallRejected { room_id: String },

    /// Hang up.
    EndCall { room_id: String },

    /// Re-enter a room after a dropped call, without the existing-user check.
    RejoinCall { room_id: String, user_name: String },
}

impl InboundEvent {
    /// Get the event kind.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            InboundEvent::JoinRoom { .. } => EventKind::JoinRoom,
            InboundEvent::SendMessage { .. } => EventKind::SendMessage,
            InboundEvent::CallRequest { .. } => EventKind::CallRequest,
            InboundEvent::Offer { .. } => EventKind::Offer,
            InboundEvent::Answer { .. } => EventKind::Answer,
            InboundEvent::IceCandidate { .. } => EventKind::IceCandidate,
            InboundEvent::CallRejected { .. } => EventKind::CallRejected,
            InboundEvent::EndCall { .. } => EventKind::EndCall,
            InboundEvent::RejoinCall { .. } => EventKind::RejoinCall,
        }
    }

    /// Get the room this event addresses.
    #[must_use]
    pub fn room_id(&self) -> &str {
        match self {
            InboundEvent::JoinRoom { room_id, .. }
            | InboundEvent::SendMessage { room_id, .. }
            | InboundEvent::CallRequest { room_id }
            | InboundEvent::Offer { room_id, .. }
            | InboundEvent::Answer { room_id, .. }
            | InboundEvent::IceCandidate { room_id, .. }
            | InboundEvent::CallRejected { room_id }
            | InboundEvent::EndCall { room_id }
            | InboundEvent::RejoinCall { room_id, .. } => room_id,
        }
    }
}

/// An event emitted by the relay.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundEvent {
    /// Someone entered the room.
    UserJoined {
        #[serde(rename = "userName")]
        user_name: String,
        id: String,
    },

    /// Sent to a newcomer when somebody is already in the room.
    ExistingUser,

    /// Chat message, exactly as the sender supplied it.
    ReceiveMessage(Payload),

    /// Incoming call.
    CallRequest {
        #[serde(rename = "callerId")]
        caller_id: String,
    },

    /// Session description offer tagged with the sender.
    Offer { offer: Payload, sender: String },

    /// Raw session description answer.
    ReceiveAnswer(Payload),

    /// Raw network candidate.
    NewIceCandidate(Payload),

    /// The callee declined.
    CallRejected {
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// The other side hung up.
    CallEnded,

    /// A member left the room.
    UserDisconnected { id: String },
}

impl OutboundEvent {
    /// The wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::UserJoined { .. } => "user-joined",
            OutboundEvent::ExistingUser => "existing-user",
            OutboundEvent::ReceiveMessage(_) => "receive-message",
            OutboundEvent::CallRequest { .. } => "call-request",
            OutboundEvent::Offer { .. } => "offer",
            OutboundEvent::ReceiveAnswer(_) => "receive-answer",
            OutboundEvent::NewIceCandidate(_) => "new-ice-candidate",
            OutboundEvent::CallRejected { .. } => "call-rejected",
            OutboundEvent::CallEnded => "call-ended",
            OutboundEvent::UserDisconnected { .. } => "user-disconnected",
        }
    }

    /// Create a `user-joined` event, substituting the default name for a missing or empty one.
    #[must_use]
    pub fn user_joined(user_name: Option<&str>, id: impl Into<String>) -> Self {
        let user_name = user_name
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DISPLAY_NAME);
        OutboundEvent::UserJoined {
            user_name: user_name.to_string(),
            id: id.into(),
        }
    }

    /// Create a `user-disconnected` event.
    #[must_use]
    pub fn user_disconnected(id: impl Into<String>) -> Self {
        OutboundEvent::UserDisconnected { id: id.into() }
    }
}

/// `data` of events that carry only a room.
#[derive(Debug, Deserialize)]
pub(crate) struct RoomData {
    #[serde(rename = "roomID")]
    pub room_id: String,
}

/// `data` of `join-room`.
#[derive(Debug, Deserialize)]
pub(crate) struct JoinData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "userName", default)]
    pub user_name: Option<String>,
}

/// `data` of `rejoin-call`.
#[derive(Debug, Deserialize)]
pub(crate) struct RejoinData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
}

/// `data` of `send-message`.
#[derive(Debug, Deserialize)]
pub(crate) struct MessageData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub message: Payload,
}

/// `data` of `offer`.
#[derive(Debug, Deserialize)]
pub(crate) struct OfferData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub offer: Payload,
}

/// `data` of `answer`.
#[derive(Debug, Deserialize)]
pub(crate) struct AnswerData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub answer: Payload,
}

/// `data` of `ice-candidate`.
#[derive(Debug, Deserialize)]
pub(crate) struct CandidateData {
    #[serde(rename = "roomID")]
    pub room_id: String,
    pub candidate: Payload,
}
