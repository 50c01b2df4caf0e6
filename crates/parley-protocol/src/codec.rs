//! Codec for encoding and decoding Parley events.
//!
//! Frames are UTF-8 JSON envelopes carried in WebSocket text messages.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::value::RawValue;
use thiserror::Error;

use crate::events::{
    AnswerData, CandidateData, EventKind, InboundEvent, JoinData, MessageData, OfferData,
    OutboundEvent, RejoinData, RoomData,
};

/// Maximum frame size (1 MiB).
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Protocol errors that can occur during encoding/decoding.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Frame exceeds maximum size.
    #[error("Frame size {0} exceeds maximum {MAX_FRAME_SIZE}")]
    FrameTooLarge(usize),

    /// The envelope is not valid JSON or lacks an event name.
    #[error("Malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The event name is not part of the protocol.
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    /// The event requires a `data` payload but none was sent.
    #[error("Event {0} has no data")]
    MissingData(EventKind),

    /// The payload is missing a required field or has the wrong shape.
    #[error("Invalid {event} payload: {source}")]
    InvalidPayload {
        event: EventKind,
        source: serde_json::Error,
    },

    /// JSON encoding error.
    #[error("Encoding error: {0}")]
    Encode(serde_json::Error),
}

impl ProtocolError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            ProtocolError::FrameTooLarge(_) => "too_large",
            ProtocolError::Malformed(_) => "malformed",
            ProtocolError::UnknownEvent(_) => "unknown_event",
            ProtocolError::MissingData(_) => "missing_data",
            ProtocolError::InvalidPayload { .. } => "invalid_payload",
            ProtocolError::Encode(_) => "encode",
        }
    }
}

#[derive(Deserialize)]
struct Envelope<'a> {
    event: String,
    #[serde(default, borrow)]
    data: Option<&'a RawValue>,
}

fn payload<T: DeserializeOwned>(event: EventKind, data: &RawValue) -> Result<T, ProtocolError> {
    serde_json::from_str(data.get())
        .map_err(|source| ProtocolError::InvalidPayload { event, source })
}

/// Decode an inbound event from a text frame.
///
/// # Errors
///
/// Returns an error if the frame is too large, is not a valid envelope,
/// names an unknown event, or its payload lacks a required field.
pub fn decode(text: &str) -> Result<InboundEvent, ProtocolError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge(text.len()));
    }

    let envelope: Envelope<'_> = serde_json::from_str(text)?;
    let kind = EventKind::from_name(&envelope.event)
        .ok_or_else(|| ProtocolError::UnknownEvent(envelope.event.clone()))?;
    let data = envelope.data.ok_or(ProtocolError::MissingData(kind))?;

    let event = match kind {
        EventKind::JoinRoom => {
            let JoinData { room_id, user_name } = payload(kind, data)?;
            InboundEvent::JoinRoom { room_id, user_name }
        }
        EventKind::SendMessage => {
            let MessageData { room_id, message } = payload(kind, data)?;
            InboundEvent::SendMessage { room_id, message }
        }
        EventKind::CallRequest => {
            let RoomData { room_id } = payload(kind, data)?;
            InboundEvent::CallRequest { room_id }
        }
        EventKind::Offer => {
            let OfferData { room_id, offer } = payload(kind, data)?;
            InboundEvent::Offer { room_id, offer }
        }
        EventKind::Answer => {
            let AnswerData { room_id, answer } = payload(kind, data)?;
            InboundEvent::Answer { room_id, answer }
        }
        EventKind::IceCandidate => {
            let CandidateData { room_id, candidate } = payload(kind, data)?;
            InboundEvent::IceCandidate { room_id, candidate }
        }
        EventKind::CallRejected => {
            let RoomData { room_id } = payload(kind, data)?;
            InboundEvent::CallRejected { room_id }
        }
        EventKind::EndCall => {
            let RoomData { room_id } = payload(kind, data)?;
            InboundEvent::EndCall { room_id }
        }
        EventKind::RejoinCall => {
            let RejoinData { room_id, user_name } = payload(kind, data)?;
            InboundEvent::RejoinCall { room_id, user_name }
        }
    };

    Ok(event)
}

/// Encode an outbound event to a text frame.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn encode(event: &OutboundEvent) -> Result<String, ProtocolError> {
    serde_json::to_string(event).map_err(ProtocolError::Encode)
}
