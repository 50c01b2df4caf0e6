//! # parley-protocol
//!
//! Wire protocol definitions for the Parley signaling relay.
//!
//! Clients and the relay exchange JSON envelopes over WebSocket text frames:
//!
//! ```json
//! {"event": "offer", "data": {"roomID": "lobby", "offer": {"type": "offer", "sdp": "..."}}}
//! ```
//!
//! ## Events
//!
//! - `join-room` / `rejoin-call` - Room membership
//! - `send-message` - Chat, echoed to the whole room
//! - `call-request` / `call-rejected` / `end-call` - Call control
//! - `offer` / `answer` / `ice-candidate` - Connection setup metadata
//!
//! ## Example
//!
//! ```rust
//! use parley_protocol::{codec, InboundEvent, OutboundEvent};
//!
//! let event = codec::decode(r#"{"event":"join-room","data":{"roomID":"lobby"}}"#).unwrap();
//! assert_eq!(event.room_id(), "lobby");
//!
//! let text = codec::encode(&OutboundEvent::ExistingUser).unwrap();
//! assert_eq!(text, r#"{"event":"existing-user"}"#);
//! ```

pub mod codec;
pub mod events;

pub use codec::{decode, encode, ProtocolError};
pub use events::{EventKind, InboundEvent, OutboundEvent, Payload, DEFAULT_DISPLAY_NAME};
