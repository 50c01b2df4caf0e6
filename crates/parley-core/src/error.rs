//! Relay errors.

use thiserror::Error;

/// Reasons an inbound event is dropped by the relay.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RelayError {
    /// The event named an unusable room.
    #[error("Invalid room: {0}")]
    InvalidRoom(&'static str),

    /// Creating another room would exceed the configured limit.
    #[error("Maximum rooms reached")]
    MaxRoomsReached,
}

impl RelayError {
    /// Short label for metrics and logs.
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            RelayError::InvalidRoom(_) => "invalid_room",
            RelayError::MaxRoomsReached => "max_rooms",
        }
    }
}
