//! Shared fixtures for Parley benchmarks.

use parley_core::{ConnectionId, EventSink, Frame, Router};
use parley_protocol::{codec, InboundEvent};
use std::sync::atomic::{AtomicUsize, Ordering};

/// A sink that counts frames and discards them.
#[derive(Debug, Default)]
pub struct CountingSink {
    delivered: AtomicUsize,
}

impl CountingSink {
    /// Frames delivered so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl EventSink for CountingSink {
    fn deliver(&self, _target: &ConnectionId, _frame: Frame) -> bool {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        true
    }
}

/// Connection IDs `conn-{room}-{n}` for one room.
pub fn members(room: usize, count: usize) -> Vec<ConnectionId> {
    (0..count)
        .map(|n| ConnectionId::new(format!("conn-{}-{}", room, n)))
        .collect()
}

/// A router with `rooms` rooms named `room-{i}`, each holding `per_room` members.
pub fn populated_router(rooms: usize, per_room: usize) -> Router {
    let router = Router::new();
    for room in 0..rooms {
        let room_id = format!("room-{}", room);
        for member in members(room, per_room) {
            let _ = router.registry().join(&room_id, &member);
        }
    }
    router
}

/// A JSON `offer` event for `room` carrying an SDP body of `sdp_len` bytes.
pub fn offer_json(room: &str, sdp_len: usize) -> String {
    serde_json::json!({
        "event": "offer",
        "data": {
            "roomID": room,
            "offer": { "type": "offer", "sdp": "a".repeat(sdp_len) },
        },
    })
    .to_string()
}

/// A decoded `offer` event, see [`offer_json`].
///
/// # Panics
///
/// Panics if the fixture does not decode.
pub fn offer_event(room: &str, sdp_len: usize) -> InboundEvent {
    codec::decode(&offer_json(room, sdp_len)).expect("offer fixture decodes")
}
