//! Live connection table and delivery.

use crate::connection::ConnectionId;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// An encoded text frame, shared between all recipients of one event.
pub type Frame = Arc<str>;

/// Delivers encoded frames to connections.
///
/// Delivery is fire-and-forget: implementations must not block and report
/// only whether the frame was handed off.
pub trait EventSink: Send + Sync {
    /// Queue a frame for one connection.
    ///
    /// Returns `false` if the connection is unknown or already gone.
    fn deliver(&self, target: &ConnectionId, frame: Frame) -> bool;
}

/// Outbound queues of every open connection.
#[derive(Debug, Default)]
pub struct Hub {
    connections: DashMap<ConnectionId, mpsc::UnboundedSender<Frame>>,
}

impl Hub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection and get the receiving end of its queue.
    ///
    /// Registering an ID again replaces the previous queue.
    pub fn register(&self, connection_id: ConnectionId) -> mpsc::UnboundedReceiver<Frame> {
        let (tx, rx) = mpsc::unbounded_channel();
        debug!(connection = %connection_id, "Registered connection");
        self.connections.insert(connection_id, tx);
        rx
    }

    /// Remove a connection.
    ///
    /// Returns `true` if it was registered.
    pub fn unregister(&self, connection_id: &ConnectionId) -> bool {
        let removed = self.connections.remove(connection_id).is_some();
        if removed {
            debug!(connection = %connection_id, "Unregistered connection");
        }
        removed
    }

    /// Check if a connection is registered.
    #[must_use]
    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.connections.contains_key(connection_id)
    }

    /// Number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Check if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl EventSink for Hub {
    fn deliver(&self, target: &ConnectionId, frame: Frame) -> bool {
        match self.connections.get(target) {
            Some(tx) => tx.send(frame).is_ok(),
            None => {
                trace!(connection = %target, "Dropping frame for unknown connection");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hub_deliver() {
        let hub = Hub::new();
        let id = ConnectionId::new("conn-1");
        let mut rx = hub.register(id.clone());

        assert!(hub.deliver(&id, Arc::from("hello")));
        assert_eq!(&*rx.recv().await.unwrap(), "hello");
        assert_eq!(hub.len(), 1);
    }

    #[test]
    fn test_hub_unknown_connection() {
        let hub = Hub::new();
        assert!(!hub.deliver(&ConnectionId::new("ghost"), Arc::from("x")));
    }

    #[test]
    fn test_hub_unregister() {
        let hub = Hub::new();
        let id = ConnectionId::new("conn-1");
        let _rx = hub.register(id.clone());

        assert!(hub.unregister(&id));
        assert!(!hub.unregister(&id));
        assert!(!hub.contains(&id));
        assert!(!hub.deliver(&id, Arc::from("late")));
        assert!(hub.is_empty());
    }

    #[test]
    fn test_hub_closed_receiver() {
        let hub = Hub::new();
        let id = ConnectionId::new("conn-1");
        drop(hub.register(id.clone()));

        assert!(!hub.deliver(&id, Arc::from("x")));
    }
}
