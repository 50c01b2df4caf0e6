//! Event router for Parley.
//!
//! The router turns each inbound event into outbound events addressed to the
//! right audience, updating the registry for joins and disconnects.

use crate::audience::{resolve, Audience, Dispatch};
use crate::connection::ConnectionId;
use crate::error::RelayError;
use crate::hub::{EventSink, Frame};
use crate::registry::{Registry, DEFAULT_MAX_ROOMS};
use crate::room::validate_room_id;
use parley_protocol::{codec, InboundEvent, OutboundEvent};
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Name logged for participants that join without one.
const UNNAMED_PARTICIPANT: &str = "Unknown";

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum number of concurrently open rooms.
    pub max_rooms: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_rooms: DEFAULT_MAX_ROOMS,
        }
    }
}

/// The signaling event router.
#[derive(Debug)]
pub struct Router {
    registry: Registry,
}

impl Router {
    /// Create a router with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    /// Create a router with custom configuration.
    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        info!("Creating router with config: {:?}", config);
        Self {
            registry: Registry::with_max_rooms(config.max_rooms),
        }
    }

    /// The room registry backing this router.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Work out what an inbound event should produce.
    ///
    /// Joins are applied to the registry here; every other event only reads it
    /// later, when its audience is resolved.
    ///
    /// # Errors
    ///
    /// Returns an error if the event names an invalid room or a join would
    /// exceed the room limit. Such events are dropped.
    pub fn route(
        &self,
        sender: &ConnectionId,
        event: InboundEvent,
    ) -> Result<Vec<Dispatch>, RelayError> {
        validate_room_id(event.room_id()).map_err(RelayError::InvalidRoom)?;

        let dispatches = match event {
            InboundEvent::JoinRoom { room_id, user_name } => {
                let outcome = self.registry.join(&room_id, sender)?;
                let display_name = user_name
                    .as_deref()
                    .filter(|n| !n.is_empty())
                    .unwrap_or(UNNAMED_PARTICIPANT);
                info!(
                    connection = %sender,
                    room = %room_id,
                    user = display_name,
                    members = outcome.room_size,
                    "User joined room"
                );

                let mut dispatches = Vec::with_capacity(3);
                if let Some(previous) = outcome.previous_room {
                    dispatches.push(Dispatch::to_room_except(
                        previous,
                        sender.clone(),
                        OutboundEvent::user_disconnected(sender.as_str()),
                    ));
                }
                dispatches.push(Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::user_joined(user_name.as_deref(), sender.as_str()),
                ));
                // Someone is already here, so the newcomer can start a call
                if outcome.room_size > 1 {
                    dispatches.push(Dispatch::to_connection(
                        sender.clone(),
                        OutboundEvent::ExistingUser,
                    ));
                }
                dispatches
            }

            InboundEvent::RejoinCall { room_id, user_name } => {
                let outcome = self.registry.join(&room_id, sender)?;
                info!(
                    connection = %sender,
                    room = %room_id,
                    user = %user_name,
                    members = outcome.room_size,
                    "User rejoined call"
                );

                let mut dispatches = Vec::with_capacity(2);
                if let Some(previous) = outcome.previous_room {
                    dispatches.push(Dispatch::to_room_except(
                        previous,
                        sender.clone(),
                        OutboundEvent::user_disconnected(sender.as_str()),
                    ));
                }
                dispatches.push(Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::UserJoined {
                        user_name,
                        id: sender.to_string(),
                    },
                ));
                dispatches
            }

            InboundEvent::SendMessage { room_id, message } => {
                debug!(
                    connection = %sender,
                    room = %room_id,
                    bytes = message.get().len(),
                    "Message sent to room"
                );
                vec![Dispatch::to_room(
                    room_id,
                    OutboundEvent::ReceiveMessage(message),
                )]
            }

            InboundEvent::CallRequest { room_id } => {
                debug!(connection = %sender, room = %room_id, "Call request");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::CallRequest {
                        caller_id: sender.to_string(),
                    },
                )]
            }

            InboundEvent::Offer { room_id, offer } => {
                debug!(connection = %sender, room = %room_id, "Offer received");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::Offer {
                        offer,
                        sender: sender.to_string(),
                    },
                )]
            }

            InboundEvent::Answer { room_id, answer } => {
                debug!(connection = %sender, room = %room_id, "Answer received");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::ReceiveAnswer(answer),
                )]
            }

            InboundEvent::IceCandidate { room_id, candidate } => {
                debug!(connection = %sender, room = %room_id, "ICE candidate received");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::NewIceCandidate(candidate),
                )]
            }

            InboundEvent::CallRejected { room_id } => {
                debug!(connection = %sender, room = %room_id, "Call rejected");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::CallRejected {
                        user_id: sender.to_string(),
                    },
                )]
            }

            InboundEvent::EndCall { room_id } => {
                debug!(connection = %sender, room = %room_id, "End call");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::CallEnded,
                )]
            }
        };

        Ok(dispatches)
    }

    /// Remove a departed connection and notify the rest of its room.
    ///
    /// A connection that never joined a room produces nothing.
    pub fn disconnect(&self, sender: &ConnectionId) -> Vec<Dispatch> {
        match self.registry.leave(sender) {
            Some(room_id) => {
                info!(connection = %sender, room = %room_id, "User left room");
                vec![Dispatch::to_room_except(
                    room_id,
                    sender.clone(),
                    OutboundEvent::user_disconnected(sender.as_str()),
                )]
            }
            None => {
                debug!(connection = %sender, "Disconnected without a room");
                Vec::new()
            }
        }
    }

    /// Resolve an audience to connection IDs using current membership.
    #[must_use]
    pub fn targets(&self, audience: &Audience) -> Vec<ConnectionId> {
        match audience.room() {
            Some(room) => resolve(audience, &self.registry.members(room)),
            None => resolve(audience, &[]),
        }
    }

    /// Encode and hand each dispatch to its recipients.
    ///
    /// Returns the number of frames handed off.
    pub fn deliver(&self, dispatches: Vec<Dispatch>, sink: &dyn EventSink) -> usize {
        let mut delivered = 0;

        for dispatch in dispatches {
            let targets = self.targets(&dispatch.audience);
            if targets.is_empty() {
                trace!(event = dispatch.event.name(), "No recipients");
                continue;
            }

            let frame: Frame = match codec::encode(&dispatch.event) {
                Ok(text) => Arc::from(text),
                Err(e) => {
                    warn!(event = dispatch.event.name(), error = %e, "Failed to encode event");
                    continue;
                }
            };

            for target in &targets {
                if sink.deliver(target, Arc::clone(&frame)) {
                    delivered += 1;
                } else {
                    debug!(connection = %target, event = dispatch.event.name(), "Delivery failed");
                }
            }

            trace!(
                event = dispatch.event.name(),
                recipients = targets.len(),
                "Dispatched event"
            );
        }

        delivered
    }

    /// Route an inbound event and deliver the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the event was dropped; see [`Router::route`].
    pub fn handle(
        &self,
        sender: &ConnectionId,
        event: InboundEvent,
        sink: &dyn EventSink,
    ) -> Result<usize, RelayError> {
        let dispatches = self.route(sender, event)?;
        Ok(self.deliver(dispatches, sink))
    }

    /// Clean up a departed connection and deliver the notifications.
    pub fn handle_disconnect(&self, sender: &ConnectionId, sink: &dyn EventSink) -> usize {
        let dispatches = self.disconnect(sender);
        self.deliver(dispatches, sink)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
