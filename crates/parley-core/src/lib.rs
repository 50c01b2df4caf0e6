//! # parley-core
//!
//! Room membership and event routing for the Parley signaling relay.
//!
//! This crate provides the building blocks the transport drives:
//!
//! - **Registry** - Which connection is in which room
//! - **Router** - Turns inbound events into addressed outbound events
//! - **Audience** - Pure resolution of recipients from room membership
//! - **Hub** - Outbound queues of live connections
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Connection │────▶│   Router    │────▶│     Hub     │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │
//!                            ▼
//!                     ┌─────────────┐
//!                     │  Registry   │
//!                     └─────────────┘
//! ```

pub mod audience;
pub mod connection;
pub mod error;
pub mod hub;
pub mod registry;
pub mod room;
pub mod router;

pub use audience::{resolve, Audience, Dispatch};
pub use connection::ConnectionId;
pub use error::RelayError;
pub use hub::{EventSink, Frame, Hub};
pub use registry::{JoinOutcome, Registry, RegistryStats};
pub use room::{Room, RoomId};
pub use router::{Router, RouterConfig};
