//! Realtime broadcast hub for the shop.
//!
//! Fans order and announcement events out to every connected WebSocket
//! session. Slow consumers are disconnected rather than allowed to stall
//! delivery to everyone else.
//!
//! # Key Components
//!
//! - [`HubHandle`]: Handle for registering sessions and broadcasting events
//! - [`spawn_hub`]: Starts the hub actor task
//! - [`Session`] / [`SessionQueue`]: Hub-side and transport-side halves of a connection
//! - [`Event`]: Typed events and their JSON wire format
//! - [`serve_socket`]: Drives one upgraded WebSocket against the hub

pub mod config;
pub mod error;
pub mod event;
pub mod hub;
pub mod session;
pub mod transport;

pub use config::{HeartbeatConfig, HubConfig};
pub use error::{HubError, HubResult};
pub use event::{Event, Payload};
pub use hub::{spawn_hub, HubHandle, HubMsg, HubStats, HubTask};
pub use session::{DeliveryFault, Session, SessionId, SessionQueue, Transport};
pub use transport::{serve_socket, WsTransport};
