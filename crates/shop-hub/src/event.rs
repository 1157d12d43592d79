//! Events fanned out to connected sessions.
//!
//! Events are immutable once built. The hub serializes each event exactly
//! once and hands every session a reference-counted copy of the same bytes.

use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use shop_core::{Announcement, Order};

use crate::error::HubResult;

/// Serialized event, shared by every session queue it is enqueued to.
///
/// Cloning bumps a reference count, and the writer hands the same bytes to
/// the WebSocket frame without copying.
pub type Payload = Utf8Bytes;

/// Event pushed by business logic after a state change commits.
///
/// Wire format is an internally tagged JSON object, e.g.
/// `{"type":"new_order","order":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// An order was placed.
    NewOrder { order: Order },
    /// An existing order changed status.
    OrderStatus { order: Order },
    /// An admin published an announcement.
    Announcement { announcement: Announcement },
}

impl Event {
    pub fn new_order(order: Order) -> Self {
        Self::NewOrder { order }
    }

    pub fn order_status(order: Order) -> Self {
        Self::OrderStatus { order }
    }

    pub fn announcement(announcement: Announcement) -> Self {
        Self::Announcement { announcement }
    }

    /// Wire tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewOrder { .. } => "new_order",
            Self::OrderStatus { .. } => "order_status",
            Self::Announcement { .. } => "announcement",
        }
    }

    /// Id of the entity the event refers to, for logging.
    pub fn subject_id(&self) -> i64 {
        match self {
            Self::NewOrder { order } | Self::OrderStatus { order } => order.id,
            Self::Announcement { announcement } => announcement.id,
        }
    }

    /// Serialize into a shareable payload.
    pub fn to_payload(&self) -> HubResult<Payload> {
        Ok(Utf8Bytes::from(serde_json::to_string(self)?))
    }
}
