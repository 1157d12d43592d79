//! Core domain types for the shop realtime services.
//!
//! This crate provides the types shared by the hub, the rate limiter and the
//! server binary:
//! - `Identity`, `Role`: who is on the other end of a connection
//! - `Order`, `OrderItem`: order payloads carried by order events
//! - `Announcement`: announcement payloads carried by announcement events

pub mod announcement;
pub mod error;
pub mod identity;
pub mod order;

pub use announcement::Announcement;
pub use error::{CoreError, Result};
pub use identity::{parse_user_id, Identity, Role, ANONYMOUS_USER_ID};
pub use order::{Order, OrderItem};
