//! Announcement payloads.

use serde::{Deserialize, Serialize};

/// A store-wide announcement published by an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: i64,
    pub title: String,
    pub content: String,
}
