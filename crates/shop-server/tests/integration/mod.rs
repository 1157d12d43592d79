//! Integration tests for shop-server.
//!
//! These drive a real server over TCP:
//! - WebSocket session lifecycle through the hub
//! - Event ingress and fan-out
//! - Rate limiting at the HTTP edge

pub mod common;
