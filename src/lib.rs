//! Room presence and membership broker.
//!
//! A WebSocket signaling server: peers connect, announce an identity, and
//! join named rooms; the broker tracks liveness via heartbeats and fans out
//! membership-change events to the other members of each room. Media is
//! negotiated peer-to-peer out of band and never passes through here.

pub mod common;
pub mod config;
pub mod protocol;
pub mod server;
