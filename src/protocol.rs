//! Wire protocol for the signaling connection.
//!
//! Every WebSocket text frame carries exactly one JSON message with a `type`
//! string discriminator. The vocabulary is a closed set, one enum variant per
//! kind, split by direction: [`ClientMessage`] for inbound frames and
//! [`ServerMessage`] for outbound ones. Field names keep the casing the
//! browser clients use on the wire (`peerID`).
//!
//! Heartbeat probes and replies are WebSocket ping/pong control frames, not
//! part of this vocabulary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure to decode an inbound frame.
///
/// Per the connection policy this is non-fatal: the frame is dropped and the
/// connection stays open.
#[derive(Debug, Error)]
#[error("malformed message: {0}")]
pub struct CodecError(#[from] serde_json::Error);

/// Messages sent by a client to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// Identity announcement; must be the first logical message. An empty
    /// `peerID` is a protocol violation.
    Hello {
        #[serde(rename = "peerID", default)]
        peer_id: String,
    },
    /// Request to join the named room.
    JoinRoom { room: String },
    /// Request to leave the named room.
    LeaveRoom { room: String },
}

/// Messages sent by the broker to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// Greeting, sent immediately after the connection is accepted.
    Hello,
    /// Response to a join request. `members` lists the peers already in the
    /// room, excluding the recipient itself.
    JoinRoom {
        room: String,
        members: Vec<String>,
        success: bool,
    },
    /// Notification to existing members that a peer joined their room.
    MemberJoin {
        room: String,
        #[serde(rename = "peerID")]
        peer_id: String,
    },
    /// Notification that a peer left a room. Also echoed to the leaver
    /// itself as confirmation that the departure was processed.
    MemberLeft {
        room: String,
        #[serde(rename = "peerID")]
        peer_id: String,
    },
    /// Notification that a member's liveness state changed.
    MemberConnection {
        room: String,
        #[serde(rename = "peerID")]
        peer_id: String,
        state: PresenceState,
    },
}

/// Liveness state of a member as seen by the presence monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceState {
    /// A heartbeat reply has been seen recently.
    Alive,
    /// No confirmed reply recently; presumed possibly disconnected but not
    /// yet evicted.
    Purgatory,
}

/// Decode one inbound text frame.
pub fn decode(text: &str) -> Result<ClientMessage, CodecError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode one outbound message as a JSON text frame.
pub fn encode(message: &ServerMessage) -> String {
    // Serialization of a ServerMessage cannot fail: no non-string keys, no
    // fallible Serialize impls.
    serde_json::to_string(message).expect("ServerMessage serializes to JSON")
}
