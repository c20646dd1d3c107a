//! Per-connection member state and the single send path to that connection.

use std::sync::OnceLock;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;

use crate::protocol::{PresenceState, ServerMessage, encode};

/// Commands for the writer task that owns the WebSocket sink.
#[derive(Debug, PartialEq, Eq)]
pub enum Outbound {
    /// An encoded JSON text frame.
    Frame(String),
    /// A heartbeat probe (WebSocket ping).
    Ping,
    /// Forceful termination: flush a close frame and stop writing.
    Close,
}

/// One connected peer's identity and session state inside the broker.
///
/// The registry and the presence monitor only hold references; the writer
/// task owns the transport. All mutable fields are internally synchronized,
/// so a `Member` can be touched concurrently from its own connection task and
/// from other connections' broadcast paths.
pub struct Member {
    /// Caller-supplied opaque identifier, set exactly once: the first
    /// non-empty `hello` wins and later attempts are ignored.
    peer_id: OnceLock<String>,
    outbound: mpsc::UnboundedSender<Outbound>,
    current_room: Mutex<Option<String>>,
    liveness: Mutex<Liveness>,
}

struct Liveness {
    state: PresenceState,
    last_reply: Instant,
}

impl Member {
    /// Create a member for a freshly accepted connection.
    ///
    /// Starts in purgatory: a member is not considered confirmed-alive until
    /// its first heartbeat round-trip succeeds.
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>) -> Self {
        Self {
            peer_id: OnceLock::new(),
            outbound,
            current_room: Mutex::new(None),
            liveness: Mutex::new(Liveness {
                state: PresenceState::Purgatory,
                last_reply: Instant::now(),
            }),
        }
    }

    /// Assign the peer ID. Returns `false` if one was already set (the new
    /// value is discarded).
    pub fn set_peer_id(&self, peer_id: String) -> bool {
        self.peer_id.set(peer_id).is_ok()
    }

    pub fn peer_id(&self) -> Option<&str> {
        self.peer_id.get().map(String::as_str)
    }

    pub async fn current_room(&self) -> Option<String> {
        self.current_room.lock().await.clone()
    }

    pub async fn set_current_room(&self, room: Option<String>) {
        *self.current_room.lock().await = room;
    }

    /// Enqueue a message for delivery. Best-effort: once the writer task is
    /// gone (connection closed) this is a no-op, so broadcast loops racing
    /// with disconnects need no special casing.
    pub fn send(&self, message: &ServerMessage) {
        let _ = self.outbound.send(Outbound::Frame(encode(message)));
    }

    /// Enqueue a heartbeat probe.
    pub fn ping(&self) {
        let _ = self.outbound.send(Outbound::Ping);
    }

    /// Forcefully terminate the connection (protocol violation or heartbeat
    /// timeout). Disconnect handling then runs through the ordinary
    /// departure path.
    pub fn close(&self) {
        let _ = self.outbound.send(Outbound::Close);
    }

    /// Record a heartbeat reply. Returns `true` if this revived the member
    /// out of purgatory, in which case the caller broadcasts the alive
    /// notification.
    pub async fn heartbeat_reply(&self) -> bool {
        let mut liveness = self.liveness.lock().await;
        liveness.last_reply = Instant::now();
        if liveness.state == PresenceState::Purgatory {
            liveness.state = PresenceState::Alive;
            true
        } else {
            false
        }
    }

    /// Mark the member possibly-lost. Returns `true` only on the actual
    /// alive-to-purgatory transition, so the notification fires once per
    /// silence, not once per probe.
    pub async fn mark_lost(&self) -> bool {
        let mut liveness = self.liveness.lock().await;
        if liveness.state == PresenceState::Alive {
            liveness.state = PresenceState::Purgatory;
            true
        } else {
            false
        }
    }

    /// Current liveness state and time since the last confirmed reply.
    pub async fn liveness_snapshot(&self) -> (PresenceState, Duration) {
        let liveness = self.liveness.lock().await;
        (liveness.state, liveness.last_reply.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel_member() -> (Member, mpsc::UnboundedReceiver<Outbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Member::new(tx), rx)
    }

    #[test]
    fn first_peer_id_wins() {
        // given:
        let (member, _rx) = channel_member();

        // when:
        let first = member.set_peer_id("alice".to_string());
        let second = member.set_peer_id("mallory".to_string());

        // then:
        assert!(first);
        assert!(!second);
        assert_eq!(member.peer_id(), Some("alice"));
    }

    #[tokio::test]
    async fn send_after_close_is_a_no_op() {
        // given: the writer side of the connection is gone
        let (member, rx) = channel_member();
        drop(rx);

        // when / then: no panic, no error surfaced
        member.send(&ServerMessage::Hello);
        member.ping();
        member.close();
    }

    #[tokio::test]
    async fn send_enqueues_encoded_frame() {
        // given:
        let (member, mut rx) = channel_member();

        // when:
        member.send(&ServerMessage::Hello);

        // then:
        assert_eq!(
            rx.recv().await,
            Some(Outbound::Frame(r#"{"type":"hello"}"#.to_string()))
        );
    }

    #[tokio::test]
    async fn starts_in_purgatory_and_revives_on_first_reply() {
        // given:
        let (member, _rx) = channel_member();
        let (state, _) = member.liveness_snapshot().await;
        assert_eq!(state, PresenceState::Purgatory);

        // when:
        let revived = member.heartbeat_reply().await;

        // then:
        assert!(revived);
        let (state, _) = member.liveness_snapshot().await;
        assert_eq!(state, PresenceState::Alive);
    }

    #[tokio::test]
    async fn repeated_replies_do_not_report_revival() {
        // given:
        let (member, _rx) = channel_member();
        member.heartbeat_reply().await;

        // when:
        let revived_again = member.heartbeat_reply().await;

        // then:
        assert!(!revived_again);
    }

    #[tokio::test]
    async fn mark_lost_fires_only_on_transition() {
        // given: an alive member
        let (member, _rx) = channel_member();
        member.heartbeat_reply().await;

        // when:
        let first = member.mark_lost().await;
        let second = member.mark_lost().await;

        // then:
        assert!(first);
        assert!(!second);
        let (state, _) = member.liveness_snapshot().await;
        assert_eq!(state, PresenceState::Purgatory);
    }
}
