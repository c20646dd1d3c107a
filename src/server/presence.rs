//! Presence monitor: the periodic heartbeat driver for one connection.
//!
//! Each accepted connection gets its own monitor task. Every probe interval
//! the task looks at how long the member has been silent and either probes
//! it, marks it possibly-lost, or kicks it. Replies are observed by the
//! connection's read loop, which refreshes the timestamp and broadcasts the
//! revival; presence notifications therefore fire only on an actual state
//! change, never once per probe.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;

use crate::config::HeartbeatSettings;
use crate::protocol::PresenceState;

use super::member::Member;
use super::state::AppState;

/// What the monitor should do on a given tick.
#[derive(Debug, PartialEq, Eq)]
enum ProbeAction {
    /// Silent past the hard-kick threshold: close the connection.
    Kick,
    /// Alive but silent past the possibly-lost threshold: mark purgatory.
    MarkLost,
    /// Send a heartbeat probe.
    Probe,
}

fn next_action(
    state: PresenceState,
    elapsed: Duration,
    settings: &HeartbeatSettings,
) -> ProbeAction {
    if elapsed >= settings.kick_after() {
        ProbeAction::Kick
    } else if state == PresenceState::Alive && elapsed >= settings.lost_after() {
        ProbeAction::MarkLost
    } else {
        ProbeAction::Probe
    }
}

/// Spawn the monitor task for a member. The acceptor aborts the handle when
/// the connection ends, so no timer outlives its member.
pub(super) fn spawn_monitor(member: Arc<Member>, state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(state.heartbeat.probe_interval());
        // The first tick of a tokio interval completes immediately; skip it
        // so probing starts one interval after accept.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let (liveness, elapsed) = member.liveness_snapshot().await;
            match next_action(liveness, elapsed, &state.heartbeat) {
                ProbeAction::Kick => {
                    if let Some(peer_id) = member.peer_id() {
                        tracing::info!(
                            "'{}' silent for {:?}, kicking connection",
                            peer_id,
                            elapsed
                        );
                    }
                    member.close();
                    break;
                }
                ProbeAction::MarkLost => {
                    if member.mark_lost().await {
                        if let Some(room) = member.current_room().await {
                            state
                                .registry
                                .notify_presence(&member, &room, PresenceState::Purgatory)
                                .await;
                        }
                    }
                }
                ProbeAction::Probe => member.ping(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::protocol::ServerMessage;

    use super::super::member::Outbound;

    fn settings() -> HeartbeatSettings {
        HeartbeatSettings::default()
    }

    #[test]
    fn probes_while_fresh() {
        assert_eq!(
            next_action(PresenceState::Alive, Duration::from_secs(3), &settings()),
            ProbeAction::Probe
        );
        assert_eq!(
            next_action(PresenceState::Purgatory, Duration::from_secs(3), &settings()),
            ProbeAction::Probe
        );
    }

    #[test]
    fn marks_lost_only_from_alive() {
        // An alive member past the threshold transitions.
        assert_eq!(
            next_action(PresenceState::Alive, Duration::from_secs(6), &settings()),
            ProbeAction::MarkLost
        );
        // A member already in purgatory just keeps being probed.
        assert_eq!(
            next_action(PresenceState::Purgatory, Duration::from_secs(6), &settings()),
            ProbeAction::Probe
        );
    }

    #[test]
    fn kicks_at_hard_threshold_regardless_of_state() {
        assert_eq!(
            next_action(PresenceState::Alive, Duration::from_secs(30), &settings()),
            ProbeAction::Kick
        );
        assert_eq!(
            next_action(PresenceState::Purgatory, Duration::from_secs(30), &settings()),
            ProbeAction::Kick
        );
    }

    #[tokio::test(start_paused = true)]
    async fn silent_member_is_probed_then_kicked() {
        // given: a member that never replies to anything
        let state = Arc::new(AppState::new(settings()));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let member = Arc::new(Member::new(tx));

        // when:
        let monitor = spawn_monitor(member.clone(), state.clone());

        // then: probes at every interval until the hard-kick threshold
        let mut pings = 0;
        loop {
            match rx.recv().await {
                Some(Outbound::Ping) => pings += 1,
                Some(Outbound::Close) => break,
                other => panic!("unexpected outbound command: {other:?}"),
            }
        }
        // Probes at 3..=27 time-units, kick at 30.
        assert_eq!(pings, 9);
        monitor.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn sustained_silence_notifies_purgatory_exactly_once() {
        // given: alice and bob share a room; bob confirmed alive once, then
        // goes silent for good
        let state = Arc::new(AppState::new(settings()));
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let alice = Arc::new(Member::new(alice_tx));
        alice.set_peer_id("alice".to_string());
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let bob = Arc::new(Member::new(bob_tx));
        bob.set_peer_id("bob".to_string());

        state.registry.join(&alice, "lobby").await;
        state.registry.join(&bob, "lobby").await;
        while alice_rx.try_recv().is_ok() {} // drain join traffic
        while bob_rx.try_recv().is_ok() {}

        bob.heartbeat_reply().await;

        // when: the monitor runs bob all the way to the kick
        let monitor = spawn_monitor(bob.clone(), state.clone());
        loop {
            match bob_rx.recv().await {
                Some(Outbound::Close) => break,
                Some(_) => {}
                None => panic!("bob's channel closed unexpectedly"),
            }
        }
        monitor.await.unwrap();

        // then: alice saw exactly one purgatory notification, not one per
        // probe
        let mut purgatory_notices = 0;
        while let Ok(command) = alice_rx.try_recv() {
            let Outbound::Frame(json) = command else {
                continue;
            };
            let msg: ServerMessage = serde_json::from_str(&json).unwrap();
            if let ServerMessage::MemberConnection { peer_id, state, .. } = msg {
                assert_eq!(peer_id, "bob");
                assert_eq!(state, PresenceState::Purgatory);
                purgatory_notices += 1;
            }
        }
        assert_eq!(purgatory_notices, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reply_keeps_member_alive_and_unannounced() {
        // given: a member in a room with an observer
        let state = Arc::new(AppState::new(settings()));
        let (alice_tx, mut alice_rx) = mpsc::unbounded_channel();
        let alice = Arc::new(Member::new(alice_tx));
        alice.set_peer_id("alice".to_string());
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        let bob = Arc::new(Member::new(bob_tx));
        bob.set_peer_id("bob".to_string());
        state.registry.join(&alice, "lobby").await;
        state.registry.join(&bob, "lobby").await;
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}
        bob.heartbeat_reply().await;

        // when: bob answers every probe for a while, then the test stops
        let monitor = spawn_monitor(bob.clone(), state.clone());
        for _ in 0..5 {
            match bob_rx.recv().await {
                Some(Outbound::Ping) => {
                    bob.heartbeat_reply().await;
                }
                other => panic!("expected a probe, got {other:?}"),
            }
        }
        monitor.abort();

        // then: a responsive member generates no presence traffic at all
        assert!(alice_rx.try_recv().is_err());
        let (liveness, _) = bob.liveness_snapshot().await;
        assert_eq!(liveness, PresenceState::Alive);
    }
}
