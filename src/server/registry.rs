//! The authoritative mapping from room name to member set.
//!
//! All joins, leaves, and broadcasts go through one mutex, so operations on
//! any room are serialized: the member list in a join response is never stale
//! relative to a concurrently-arriving join or leave, and no two broadcasts
//! for the same room interleave partially.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::protocol::{PresenceState, ServerMessage};

use super::member::Member;

#[derive(Default)]
struct Room {
    /// Unique by peer ID; insertion order is preserved so broadcast order is
    /// deterministic.
    members: Vec<Arc<Member>>,
}

impl Room {
    fn contains(&self, peer_id: &str) -> bool {
        self.members.iter().any(|m| m.peer_id() == Some(peer_id))
    }

    fn peer_ids(&self) -> Vec<String> {
        self.members
            .iter()
            .filter_map(|m| m.peer_id().map(str::to_string))
            .collect()
    }
}

/// Room-name to member-set registry.
///
/// Rooms are created on first join of an unknown name and deleted
/// synchronously when the last member departs; an empty room never remains in
/// the map.
pub struct RoomRegistry {
    rooms: Mutex<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
        }
    }

    /// Add `member` to the named room.
    ///
    /// Creates the room if it does not exist. The joiner receives a
    /// `join-room` response listing the pre-existing members; those members
    /// receive a `member-join` notification. A duplicate join (peer ID
    /// already present in the target room) changes nothing and notifies
    /// nobody. A member already in a different room leaves it first, with
    /// the ordinary departure broadcasts.
    pub async fn join(&self, member: &Arc<Member>, room_name: &str) {
        if room_name.is_empty() {
            tracing::warn!("join with empty room name ignored");
            return;
        }
        let Some(peer_id) = member.peer_id().map(str::to_string) else {
            tracing::warn!("join to '{}' before hello ignored", room_name);
            return;
        };

        let mut rooms = self.rooms.lock().await;

        // A member belongs to at most one room at a time.
        if let Some(previous) = member.current_room().await {
            if previous != room_name {
                tracing::debug!("'{}' switching rooms: '{}' -> '{}'", peer_id, previous, room_name);
                Self::leave_locked(&mut rooms, member, &previous).await;
            }
        }

        let is_new_room = !rooms.contains_key(room_name);
        let room = rooms.entry(room_name.to_string()).or_default();

        if room.contains(&peer_id) {
            tracing::debug!("duplicate join of '{}' to '{}' ignored", peer_id, room_name);
            return;
        }

        let existing = room.peer_ids();
        room.members.push(Arc::clone(member));
        member.set_current_room(Some(room_name.to_string())).await;

        member.send(&ServerMessage::JoinRoom {
            room: room_name.to_string(),
            members: existing,
            success: true,
        });

        // Only pre-existing members are notified; a brand-new room has none.
        if !is_new_room {
            let notice = ServerMessage::MemberJoin {
                room: room_name.to_string(),
                peer_id: peer_id.clone(),
            };
            for other in &room.members {
                if other.peer_id() != Some(peer_id.as_str()) {
                    other.send(&notice);
                }
            }
        }

        tracing::info!("'{}' joined room '{}' (new: {})", peer_id, room_name, is_new_room);
    }

    /// Remove `member` from the named room.
    ///
    /// Idempotent: an unknown room or a member not present in it is a silent
    /// no-op, so the explicit-leave and disconnect paths can race freely.
    pub async fn leave(&self, member: &Arc<Member>, room_name: &str) {
        let mut rooms = self.rooms.lock().await;
        Self::leave_locked(&mut rooms, member, room_name).await;
    }

    /// Broadcast a liveness change for `member` to every other member of the
    /// named room. Unknown room is a no-op.
    pub async fn notify_presence(&self, member: &Member, room_name: &str, state: PresenceState) {
        let Some(peer_id) = member.peer_id().map(str::to_string) else {
            return;
        };
        let rooms = self.rooms.lock().await;
        let Some(room) = rooms.get(room_name) else {
            return;
        };

        let notice = ServerMessage::MemberConnection {
            room: room_name.to_string(),
            peer_id: peer_id.clone(),
            state,
        };
        for other in &room.members {
            if other.peer_id() != Some(peer_id.as_str()) {
                other.send(&notice);
            }
        }
        tracing::debug!("broadcast presence {:?} for '{}' in room '{}'", state, peer_id, room_name);
    }

    /// Current rooms and their member peer IDs, in broadcast order.
    pub async fn snapshot(&self) -> Vec<(String, Vec<String>)> {
        let rooms = self.rooms.lock().await;
        rooms
            .iter()
            .map(|(name, room)| (name.clone(), room.peer_ids()))
            .collect()
    }

    /// Shared leave path, called with the registry lock already held so a
    /// room switch stays one atomic operation.
    async fn leave_locked(
        rooms: &mut HashMap<String, Room>,
        member: &Arc<Member>,
        room_name: &str,
    ) {
        let Some(peer_id) = member.peer_id().map(str::to_string) else {
            return;
        };
        let Some(room) = rooms.get_mut(room_name) else {
            tracing::debug!("leave of unknown room '{}' by '{}' ignored", room_name, peer_id);
            return;
        };
        let Some(index) = room
            .members
            .iter()
            .position(|m| m.peer_id() == Some(peer_id.as_str()))
        else {
            tracing::debug!("leave of room '{}' by non-member '{}' ignored", room_name, peer_id);
            return;
        };

        let departed = room.members.remove(index);
        departed.set_current_room(None).await;

        let notice = ServerMessage::MemberLeft {
            room: room_name.to_string(),
            peer_id: peer_id.clone(),
        };

        if room.members.is_empty() {
            rooms.remove(room_name);
            tracing::info!("room '{}' is empty, deleted", room_name);
        } else {
            for remaining in &room.members {
                remaining.send(&notice);
            }
        }

        // Confirmation to the leaver itself: this is how a client learns its
        // leave was processed. A no-op if the connection is already gone.
        departed.send(&notice);

        tracing::info!("'{}' left room '{}'", peer_id, room_name);
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}
