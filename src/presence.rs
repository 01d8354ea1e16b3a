//! Presence tracking and broadcast.
//!
//! Online/offline transitions are derived from the messaging channel's
//! connection registry: gaining a user mapping publishes `user:online`,
//! losing the last one publishes `user:offline`. Broadcasts go to every
//! connection, not to a room. The fan-out engine and the call manager read
//! this map when deciding socket-vs-push delivery.

use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::registry::ConnectionRegistry;
use crate::ws::protocol::{self, ChatServerEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceStatus {
    Online,
    Offline,
}

#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub status: PresenceStatus,
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct PresenceMap {
    inner: DashMap<String, PresenceEntry>,
}

impl PresenceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_online(&self, user_id: &str) {
        self.inner.insert(
            user_id.to_string(),
            PresenceEntry {
                status: PresenceStatus::Online,
                last_seen: Utc::now(),
            },
        );
    }

    /// Mark the user offline and return the recorded last-seen timestamp.
    pub fn set_offline(&self, user_id: &str) -> DateTime<Utc> {
        let last_seen = Utc::now();
        self.inner.insert(
            user_id.to_string(),
            PresenceEntry {
                status: PresenceStatus::Offline,
                last_seen,
            },
        );
        last_seen
    }

    /// A user with no entry has never connected and counts as offline.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.inner
            .get(user_id)
            .map(|entry| entry.status == PresenceStatus::Online)
            .unwrap_or(false)
    }

    pub fn get(&self, user_id: &str) -> Option<PresenceEntry> {
        self.inner.get(user_id).map(|entry| entry.value().clone())
    }
}

/// Record the transition and broadcast `user:online` to all connections.
pub fn publish_online(presence: &PresenceMap, registry: &ConnectionRegistry, user_id: &str) {
    presence.set_online(user_id);
    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::UserOnline {
            user_id: user_id.to_string(),
        },
    ) {
        registry.broadcast_all(msg);
    }
}

/// Record the transition and broadcast `user:offline` to all connections.
pub fn publish_offline(presence: &PresenceMap, registry: &ConnectionRegistry, user_id: &str) {
    let last_seen = presence.set_offline(user_id);
    if let Some(msg) = protocol::encode(
        None,
        &ChatServerEvent::UserOffline {
            user_id: user_id.to_string(),
            last_seen,
        },
    ) {
        registry.broadcast_all(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_user_is_offline() {
        let presence = PresenceMap::new();
        assert!(!presence.is_online("u1"));
    }

    #[test]
    fn online_then_offline_records_last_seen() {
        let presence = PresenceMap::new();
        presence.set_online("u1");
        assert!(presence.is_online("u1"));

        let last_seen = presence.set_offline("u1");
        assert!(!presence.is_online("u1"));
        assert_eq!(presence.get("u1").unwrap().last_seen, last_seen);
    }
}
