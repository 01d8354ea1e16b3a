//! Connection registry: single source of truth for "is this user reachable
//! right now" on a given channel.
//!
//! One registry instance exists per WebSocket channel (messaging, calls).
//! Each user has at most one tracked connection; a second connection from the
//! same user replaces the first (last-writer-wins). Removal is guarded by the
//! connection id so a stale actor's cleanup cannot evict its replacement.

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Sender half of a connection's outbound channel. Cloning it lets any part
/// of the system push frames to that client.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub connection_id: Uuid,
    pub sender: ConnectionSender,
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<String, ConnectionHandle>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection for a user, replacing any existing mapping.
    /// Returns the new connection's id.
    pub fn register(&self, user_id: &str, sender: ConnectionSender) -> Uuid {
        let connection_id = Uuid::now_v7();
        self.connections.insert(
            user_id.to_string(),
            ConnectionHandle {
                connection_id,
                sender,
            },
        );
        connection_id
    }

    /// Remove the user's mapping, but only if it still belongs to
    /// `connection_id`. Returns whether an entry was removed — callers gate
    /// disconnect side effects (presence, rooms, call policy) on this.
    pub fn unregister(&self, user_id: &str, connection_id: Uuid) -> bool {
        self.connections
            .remove_if(user_id, |_, handle| handle.connection_id == connection_id)
            .is_some()
    }

    pub fn is_connected(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// Push a frame to a user's live connection. Returns false when the user
    /// has no connection on this channel.
    pub fn send_to_user(&self, user_id: &str, message: Message) -> bool {
        match self.connections.get(user_id) {
            Some(handle) => handle.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Push a frame to every connection on this channel.
    pub fn broadcast_all(&self, message: Message) {
        for entry in self.connections.iter() {
            let _ = entry.value().sender.send(message.clone());
        }
    }

    pub fn connected_count(&self) -> usize {
        self.connections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> (ConnectionSender, mpsc::UnboundedReceiver<Message>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn second_connection_replaces_first() {
        let registry = ConnectionRegistry::new();
        let (tx_a, mut rx_a) = channel();
        let (tx_b, mut rx_b) = channel();

        registry.register("u1", tx_a);
        registry.register("u1", tx_b);

        assert!(registry.send_to_user("u1", Message::Text("hi".into())));
        assert!(rx_b.try_recv().is_ok());
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn stale_unregister_does_not_evict_replacement() {
        let registry = ConnectionRegistry::new();
        let (tx_a, _rx_a) = channel();
        let (tx_b, _rx_b) = channel();

        let first = registry.register("u1", tx_a);
        let _second = registry.register("u1", tx_b);

        // The first actor's cleanup runs after the user already reconnected.
        assert!(!registry.unregister("u1", first));
        assert!(registry.is_connected("u1"));
    }

    #[test]
    fn matched_unregister_removes_entry() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = channel();
        let id = registry.register("u1", tx);

        assert!(registry.unregister("u1", id));
        assert!(!registry.is_connected("u1"));
        assert!(!registry.send_to_user("u1", Message::Text("hi".into())));
    }
}
