//! Room membership: conversation-scoped broadcast groups.
//!
//! A room is keyed by conversation id. Membership is populated when a
//! connection authenticates (one room per conversation the user belongs to),
//! adjusted by explicit join/leave events, and cleared on disconnect.

use std::collections::HashSet;

use axum::extract::ws::Message;
use dashmap::DashMap;

use crate::registry::ConnectionRegistry;

#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// room id -> member user ids
    members: DashMap<String, HashSet<String>>,
    /// user id -> joined room ids (reverse index for disconnect cleanup)
    joined: DashMap<String, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, room_id: &str, user_id: &str) {
        self.members
            .entry(room_id.to_string())
            .or_default()
            .insert(user_id.to_string());
        self.joined
            .entry(user_id.to_string())
            .or_default()
            .insert(room_id.to_string());
    }

    pub fn leave(&self, room_id: &str, user_id: &str) {
        if let Some(mut entry) = self.members.get_mut(room_id) {
            entry.remove(user_id);
            if entry.is_empty() {
                drop(entry);
                self.members.remove(room_id);
            }
        }
        if let Some(mut entry) = self.joined.get_mut(user_id) {
            entry.remove(room_id);
        }
    }

    /// Remove the user from every room. Returns the rooms left.
    pub fn leave_all(&self, user_id: &str) -> Vec<String> {
        let rooms: Vec<String> = self
            .joined
            .remove(user_id)
            .map(|(_, rooms)| rooms.into_iter().collect())
            .unwrap_or_default();
        for room_id in &rooms {
            if let Some(mut entry) = self.members.get_mut(room_id) {
                entry.remove(user_id);
                if entry.is_empty() {
                    drop(entry);
                    self.members.remove(room_id);
                }
            }
        }
        rooms
    }

    pub fn members(&self, room_id: &str) -> Vec<String> {
        self.members
            .get(room_id)
            .map(|entry| entry.value().iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Fan a frame out to every member's live connection, optionally
    /// excluding the sender. Delivery is at-most-once per connection;
    /// members without a live connection are skipped.
    pub fn broadcast(
        &self,
        registry: &ConnectionRegistry,
        room_id: &str,
        message: Message,
        exclude_user: Option<&str>,
    ) {
        for member in self.members(room_id) {
            if exclude_user.is_some_and(|excluded| excluded == member) {
                continue;
            }
            registry.send_to_user(&member, message.clone());
        }
    }
}
