//! In-memory call session registry and state machine.
//!
//! Status transitions are monotonic: `ringing -> active -> ended`, or
//! `ringing -> ended` directly (missed/rejected). A session's status is only
//! read or written while holding the DashMap entry's exclusive guard;
//! methods return owned snapshots so callers never await I/O with a guard
//! held. Sessions are removed at their terminal outcome and survive benign
//! disconnects while ringing.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use uuid::Uuid;

use crate::clients::{CallKind, CallOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Ringing,
    Active,
    Ended,
}

#[derive(Debug, Clone)]
pub struct CallSession {
    pub call_id: String,
    /// Id of the persisted call record, when the call service accepted one.
    pub record_id: Option<String>,
    /// `None` only for placeholder sessions reconstructed on answer.
    pub conversation_id: Option<String>,
    pub initiator_id: String,
    /// Initiator first, invited participants after.
    pub participant_ids: Vec<String>,
    pub call_type: CallKind,
    pub started_at: DateTime<Utc>,
    pub status: CallStatus,
}

/// Result of answering a call.
#[derive(Debug)]
pub enum Answered {
    Existing(CallSession),
    /// The session was missing (process restart, initiator reconnect race);
    /// a placeholder with the answering user as sole known participant was
    /// inserted so the call can continue.
    Reconstructed(CallSession),
}

/// A call removed from the registry with its classified outcome.
#[derive(Debug)]
pub struct EndedCall {
    pub session: CallSession,
    pub outcome: CallOutcome,
    pub duration_secs: u64,
}

#[derive(Debug, Default)]
pub struct CallSessionManager {
    sessions: DashMap<String, CallSession>,
}

impl CallSessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new ringing session. The participant list always includes
    /// the initiator, first, with duplicates dropped.
    pub fn create(
        &self,
        conversation_id: &str,
        initiator_id: &str,
        invited: &[String],
        call_type: CallKind,
    ) -> CallSession {
        let call_id = Uuid::now_v7().to_string();
        let mut participant_ids = vec![initiator_id.to_string()];
        for participant in invited {
            if !participant_ids.contains(participant) {
                participant_ids.push(participant.clone());
            }
        }
        let session = CallSession {
            call_id: call_id.clone(),
            record_id: None,
            conversation_id: Some(conversation_id.to_string()),
            initiator_id: initiator_id.to_string(),
            participant_ids,
            call_type,
            started_at: Utc::now(),
            status: CallStatus::Ringing,
        };
        self.sessions.insert(call_id, session.clone());
        session
    }

    pub fn set_record_id(&self, call_id: &str, record_id: String) {
        if let Some(mut entry) = self.sessions.get_mut(call_id) {
            entry.record_id = Some(record_id);
        }
    }

    /// Mark the session active and record the answering user's membership.
    /// A missing session is reconstructed instead of rejected, trading strict
    /// consistency for call continuity.
    pub fn answer(&self, call_id: &str, user_id: &str) -> Answered {
        match self.sessions.entry(call_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let session = occupied.get_mut();
                if session.status == CallStatus::Ringing {
                    session.status = CallStatus::Active;
                }
                if !session.participant_ids.iter().any(|p| p == user_id) {
                    session.participant_ids.push(user_id.to_string());
                }
                Answered::Existing(session.clone())
            }
            Entry::Vacant(vacant) => {
                let session = CallSession {
                    call_id: call_id.to_string(),
                    record_id: None,
                    conversation_id: None,
                    initiator_id: user_id.to_string(),
                    participant_ids: vec![user_id.to_string()],
                    // Call type is unknown for a reconstructed session.
                    call_type: CallKind::Audio,
                    started_at: Utc::now(),
                    status: CallStatus::Active,
                };
                vacant.insert(session.clone());
                Answered::Reconstructed(session)
            }
        }
    }

    /// Remove a session unconditionally (reject path). `None` when no
    /// session exists for the id.
    pub fn remove(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.remove(call_id).map(|(_, mut session)| {
            session.status = CallStatus::Ended;
            session
        })
    }

    /// Atomically remove the session and classify the outcome: a call still
    /// ringing ends as `missed` with zero duration, an answered call as
    /// `completed` with `now - started_at`.
    pub fn end(&self, call_id: &str) -> Option<EndedCall> {
        let (_, mut session) = self.sessions.remove(call_id)?;
        let (outcome, duration_secs) = match session.status {
            CallStatus::Ringing => (CallOutcome::Missed, 0),
            _ => (
                CallOutcome::Completed,
                (Utc::now() - session.started_at).num_seconds().max(0) as u64,
            ),
        };
        session.status = CallStatus::Ended;
        Some(EndedCall {
            session,
            outcome,
            duration_secs,
        })
    }

    pub fn get(&self, call_id: &str) -> Option<CallSession> {
        self.sessions.get(call_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every session this user participates in.
    pub fn sessions_with(&self, user_id: &str) -> Vec<CallSession> {
        self.sessions
            .iter()
            .filter(|entry| entry.participant_ids.iter().any(|p| p == user_id))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Ringing sessions where this user is an invited (non-initiating)
    /// participant — the set re-delivered after a reconnect.
    pub fn ringing_for(&self, user_id: &str) -> Vec<CallSession> {
        self.sessions
            .iter()
            .filter(|entry| {
                entry.status == CallStatus::Ringing
                    && entry.initiator_id != user_id
                    && entry.participant_ids.iter().any(|p| p == user_id)
            })
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_call(invited: &[&str]) -> (CallSessionManager, String) {
        let manager = CallSessionManager::new();
        let invited: Vec<String> = invited.iter().map(|s| s.to_string()).collect();
        let session = manager.create("c1", "u1", &invited, CallKind::Video);
        (manager, session.call_id)
    }

    #[test]
    fn participant_list_starts_with_initiator() {
        let manager = CallSessionManager::new();
        let session = manager.create(
            "c1",
            "u1",
            &["u2".to_string(), "u1".to_string(), "u2".to_string()],
            CallKind::Audio,
        );
        assert_eq!(session.participant_ids, vec!["u1", "u2"]);
        assert_eq!(session.status, CallStatus::Ringing);
    }

    #[test]
    fn answer_moves_ringing_to_active_once() {
        let (manager, call_id) = manager_with_call(&["u2"]);

        let first = manager.answer(&call_id, "u2");
        let session = match first {
            Answered::Existing(s) => s,
            other => panic!("expected existing session, got {:?}", other),
        };
        assert_eq!(session.status, CallStatus::Active);

        // A second answer must not regress the status.
        match manager.answer(&call_id, "u3") {
            Answered::Existing(s) => {
                assert_eq!(s.status, CallStatus::Active);
                assert!(s.participant_ids.contains(&"u3".to_string()));
            }
            other => panic!("expected existing session, got {:?}", other),
        }
    }

    #[test]
    fn answer_reconstructs_missing_session() {
        let manager = CallSessionManager::new();
        match manager.answer("ghost-call", "u2") {
            Answered::Reconstructed(session) => {
                assert_eq!(session.status, CallStatus::Active);
                assert_eq!(session.participant_ids, vec!["u2"]);
                assert!(session.conversation_id.is_none());
            }
            other => panic!("expected reconstruction, got {:?}", other),
        }
        assert!(manager.get("ghost-call").is_some());
    }

    #[test]
    fn end_while_ringing_is_missed_with_zero_duration() {
        let (manager, call_id) = manager_with_call(&["u2"]);
        let ended = manager.end(&call_id).unwrap();
        assert_eq!(ended.outcome, CallOutcome::Missed);
        assert_eq!(ended.duration_secs, 0);
        assert!(manager.get(&call_id).is_none());
    }

    #[test]
    fn end_after_answer_is_completed() {
        let (manager, call_id) = manager_with_call(&["u2"]);
        manager.answer(&call_id, "u2");
        let ended = manager.end(&call_id).unwrap();
        assert_eq!(ended.outcome, CallOutcome::Completed);
        assert!(manager.get(&call_id).is_none());
    }

    #[test]
    fn end_twice_yields_none_second_time() {
        let (manager, call_id) = manager_with_call(&["u2"]);
        assert!(manager.end(&call_id).is_some());
        assert!(manager.end(&call_id).is_none());
    }

    #[test]
    fn ringing_redelivery_excludes_initiator() {
        let (manager, call_id) = manager_with_call(&["u2"]);
        assert!(manager.ringing_for("u1").is_empty());
        let ringing = manager.ringing_for("u2");
        assert_eq!(ringing.len(), 1);
        assert_eq!(ringing[0].call_id, call_id);

        manager.answer(&call_id, "u2");
        assert!(manager.ringing_for("u2").is_empty());
    }
}
