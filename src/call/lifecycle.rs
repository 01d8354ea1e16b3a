//! Call lifecycle handlers: initiate, answer, reject, end, plus the
//! disconnect policy and ringing re-delivery on reconnect.
//!
//! Persistence of call metadata is best-effort throughout: the in-memory
//! session is authoritative for signaling, and a call record failure must
//! never lose a call that clients can still hear.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::call::ice;
use crate::call::session::{Answered, CallStatus, EndedCall};
use crate::clients::{CallOutcome, CallRecordDraft, PushKind, PushNotification};
use crate::error::GatewayError;
use crate::notify;
use crate::state::AppState;
use crate::ws::protocol::{self, Ack, CallServerEvent, CallRefPayload, InitiateCallPayload};

/// Start a call: create the ringing session, persist a call record
/// (best-effort), ring connected participants over their sockets, and wake
/// every invited participant with a push regardless of socket reachability —
/// a backgrounded mobile app needs the push to re-establish signaling even
/// while the OS still reports its socket connected.
///
/// The push dispatch is awaited (bounded by `call_push_timeout`) before the
/// ack: for calls, reliability is worth the added setup latency.
pub async fn handle_initiate(
    state: &AppState,
    user_id: &str,
    payload: InitiateCallPayload,
) -> Result<Ack, GatewayError> {
    if payload.participant_ids.iter().all(|p| p == user_id) {
        return Err(GatewayError::BadPayload(
            "a call needs at least one other participant".to_string(),
        ));
    }

    let session = state.calls.create(
        &payload.conversation_id,
        user_id,
        &payload.participant_ids,
        payload.call_type,
    );
    info!(
        call_id = %session.call_id,
        conversation_id = %payload.conversation_id,
        initiator = %user_id,
        call_type = ?payload.call_type,
        "call initiated"
    );

    match state
        .collab
        .calls
        .create_call(&CallRecordDraft {
            conversation_id: payload.conversation_id.clone(),
            initiator_id: user_id.to_string(),
            participant_ids: session.participant_ids.clone(),
            call_type: payload.call_type,
        })
        .await
    {
        Ok(record) => state.calls.set_record_id(&session.call_id, record.id),
        Err(e) => warn!(call_id = %session.call_id, error = %e, "call record creation failed"),
    }

    let invited: Vec<String> = session
        .participant_ids
        .iter()
        .filter(|p| p.as_str() != user_id)
        .cloned()
        .collect();

    if let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::CallIncoming {
            call_id: session.call_id.clone(),
            conversation_id: payload.conversation_id.clone(),
            initiator_id: user_id.to_string(),
            participant_ids: session.participant_ids.clone(),
            call_type: payload.call_type,
        },
    ) {
        for participant in &invited {
            state.call_connections.send_to_user(participant, msg.clone());
        }
    }

    let wake = PushNotification {
        kind: PushKind::CallWake,
        title: "Incoming call".to_string(),
        body: String::new(),
        data: json!({
            "call_id": session.call_id,
            "conversation_id": payload.conversation_id,
            "initiator_id": user_id,
            "call_type": payload.call_type,
        }),
    };
    if tokio::time::timeout(
        state.call_push_timeout,
        notify::dispatch(&state.collab, &invited, &wake),
    )
    .await
    .is_err()
    {
        warn!(call_id = %session.call_id, "call-wake push dispatch timed out");
    }

    Ok(Ack::ok_with(json!({
        "call_id": session.call_id,
        "ice_servers": ice::ice_servers(&state.ice),
    })))
}

/// Answer a call. A missing session (process restart, or a disconnect/
/// reconnect race on the initiator's side) does not reject the answer: a
/// placeholder session is reconstructed and the call continues.
pub async fn handle_answer(
    state: &AppState,
    user_id: &str,
    payload: CallRefPayload,
) -> Result<Ack, GatewayError> {
    let session = match state.calls.answer(&payload.call_id, user_id) {
        Answered::Existing(session) => session,
        Answered::Reconstructed(session) => {
            warn!(
                call_id = %payload.call_id,
                user_id = %user_id,
                "answer for unknown call session, reconstructed placeholder"
            );
            session
        }
    };

    if let Some(record_id) = &session.record_id {
        if let Err(e) = state.collab.calls.participant_joined(record_id, user_id).await {
            warn!(call_id = %session.call_id, error = %e, "failed to persist call join");
        }
    }

    if let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::ParticipantJoined {
            call_id: session.call_id.clone(),
            user_id: user_id.to_string(),
        },
    ) {
        if let Some(conversation_id) = &session.conversation_id {
            state.call_rooms.broadcast(
                &state.call_connections,
                conversation_id,
                msg,
                Some(user_id),
            );
        }
    }

    Ok(Ack::ok())
}

/// Reject a ringing call. Valid only while the session exists.
pub async fn handle_reject(
    state: &AppState,
    user_id: &str,
    payload: CallRefPayload,
) -> Result<Ack, GatewayError> {
    let session = state
        .calls
        .remove(&payload.call_id)
        .ok_or_else(|| GatewayError::CallNotFound(payload.call_id.clone()))?;

    info!(call_id = %session.call_id, user_id = %user_id, "call rejected");

    if let Some(record_id) = &session.record_id {
        if let Err(e) = state
            .collab
            .calls
            .update_outcome(record_id, CallOutcome::Rejected, 0)
            .await
        {
            warn!(call_id = %session.call_id, error = %e, "failed to persist call rejection");
        }
    }

    if let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::CallRejected {
            call_id: session.call_id.clone(),
            user_id: user_id.to_string(),
        },
    ) {
        if let Some(conversation_id) = &session.conversation_id {
            state
                .call_rooms
                .broadcast(&state.call_connections, conversation_id, msg.clone(), None);
        }
        // Redundant direct delivery: survives a room-join race on the
        // rejecting client.
        state.call_connections.send_to_user(user_id, msg);
    }

    Ok(Ack::ok())
}

/// End a call. Ending while still ringing classifies the outcome as
/// `missed` with zero duration; ending an active call as `completed`.
pub async fn handle_end(
    state: &AppState,
    user_id: &str,
    payload: CallRefPayload,
) -> Result<Ack, GatewayError> {
    let ended = state
        .calls
        .end(&payload.call_id)
        .ok_or_else(|| GatewayError::CallNotFound(payload.call_id.clone()))?;

    info!(
        call_id = %ended.session.call_id,
        user_id = %user_id,
        outcome = ended.outcome.as_str(),
        duration_secs = ended.duration_secs,
        "call ended"
    );

    persist_outcome(state, &ended).await;
    emit_call_ended(state, &ended, Some(user_id));

    Ok(Ack::ok_with(json!({
        "outcome": ended.outcome,
        "duration_secs": ended.duration_secs,
    })))
}

/// Disconnect policy. An active call whose last connected participant just
/// left is implicitly ended. A ringing call is left untouched: the callee
/// may still answer, and the caller's socket may merely be flapping.
pub async fn handle_disconnect(state: &AppState, user_id: &str) {
    for session in state.calls.sessions_with(user_id) {
        if session.status != CallStatus::Active {
            continue;
        }
        let another_connected = session
            .participant_ids
            .iter()
            .any(|p| p != user_id && state.call_connections.is_connected(p));
        if another_connected {
            continue;
        }
        let Some(ended) = state.calls.end(&session.call_id) else {
            continue;
        };
        info!(
            call_id = %ended.session.call_id,
            user_id = %user_id,
            "last connected participant disconnected, ending call"
        );
        persist_outcome(state, &ended).await;
        emit_call_ended(state, &ended, None);
    }
}

/// Re-deliver `call:incoming` for calls that were still ringing when this
/// user's client dropped and reconnected.
pub fn redeliver_ringing(state: &AppState, user_id: &str) {
    for session in state.calls.ringing_for(user_id) {
        let Some(conversation_id) = session.conversation_id.clone() else {
            continue;
        };
        debug!(
            call_id = %session.call_id,
            user_id = %user_id,
            "re-delivering ringing call after reconnect"
        );
        if let Some(msg) = protocol::encode(
            None,
            &CallServerEvent::CallIncoming {
                call_id: session.call_id.clone(),
                conversation_id,
                initiator_id: session.initiator_id.clone(),
                participant_ids: session.participant_ids.clone(),
                call_type: session.call_type,
            },
        ) {
            state.call_connections.send_to_user(user_id, msg);
        }
    }
}

async fn persist_outcome(state: &AppState, ended: &EndedCall) {
    if let Some(record_id) = &ended.session.record_id {
        if let Err(e) = state
            .collab
            .calls
            .update_outcome(record_id, ended.outcome, ended.duration_secs)
            .await
        {
            warn!(
                call_id = %ended.session.call_id,
                error = %e,
                "failed to persist call outcome"
            );
        }
    }
}

/// `call:ended` goes out through three redundant channels: the room, a
/// direct lookup per participant, and the ending connection itself. Room
/// membership for a call is best-effort and must not be the single point of
/// failure for telling everyone the call stopped.
fn emit_call_ended(state: &AppState, ended: &EndedCall, ender: Option<&str>) {
    let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::CallEnded {
            call_id: ended.session.call_id.clone(),
            outcome: ended.outcome,
            duration_secs: ended.duration_secs,
        },
    ) else {
        return;
    };

    if let Some(conversation_id) = &ended.session.conversation_id {
        state
            .call_rooms
            .broadcast(&state.call_connections, conversation_id, msg.clone(), None);
    }
    for participant in &ended.session.participant_ids {
        state.call_connections.send_to_user(participant, msg.clone());
    }
    if let Some(ender) = ender {
        state.call_connections.send_to_user(ender, msg);
    }
}
