//! WebRTC signaling relay and in-call toggle broadcasts.
//!
//! Offers, answers, and ICE candidates are forwarded verbatim to the target
//! user's live connection with the sender's id attached. A target without a
//! live connection means the frame is silently dropped: no retry, no
//! buffering — the application layer re-sends when the peer reconnects.

use tracing::debug;

use crate::state::AppState;
use crate::ws::protocol::{
    self, CallServerEvent, IceCandidatePayload, SdpPayload, ToggleAudioPayload,
    ToggleVideoPayload,
};

pub fn relay_offer(state: &AppState, user_id: &str, payload: SdpPayload) {
    relay(
        state,
        &payload.target_user_id,
        &CallServerEvent::Offer {
            call_id: payload.call_id,
            sender_user_id: user_id.to_string(),
            sdp: payload.sdp,
        },
    );
}

pub fn relay_answer(state: &AppState, user_id: &str, payload: SdpPayload) {
    relay(
        state,
        &payload.target_user_id,
        &CallServerEvent::SdpAnswer {
            call_id: payload.call_id,
            sender_user_id: user_id.to_string(),
            sdp: payload.sdp,
        },
    );
}

pub fn relay_ice_candidate(state: &AppState, user_id: &str, payload: IceCandidatePayload) {
    relay(
        state,
        &payload.target_user_id,
        &CallServerEvent::IceCandidate {
            call_id: payload.call_id,
            sender_user_id: user_id.to_string(),
            candidate: payload.candidate,
        },
    );
}

fn relay(state: &AppState, target_user_id: &str, event: &CallServerEvent) {
    let Some(msg) = protocol::encode(None, event) else {
        return;
    };
    if !state.call_connections.send_to_user(target_user_id, msg) {
        debug!(target = %target_user_id, "signaling target offline, frame dropped");
    }
}

/// Stateless relay of an audio mute/unmute to the call's room, excluding
/// the sender. The room is derived from the session; a toggle for an
/// unknown call is dropped.
pub fn broadcast_audio_toggle(state: &AppState, user_id: &str, payload: ToggleAudioPayload) {
    let Some(session) = state.calls.get(&payload.call_id) else {
        debug!(call_id = %payload.call_id, "audio toggle for unknown call dropped");
        return;
    };
    let Some(conversation_id) = session.conversation_id else {
        return;
    };
    if let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::AudioToggled {
            call_id: payload.call_id,
            user_id: user_id.to_string(),
            muted: payload.muted,
        },
    ) {
        state.call_rooms.broadcast(
            &state.call_connections,
            &conversation_id,
            msg,
            Some(user_id),
        );
    }
}

pub fn broadcast_video_toggle(state: &AppState, user_id: &str, payload: ToggleVideoPayload) {
    let Some(session) = state.calls.get(&payload.call_id) else {
        debug!(call_id = %payload.call_id, "video toggle for unknown call dropped");
        return;
    };
    let Some(conversation_id) = session.conversation_id else {
        return;
    };
    if let Some(msg) = protocol::encode(
        None,
        &CallServerEvent::VideoToggled {
            call_id: payload.call_id,
            user_id: user_id.to_string(),
            enabled: payload.enabled,
        },
    ) {
        state.call_rooms.broadcast(
            &state.call_connections,
            &conversation_id,
            msg,
            Some(user_id),
        );
    }
}
