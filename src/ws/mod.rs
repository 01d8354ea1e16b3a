pub mod actor;
pub mod dispatch;
pub mod handler;
pub mod protocol;

/// The two WebSocket namespaces the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// `/ws/chat` — messaging events, typing, presence
    Chat,
    /// `/ws/calls` — call lifecycle and WebRTC signaling
    Calls,
}
