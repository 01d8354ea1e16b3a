use std::sync::Arc;
use std::time::Duration;

use crate::call::session::CallSessionManager;
use crate::clients::Collaborators;
use crate::config::IceConfig;
use crate::presence::PresenceMap;
use crate::registry::ConnectionRegistry;
use crate::rooms::RoomRegistry;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The registries are process-local and shared across every connection's
/// handler task; all of them are internally synchronized, and call-session
/// mutations are additionally serialized per call id inside
/// [`CallSessionManager`].
#[derive(Clone)]
pub struct AppState {
    /// Messaging channel connections, one per user (last-writer-wins)
    pub chat_connections: Arc<ConnectionRegistry>,
    /// Call-signaling channel connections
    pub call_connections: Arc<ConnectionRegistry>,
    /// Conversation rooms on the messaging channel
    pub chat_rooms: Arc<RoomRegistry>,
    /// Conversation rooms on the call channel (best-effort for call events)
    pub call_rooms: Arc<RoomRegistry>,
    /// Online/offline state derived from the messaging channel
    pub presence: Arc<PresenceMap>,
    /// Live call sessions
    pub calls: Arc<CallSessionManager>,
    /// External service contracts
    pub collab: Collaborators,
    /// Shared secret for access token verification
    pub jwt_secret: Vec<u8>,
    /// STUN/TURN configuration returned on call initiation
    pub ice: IceConfig,
    /// Bound on the awaited call-wake push dispatch
    pub call_push_timeout: Duration,
}

impl AppState {
    pub fn new(
        jwt_secret: Vec<u8>,
        ice: IceConfig,
        call_push_timeout: Duration,
        collab: Collaborators,
    ) -> Self {
        Self {
            chat_connections: Arc::new(ConnectionRegistry::new()),
            call_connections: Arc::new(ConnectionRegistry::new()),
            chat_rooms: Arc::new(RoomRegistry::new()),
            call_rooms: Arc::new(RoomRegistry::new()),
            presence: Arc::new(PresenceMap::new()),
            calls: Arc::new(CallSessionManager::new()),
            collab,
            jwt_secret,
            ice,
            call_push_timeout,
        }
    }
}
