//! ICE server list handed to clients on call initiation.

use serde::{Deserialize, Serialize};

use crate::config::IceConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

/// Build the ICE server list. STUN is always present; the TURN entry is
/// included only when url, username, and credential are all configured.
pub fn ice_servers(config: &IceConfig) -> Vec<IceServer> {
    let mut servers = vec![IceServer {
        urls: vec![config.stun_url.clone()],
        username: None,
        credential: None,
    }];

    if let (Some(url), Some(username), Some(credential)) = (
        &config.turn_url,
        &config.turn_username,
        &config.turn_credential,
    ) {
        if !url.is_empty() && !username.is_empty() && !credential.is_empty() {
            servers.push(IceServer {
                urls: vec![url.clone()],
                username: Some(username.clone()),
                credential: Some(credential.clone()),
            });
        }
    }

    servers
}
