use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// QuckApp real-time gateway
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "quckapp-gateway", version, about = "QuckApp real-time gateway")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "GATEWAY_PORT", default_value = "4010")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "GATEWAY_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./gateway.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "GATEWAY_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Shared secret for verifying access tokens issued by the auth service
    #[arg(long, env = "GATEWAY_JWT_SECRET", default_value = "")]
    pub jwt_secret: String,

    /// Base URL of the user directory service
    #[arg(
        long,
        env = "GATEWAY_USER_SERVICE_URL",
        default_value = "http://127.0.0.1:4001"
    )]
    pub user_service_url: String,

    /// Base URL of the conversation (channel) service
    #[arg(
        long,
        env = "GATEWAY_CHANNEL_SERVICE_URL",
        default_value = "http://127.0.0.1:4002"
    )]
    pub channel_service_url: String,

    /// Base URL of the message service
    #[arg(
        long,
        env = "GATEWAY_MESSAGE_SERVICE_URL",
        default_value = "http://127.0.0.1:4003"
    )]
    pub message_service_url: String,

    /// Base URL of the call record service
    #[arg(
        long,
        env = "GATEWAY_CALL_SERVICE_URL",
        default_value = "http://127.0.0.1:4004"
    )]
    pub call_service_url: String,

    /// Base URL of the push notification service
    #[arg(
        long,
        env = "GATEWAY_PUSH_SERVICE_URL",
        default_value = "http://127.0.0.1:4005"
    )]
    pub push_service_url: String,

    /// Upper bound in seconds on the awaited call-wake push dispatch.
    /// Call setup must not stall indefinitely on a slow push provider.
    #[arg(long, env = "GATEWAY_CALL_PUSH_TIMEOUT_SECS", default_value = "5")]
    pub call_push_timeout_secs: u64,

    /// ICE server configuration (loaded from [ice] section in TOML)
    #[arg(skip)]
    #[serde(default)]
    pub ice: Option<IceConfig>,
}

/// STUN/TURN configuration handed to call participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN server URL, always included in the ICE server list
    #[serde(default = "default_stun_url")]
    pub stun_url: String,

    /// TURN server URL. The TURN entry is omitted from the ICE server list
    /// unless url, username, and credential are all configured.
    #[serde(default)]
    pub turn_url: Option<String>,

    #[serde(default)]
    pub turn_username: Option<String>,

    #[serde(default)]
    pub turn_credential: Option<String>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_url: default_stun_url(),
            turn_url: None,
            turn_username: None,
            turn_credential: None,
        }
    }
}

fn default_stun_url() -> String {
    "stun:stun.l.google.com:19302".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 4010,
            bind_address: "0.0.0.0".to_string(),
            config: "./gateway.toml".to_string(),
            json_logs: false,
            generate_config: false,
            jwt_secret: String::new(),
            user_service_url: "http://127.0.0.1:4001".to_string(),
            channel_service_url: "http://127.0.0.1:4002".to_string(),
            message_service_url: "http://127.0.0.1:4003".to_string(),
            call_service_url: "http://127.0.0.1:4004".to_string(),
            push_service_url: "http://127.0.0.1:4005".to_string(),
            call_push_timeout_secs: 5,
            ice: Some(IceConfig::default()),
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (GATEWAY_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("GATEWAY_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# QuckApp Gateway Configuration
# Place this file at ./gateway.toml or specify with --config <path>
# All settings can be overridden via environment variables (GATEWAY_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 4010)
# port = 4010

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Shared secret for verifying access tokens (required).
# Must match the auth service's signing secret.
# jwt_secret = ""

# ---- Collaborator services ----
# user_service_url = "http://127.0.0.1:4001"
# channel_service_url = "http://127.0.0.1:4002"
# message_service_url = "http://127.0.0.1:4003"
# call_service_url = "http://127.0.0.1:4004"
# push_service_url = "http://127.0.0.1:4005"

# Upper bound in seconds on the awaited call-wake push dispatch (default: 5)
# call_push_timeout_secs = 5

# ---- ICE servers (WebRTC calls) ----
# [ice]
# stun_url = "stun:stun.l.google.com:19302"

# TURN relay; the entry is only sent to clients when url, username, and
# credential are all present.
# turn_url = "turn:turn.example.com:3478"
# turn_username = ""
# turn_credential = ""
"#
    .to_string()
}
