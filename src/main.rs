use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use quckapp_gateway::clients::http::{
    HttpCallRecordStore, HttpConversationStore, HttpMessageStore, HttpPushDelivery,
    HttpUserDirectory,
};
use quckapp_gateway::clients::Collaborators;
use quckapp_gateway::config::{generate_config_template, Config};
use quckapp_gateway::routes;
use quckapp_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "quckapp_gateway=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "quckapp_gateway=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("QuckApp gateway v{} starting", env!("CARGO_PKG_VERSION"));

    if config.jwt_secret.is_empty() {
        return Err("jwt_secret must be configured (GATEWAY_JWT_SECRET or gateway.toml)".into());
    }

    // One shared HTTP client for all collaborator services
    let client = reqwest::Client::new();
    let collab = Collaborators {
        users: Arc::new(HttpUserDirectory::new(
            client.clone(),
            config.user_service_url.clone(),
        )),
        conversations: Arc::new(HttpConversationStore::new(
            client.clone(),
            config.channel_service_url.clone(),
        )),
        messages: Arc::new(HttpMessageStore::new(
            client.clone(),
            config.message_service_url.clone(),
        )),
        calls: Arc::new(HttpCallRecordStore::new(
            client.clone(),
            config.call_service_url.clone(),
        )),
        push: Arc::new(HttpPushDelivery::new(
            client,
            config.push_service_url.clone(),
        )),
    };

    let state = AppState::new(
        config.jwt_secret.clone().into_bytes(),
        config.ice.clone().unwrap_or_default(),
        Duration::from_secs(config.call_push_timeout_secs),
        collab,
    );

    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
