use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use room_core::DailyRoomClient;
use server::{build_router, config::AppConfig, AppState};
use speech_core::ElevenLabsClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting speech relay server...");

    // Refuse to start without the synthesis credential.
    let config = AppConfig::from_env()?;

    let synthesizer = ElevenLabsClient::with_connect_timeout(
        config.speech.api_key.clone(),
        config.speech.profile.clone(),
        config.server.upstream_connect_timeout(),
    )
    .context("Failed to build synthesis client")?
    .with_base_url(config.speech.api_base.clone());

    info!(
        voice = %config.speech.profile.voice_id,
        model = %config.speech.profile.model_id,
        format = %config.speech.profile.output_format,
        "Synthesis client ready"
    );

    let mut state = AppState::new(Arc::new(synthesizer), config.server.clone());
    match config.rooms.api_key.clone() {
        Some(key) => {
            info!(api = %config.rooms.api_path, "Room routes enabled");
            state = state.with_rooms(Arc::new(DailyRoomClient::new(key, config.rooms.api_path.clone())));
        }
        None => info!("DAILY_API_KEY not set, room routes will answer 503"),
    }

    info!(
        "Server configuration loaded: port={}, request_timeout={}s",
        config.server.port, config.server.request_timeout_secs
    );

    let app = build_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid HOST/PORT: {}:{}", config.server.host, config.server.port))?;

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening at http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
