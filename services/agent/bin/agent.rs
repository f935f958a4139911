//! Main Entrypoint for the Parley Voice Assistant Worker
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing rotated structured logging.
//! 3. Constructing the engine bindings and the configured persona.
//! 4. Serving the room WebSocket endpoint plus the small REST surface.
//!
//! A `mint-token` subcommand prints a room access token for local testing.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use clap::{Parser, Subcommand};
use parley_agent::{
    config::Config,
    engines::{DeepgramStt, EnergyVad, OpenAiTts, TurnDetectorConfig},
    logging, personas,
    router::create_router,
    session::SessionConfig,
    state::AppState,
    token,
};
use parley_core::llm::OpenAICompatibleClient;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "agent", about = "Parley voice assistant worker", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the worker (the default).
    Start,
    /// Mint a room access token and print it to stdout.
    MintToken {
        #[arg(long, default_value = "test-room")]
        room: String,
        #[arg(long, default_value = "user")]
        identity: String,
    },
}

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

fn mint_token(room: &str, identity: &str) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let key = std::env::var("ROOM_API_KEY").context("ROOM_API_KEY must be set")?;
    let secret = std::env::var("ROOM_API_SECRET").context("ROOM_API_SECRET must be set")?;
    let token = token::mint(&key, &secret, room, identity, chrono::Duration::hours(1))?;
    println!("{token}");
    Ok(())
}

async fn start() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    let _log_guard = logging::init(config.log_level, &config.log_dir)?;
    match logging::prune_old_logs(&config.log_dir, config.log_retention_days) {
        Ok(removed) if removed > 0 => info!(removed, "pruned expired log files"),
        Ok(_) => {}
        Err(e) => warn!(error = %e, "log retention sweep failed"),
    }
    info!("Configuration loaded. Initializing engines...");

    // --- 3. Initialize Engine Bindings ---
    let openai_config = OpenAIConfig::new().with_api_key(&config.openai_api_key);
    let session_config = SessionConfig {
        stt: Arc::new(DeepgramStt::new(
            config.deepgram_api_key.clone(),
            config.stt_model.clone(),
            config.stt_language.clone(),
        )),
        tts: Arc::new(OpenAiTts::new(openai_config.clone(), &config.tts_voice)),
        llm: Arc::new(OpenAICompatibleClient::new(
            openai_config,
            config.chat_model.clone(),
        )),
        vad: EnergyVad::default(),
        turn_detection: TurnDetectorConfig::default(),
    };

    // --- 4. Build the Persona ---
    let persona = personas::build(&config).await?;

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        session_config,
        persona,
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        persona = ?config.persona,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Worker configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Start) {
        Command::Start => start().await,
        Command::MintToken { room, identity } => mint_token(&room, &identity),
    }
}
