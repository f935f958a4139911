use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// The assistant persona this worker serves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PersonaKind {
    /// General voice assistant with the weather and web-search tools.
    Assistant,
    /// Retrieval assistant whose tools come from a remote MCP server.
    Retrieval,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub persona: PersonaKind,
    pub openai_api_key: String,
    pub deepgram_api_key: String,
    /// Absence is not fatal: the search tool degrades to an error outcome.
    pub mistral_api_key: Option<String>,
    pub chat_model: String,
    pub tts_voice: String,
    pub stt_model: String,
    pub stt_language: String,
    pub retrieval_url: Option<String>,
    pub retrieval_timeout: Duration,
    pub room_api_key: Option<String>,
    pub room_api_secret: Option<String>,
    pub log_level: Level,
    pub log_dir: PathBuf,
    pub log_retention_days: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let persona_str = std::env::var("PERSONA").unwrap_or_else(|_| "assistant".to_string());
        let persona = match persona_str.to_lowercase().as_str() {
            "retrieval" => PersonaKind::Retrieval,
            "assistant" => PersonaKind::Assistant,
            other => {
                return Err(ConfigError::InvalidValue(
                    "PERSONA".to_string(),
                    format!("'{}' is not a known persona", other),
                ));
            }
        };

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;
        let deepgram_api_key = std::env::var("DEEPGRAM_API_KEY")
            .map_err(|_| ConfigError::MissingVar("DEEPGRAM_API_KEY".to_string()))?;
        let mistral_api_key = std::env::var("MISTRAL_API_KEY").ok();

        let chat_model =
            std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string());
        let tts_voice = std::env::var("TTS_VOICE").unwrap_or_else(|_| "ash".to_string());
        let stt_model = std::env::var("STT_MODEL").unwrap_or_else(|_| "nova-3".to_string());
        let stt_language = std::env::var("STT_LANGUAGE").unwrap_or_else(|_| "multi".to_string());

        let retrieval_url = std::env::var("RETRIEVAL_SERVER_URL").ok();
        if persona == PersonaKind::Retrieval && retrieval_url.is_none() {
            return Err(ConfigError::MissingVar(
                "RETRIEVAL_SERVER_URL must be set for the 'retrieval' persona".to_string(),
            ));
        }
        let retrieval_timeout_secs = match std::env::var("RETRIEVAL_TIMEOUT_SECS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "RETRIEVAL_TIMEOUT_SECS".to_string(),
                    format!("'{}' is not a number of seconds", raw),
                )
            })?,
            Err(_) => 20,
        };

        let room_api_key = std::env::var("ROOM_API_KEY").ok();
        let room_api_secret = std::env::var("ROOM_API_SECRET").ok();
        if room_api_key.is_some() != room_api_secret.is_some() {
            return Err(ConfigError::MissingVar(
                "ROOM_API_KEY and ROOM_API_SECRET must be set together".to_string(),
            ));
        }

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let log_dir = std::env::var("LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./logs"));
        let log_retention_days = match std::env::var("LOG_RETENTION_DAYS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                ConfigError::InvalidValue(
                    "LOG_RETENTION_DAYS".to_string(),
                    format!("'{}' is not a number of days", raw),
                )
            })?,
            Err(_) => 30,
        };

        Ok(Self {
            bind_address,
            persona,
            openai_api_key,
            deepgram_api_key,
            mistral_api_key,
            chat_model,
            tts_voice,
            stt_model,
            stt_language,
            retrieval_url,
            retrieval_timeout: Duration::from_secs(retrieval_timeout_secs),
            room_api_key,
            room_api_secret,
            log_level,
            log_dir,
            log_retention_days,
        })
    }
}
