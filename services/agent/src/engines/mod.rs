//! Engine seams for the external speech vendors.
//!
//! Speech recognition and synthesis are delegated to hosted services behind
//! these traits; voice-activity detection and turn detection run locally on
//! the inbound frames.

pub mod deepgram;
pub mod openai_tts;
pub mod turn_detect;
pub mod vad;

pub use deepgram::DeepgramStt;
pub use openai_tts::OpenAiTts;
pub use turn_detect::{TurnDetector, TurnDetectorConfig, TurnEvent};
pub use vad::EnergyVad;

use async_trait::async_trait;

/// Failures at an engine boundary, classified for the session-fatal taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("connection to {service} failed: {detail}")]
    Connect {
        service: &'static str,
        detail: String,
    },
    #[error("{service} stream failed: {detail}")]
    Stream {
        service: &'static str,
        detail: String,
    },
    #[error("failed to decode {service} response: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
}

/// Converts one finished utterance of PCM16 audio into transcript text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<String, EngineError>;
}

/// Renders text into PCM16 audio at [`TextToSpeech::output_sample_rate`].
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Vec<i16>, EngineError>;

    fn output_sample_rate(&self) -> u32;
}
