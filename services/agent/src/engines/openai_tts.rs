//! Text-to-speech through OpenAI's speech synthesis endpoint.

use super::{EngineError, TextToSpeech};
use crate::audio;
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{CreateSpeechRequestArgs, SpeechModel, SpeechResponseFormat, Voice},
};
use async_trait::async_trait;
use tracing::debug;

const SERVICE: &str = "openai-tts";
// The PCM response format is 24 kHz mono PCM16.
const OUTPUT_SAMPLE_RATE: u32 = 24000;

pub struct OpenAiTts {
    client: Client<OpenAIConfig>,
    voice: Voice,
}

impl OpenAiTts {
    pub fn new(config: OpenAIConfig, voice: &str) -> Self {
        Self {
            client: Client::with_config(config),
            voice: parse_voice(voice),
        }
    }
}

fn parse_voice(name: &str) -> Voice {
    match name.to_lowercase().as_str() {
        "alloy" => Voice::Alloy,
        "ash" => Voice::Ash,
        "coral" => Voice::Coral,
        "echo" => Voice::Echo,
        "fable" => Voice::Fable,
        "nova" => Voice::Nova,
        "onyx" => Voice::Onyx,
        "sage" => Voice::Sage,
        "shimmer" => Voice::Shimmer,
        other => {
            tracing::warn!(voice = other, "unknown TTS voice, falling back to 'alloy'");
            Voice::Alloy
        }
    }
}

#[async_trait]
impl TextToSpeech for OpenAiTts {
    async fn synthesize(&self, text: &str) -> Result<Vec<i16>, EngineError> {
        let request = CreateSpeechRequestArgs::default()
            .model(SpeechModel::Tts1)
            .input(text)
            .voice(self.voice.clone())
            .response_format(SpeechResponseFormat::Pcm)
            .build()
            .map_err(|e| EngineError::Stream {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        let response = self
            .client
            .audio()
            .speech(request)
            .await
            .map_err(|e| EngineError::Stream {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        let samples = audio::bytes_to_i16(&response.bytes);
        debug!(chars = text.len(), samples = samples.len(), "synthesized reply audio");
        Ok(samples)
    }

    fn output_sample_rate(&self) -> u32 {
        OUTPUT_SAMPLE_RATE
    }
}
