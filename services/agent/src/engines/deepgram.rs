//! Streaming speech-to-text over Deepgram's listen WebSocket.

use super::{EngineError, SpeechToText};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, protocol::Message as WsMessage},
};
use tracing::{debug, warn};

const SERVICE: &str = "deepgram";
// Frames are streamed in chunks of this many bytes of PCM16.
const CHUNK_BYTES: usize = 8192;

// --- Local Deepgram wire types (for encapsulation) ---
mod deepgram_types {
    use serde::{Deserialize, Serialize};

    #[derive(Serialize)]
    pub(super) struct CloseStream {
        pub r#type: &'static str,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct ServerMessage {
        pub r#type: Option<String>,
        pub is_final: Option<bool>,
        pub channel: Option<Channel>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct Channel {
        pub alternatives: Vec<Alternative>,
    }

    #[derive(Deserialize, Debug)]
    pub(super) struct Alternative {
        pub transcript: String,
    }
}

/// Utterance-level client for Deepgram streaming recognition.
///
/// One WebSocket is opened per utterance: the buffered PCM is streamed in,
/// the stream is closed, and the finalized transcript segments are joined.
pub struct DeepgramStt {
    api_key: String,
    model: String,
    language: String,
}

impl DeepgramStt {
    pub fn new(api_key: String, model: String, language: String) -> Self {
        Self {
            api_key,
            model,
            language,
        }
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<String, EngineError> {
        let url = format!(
            "wss://api.deepgram.com/v1/listen?model={}&language={}&encoding=linear16&sample_rate={}&punctuate=true",
            self.model, self.language, sample_rate
        );
        let mut request = url.into_client_request().map_err(|e| EngineError::Connect {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        request.headers_mut().insert(
            "Authorization",
            format!("Token {}", self.api_key)
                .parse()
                .map_err(|_| EngineError::Connect {
                    service: SERVICE,
                    detail: "API key is not a valid header value".to_string(),
                })?,
        );

        let (ws_stream, _) = connect_async(request).await.map_err(|e| EngineError::Connect {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        let (mut dg_tx, mut dg_rx) = ws_stream.split();
        debug!(samples = audio.len(), sample_rate, "streaming utterance to Deepgram");

        let bytes: Vec<u8> = audio.iter().flat_map(|s| s.to_le_bytes()).collect();
        for chunk in bytes.chunks(CHUNK_BYTES) {
            dg_tx
                .send(WsMessage::Binary(chunk.to_vec().into()))
                .await
                .map_err(|e| EngineError::Stream {
                    service: SERVICE,
                    detail: e.to_string(),
                })?;
        }
        let close = serde_json::to_string(&deepgram_types::CloseStream {
            r#type: "CloseStream",
        })
        .map_err(|e| EngineError::Stream {
            service: SERVICE,
            detail: e.to_string(),
        })?;
        dg_tx
            .send(WsMessage::Text(close.into()))
            .await
            .map_err(|e| EngineError::Stream {
                service: SERVICE,
                detail: e.to_string(),
            })?;

        let mut segments: Vec<String> = Vec::new();
        while let Some(msg_result) = dg_rx.next().await {
            match msg_result {
                Ok(WsMessage::Text(text)) => {
                    let server_msg: deepgram_types::ServerMessage = serde_json::from_str(&text)
                        .map_err(|e| EngineError::Decode {
                            service: SERVICE,
                            detail: e.to_string(),
                        })?;
                    match server_msg.r#type.as_deref() {
                        Some("Results") => {
                            if server_msg.is_final == Some(true) {
                                if let Some(transcript) = server_msg
                                    .channel
                                    .and_then(|c| c.alternatives.into_iter().next())
                                    .map(|a| a.transcript)
                                {
                                    if !transcript.is_empty() {
                                        segments.push(transcript);
                                    }
                                }
                            }
                        }
                        // Metadata closes out the stream after CloseStream.
                        Some("Metadata") => break,
                        _ => {}
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Deepgram stream ended with an error");
                    return Err(EngineError::Stream {
                        service: SERVICE,
                        detail: e.to_string(),
                    });
                }
            }
        }

        Ok(segments.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::deepgram_types::ServerMessage;

    #[test]
    fn parses_final_results_message() {
        let raw = r#"{
            "type": "Results",
            "is_final": true,
            "channel": {"alternatives": [{"transcript": "what is the weather in paris"}]}
        }"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.r#type.as_deref(), Some("Results"));
        assert_eq!(msg.is_final, Some(true));
        assert_eq!(
            msg.channel.unwrap().alternatives[0].transcript,
            "what is the weather in paris"
        );
    }

    #[test]
    fn parses_metadata_message_without_channel() {
        let raw = r#"{"type": "Metadata", "request_id": "abc"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.r#type.as_deref(), Some("Metadata"));
        assert!(msg.channel.is_none());
    }
}
