//! Defines the control-frame protocol between a room participant and the worker.
//!
//! Inbound audio arrives as raw binary PCM16 frames; outbound audio rides in
//! base64 `audio` frames so it can interleave with the control stream.

use parley_core::transcript::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frames sent by the participant to the worker.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Joins the room. Must be the first frame; carries the access token
    /// when the worker is configured to verify one.
    Join { token: Option<String> },
}

/// Frames sent by the worker to the participant.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Confirms the room connection and identifies the session.
    Connected {
        session_id: Uuid,
        participant: String,
    },
    /// A finalized transcript line for either side of the conversation.
    Transcript { role: Role, text: String },
    /// The assistant is about to speak.
    Speaking,
    /// The assistant finished speaking.
    SpeakingDone,
    /// A chunk of synthesized speech (base64 PCM16).
    Audio { data: String },
    /// Reports a fatal error to the participant.
    Error { message: String },
}
