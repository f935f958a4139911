//! The real-time audio room a session is attached to.
//!
//! The room is an opaque transport handle: the session sees joined/left and
//! audio frames, nothing of the underlying socket. The default transport is
//! the worker's own WebSocket endpoint.

pub mod protocol;

use crate::{state::AppState, token};
use async_trait::async_trait;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use protocol::{ClientFrame, ServerFrame};
use std::sync::Arc;
use tracing::{info, warn};

/// Failures on the room transport.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("room handshake failed: {0}")]
    Handshake(String),
    #[error("access token rejected: {0}")]
    TokenRejected(String),
    #[error("room transport failed: {0}")]
    Transport(String),
}

/// Something the room delivered to the session.
#[derive(Debug)]
pub enum RoomEvent {
    /// A binary frame of PCM16 audio from the participant.
    Audio(Bytes),
    /// The participant left or the transport closed.
    Closed,
}

/// Messages as seen at the transport seam.
#[derive(Debug)]
pub(crate) enum TransportMessage {
    Text(String),
    Binary(Bytes),
    Closed,
}

/// Minimal transport contract a room rides on.
#[async_trait]
pub(crate) trait RoomTransport: Send {
    /// None means the transport is gone.
    async fn recv(&mut self) -> Option<TransportMessage>;

    async fn send_text(&mut self, text: String) -> Result<(), RoomError>;
}

struct WsTransport {
    tx: SplitSink<WebSocket, Message>,
    rx: SplitStream<WebSocket>,
}

#[async_trait]
impl RoomTransport for WsTransport {
    async fn recv(&mut self) -> Option<TransportMessage> {
        loop {
            match self.rx.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some(TransportMessage::Text(text.to_string()));
                }
                Some(Ok(Message::Binary(data))) => return Some(TransportMessage::Binary(data)),
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => return Some(TransportMessage::Closed),
                Some(Err(e)) => {
                    warn!(error = %e, "room receive failed; treating as disconnect");
                    return Some(TransportMessage::Closed);
                }
                None => return None,
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Result<(), RoomError> {
        self.tx
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RoomError::Transport(e.to_string()))
    }
}

/// One participant's connection to the worker.
///
/// `connect` performs the join handshake and must complete before any audio
/// is read; binary frames arriving earlier are dropped with a warning.
pub struct Room {
    transport: Box<dyn RoomTransport>,
    participant: Option<String>,
}

impl Room {
    pub fn new(socket: WebSocket) -> Self {
        let (tx, rx) = socket.split();
        Self {
            transport: Box::new(WsTransport { tx, rx }),
            participant: None,
        }
    }

    pub(crate) fn with_transport(transport: Box<dyn RoomTransport>) -> Self {
        Self {
            transport,
            participant: None,
        }
    }

    /// Awaits the participant's `join` frame, verifying the access token
    /// when the worker holds a room secret. Returns the participant identity.
    pub async fn connect(&mut self, room_secret: Option<&str>) -> Result<String, RoomError> {
        loop {
            let msg = self
                .transport
                .recv()
                .await
                .ok_or_else(|| RoomError::Handshake("closed before join".to_string()))?;
            match msg {
                TransportMessage::Text(text) => {
                    let frame: ClientFrame = serde_json::from_str(&text)
                        .map_err(|e| RoomError::Handshake(e.to_string()))?;
                    let ClientFrame::Join { token } = frame;
                    let participant = match (room_secret, token) {
                        (Some(secret), Some(token)) => token::verify(secret, &token)
                            .map(|claims| claims.sub)
                            .map_err(|e| RoomError::TokenRejected(e.to_string()))?,
                        (Some(_), None) => {
                            return Err(RoomError::TokenRejected(
                                "join frame carried no token".to_string(),
                            ));
                        }
                        (None, _) => "guest".to_string(),
                    };
                    info!(participant, "participant joined the room");
                    self.participant = Some(participant.clone());
                    return Ok(participant);
                }
                TransportMessage::Binary(_) => {
                    warn!("dropping audio received before the join handshake");
                }
                TransportMessage::Closed => {
                    return Err(RoomError::Handshake("closed before join".to_string()));
                }
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.participant.is_some()
    }

    pub fn participant(&self) -> Option<&str> {
        self.participant.as_deref()
    }

    /// Next inbound event. Only meaningful after `connect`.
    pub async fn next_event(&mut self) -> RoomEvent {
        loop {
            match self.transport.recv().await {
                Some(TransportMessage::Binary(data)) => return RoomEvent::Audio(data),
                Some(TransportMessage::Text(_)) => {
                    warn!("ignoring unexpected text frame post-join");
                }
                Some(TransportMessage::Closed) | None => return RoomEvent::Closed,
            }
        }
    }

    pub async fn send(&mut self, frame: ServerFrame) -> Result<(), RoomError> {
        let serialized =
            serde_json::to_string(&frame).map_err(|e| RoomError::Transport(e.to_string()))?;
        self.transport.send_text(serialized).await
    }
}

/// Axum handler to upgrade an HTTP connection into a room attachment.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| async move {
        crate::entrypoint::run_session(state, Room::new(socket)).await;
    })
}
