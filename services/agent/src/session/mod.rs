//! The live conversation session: engine bindings, lifecycle, and the loop.

pub mod turn;

use crate::{
    audio,
    engines::{
        EnergyVad, EngineError, SpeechToText, TextToSpeech, TurnDetector, TurnDetectorConfig,
        TurnEvent,
    },
    room::{Room, RoomError, RoomEvent, protocol::ServerFrame},
};
use parley_core::{
    llm::LLMClient,
    persona::Persona,
    transcript::{Role, Transcript},
};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Instruction used for the first assistant reply, whichever component
/// triggers it.
pub const GREETING_INSTRUCTIONS: &str = "Greet the user and offer your assistance.";

// Outbound audio chunk size: 200 ms at the room rate.
const AUDIO_FRAME_CHUNK: usize = 4800;

/// Lifecycle of one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unstarted,
    Starting,
    Active,
    Ended,
    Failed,
}

impl SessionState {
    fn name(&self) -> &'static str {
        match self {
            SessionState::Unstarted => "unstarted",
            SessionState::Starting => "starting",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
            SessionState::Failed => "failed",
        }
    }
}

/// Errors that end a session. Tool failures never appear here: they are
/// converted to error outcomes inside the turn.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("room failure: {0}")]
    Room(#[from] RoomError),
    #[error("engine failure: {0}")]
    Engine(#[from] EngineError),
    #[error("language model failure: {0}")]
    Model(#[source] anyhow::Error),
    #[error("audio processing failed: {0}")]
    Audio(String),
    #[error("transcript rejected turn: {0}")]
    Transcript(#[from] parley_core::transcript::TranscriptError),
    #[error("invalid session state: expected {expected}, found {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },
}

/// The fixed engine bindings for one conversation, constructed once at the
/// entry point and shared read-only afterwards.
#[derive(Clone)]
pub struct SessionConfig {
    pub stt: Arc<dyn SpeechToText>,
    pub tts: Arc<dyn TextToSpeech>,
    pub llm: Arc<dyn LLMClient>,
    pub vad: EnergyVad,
    pub turn_detection: TurnDetectorConfig,
}

/// Options applied to inbound room audio.
#[derive(Debug, Clone, Copy)]
pub struct RoomInputOptions {
    /// Applies a high-pass pre-filter to inbound frames.
    pub noise_reduction: bool,
}

impl Default for RoomInputOptions {
    fn default() -> Self {
        Self {
            noise_reduction: true,
        }
    }
}

/// One ongoing spoken conversation with one remote participant.
pub struct Session {
    id: Uuid,
    config: SessionConfig,
    persona: Arc<Persona>,
    transcript: Transcript,
    state: SessionState,
    room: Option<Room>,
    options: RoomInputOptions,
    greeted: bool,
}

impl Session {
    pub fn new(config: SessionConfig, persona: Arc<Persona>) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            persona,
            transcript: Transcript::new(),
            state: SessionState::Unstarted,
            room: None,
            options: RoomInputOptions::default(),
            greeted: false,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Binds the room and engine handles. The session activates here only
    /// when the room has already completed its own `connect`; otherwise it
    /// stays `Starting` until [`Session::connect`] is called.
    pub async fn start(
        &mut self,
        room: Room,
        options: RoomInputOptions,
    ) -> Result<(), SessionError> {
        if self.state != SessionState::Unstarted {
            return Err(SessionError::InvalidState {
                expected: "unstarted",
                found: self.state.name(),
            });
        }
        self.options = options;
        self.room = Some(room);
        self.state = SessionState::Starting;
        info!(session_id = %self.id, persona = self.persona.name(), "session starting");

        if self.room.as_ref().is_some_and(Room::is_connected) {
            let result = self.activate().await;
            if result.is_err() {
                self.state = SessionState::Failed;
            }
            return result;
        }
        Ok(())
    }

    /// Completes the room handshake. Audio only flows once both `start` and
    /// `connect` have finished; either order is allowed.
    pub async fn connect(&mut self, room_secret: Option<&str>) -> Result<(), SessionError> {
        match self.state {
            SessionState::Active => Ok(()),
            SessionState::Starting => {
                let room = self.room.as_mut().ok_or(SessionError::InvalidState {
                    expected: "starting",
                    found: "starting without a room",
                })?;
                if let Err(e) = room.connect(room_secret).await {
                    self.state = SessionState::Failed;
                    return Err(e.into());
                }
                let result = self.activate().await;
                if result.is_err() {
                    self.state = SessionState::Failed;
                }
                result
            }
            other => Err(SessionError::InvalidState {
                expected: "starting",
                found: other.name(),
            }),
        }
    }

    async fn activate(&mut self) -> Result<(), SessionError> {
        let participant = self
            .room
            .as_ref()
            .and_then(Room::participant)
            .unwrap_or("guest")
            .to_string();
        let session_id = self.id;
        if let Some(room) = self.room.as_mut() {
            room.send(ServerFrame::Connected {
                session_id,
                participant,
            })
            .await?;
        }
        self.state = SessionState::Active;
        info!(session_id = %self.id, "session active");
        Ok(())
    }

    /// Drives one assistant-initiated reply (the greeting path).
    pub async fn generate_reply(&mut self, instructions: &str) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidState {
                expected: "active",
                found: self.state.name(),
            });
        }
        let mut room = self.room.take().ok_or(SessionError::InvalidState {
            expected: "active",
            found: "active without a room",
        })?;
        self.greeted = true;
        let result = self.reply_turn(&mut room, instructions).await;
        self.room = Some(room);
        if result.is_err() {
            self.state = SessionState::Failed;
        }
        result
    }

    /// Runs the conversation loop until the room closes or a fatal error.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::InvalidState {
                expected: "active",
                found: self.state.name(),
            });
        }
        let mut room = self.room.take().ok_or(SessionError::InvalidState {
            expected: "active",
            found: "active without a room",
        })?;

        let result = self.run_loop(&mut room).await;
        match &result {
            Ok(()) => self.state = SessionState::Ended,
            Err(e) => {
                self.state = SessionState::Failed;
                let _ = room
                    .send(ServerFrame::Error {
                        message: e.to_string(),
                    })
                    .await;
            }
        }
        result
    }

    async fn run_loop(&mut self, room: &mut Room) -> Result<(), SessionError> {
        if self.persona.greets_on_enter() && !self.greeted {
            self.greeted = true;
            self.reply_turn(room, GREETING_INSTRUCTIONS).await?;
        }

        let mut vad = self.config.vad;
        let mut detector = TurnDetector::new(self.config.turn_detection);
        let mut filter = self
            .options
            .noise_reduction
            .then(|| audio::HighPassFilter::new(100.0, audio::ROOM_SAMPLE_RATE as f32));

        let prefix_samples = (detector.config().prefix_padding_ms as usize
            * audio::ROOM_SAMPLE_RATE as usize)
            / 1000;
        let mut prefix: VecDeque<i16> = VecDeque::with_capacity(prefix_samples);
        let mut utterance: Vec<i16> = Vec::new();
        let mut in_utterance = false;

        loop {
            match room.next_event().await {
                RoomEvent::Closed => {
                    info!(session_id = %self.id, "room disconnected; session ending");
                    return Ok(());
                }
                RoomEvent::Audio(data) => {
                    let mut samples = audio::bytes_to_i16(&data);
                    if let Some(filter) = filter.as_mut() {
                        let mut frame = audio::convert_i16_to_f32(&samples);
                        filter.process(&mut frame);
                        samples = audio::convert_f32_to_i16(&frame);
                    }
                    if samples.is_empty() {
                        continue;
                    }
                    let frame_ms =
                        (samples.len() as u64 * 1000) / audio::ROOM_SAMPLE_RATE as u64;
                    let is_speech = vad.is_speech(&samples);

                    match detector.push_frame(is_speech, frame_ms) {
                        TurnEvent::Idle => {
                            if in_utterance {
                                // The detector discarded a too-short blip.
                                in_utterance = false;
                                utterance.clear();
                            }
                            prefix.extend(samples);
                            while prefix.len() > prefix_samples {
                                prefix.pop_front();
                            }
                        }
                        TurnEvent::SpeechStarted => {
                            in_utterance = true;
                            utterance.clear();
                            utterance.extend(prefix.drain(..));
                            utterance.extend_from_slice(&samples);
                        }
                        TurnEvent::Speaking => {
                            if in_utterance {
                                utterance.extend_from_slice(&samples);
                            }
                        }
                        TurnEvent::Completed => {
                            in_utterance = false;
                            let finished = std::mem::take(&mut utterance);
                            vad.reset();
                            self.handle_utterance(room, &finished).await?;
                        }
                    }
                }
            }
        }
    }

    async fn handle_utterance(
        &mut self,
        room: &mut Room,
        samples: &[i16],
    ) -> Result<(), SessionError> {
        let for_stt = audio::resample(samples, audio::ROOM_SAMPLE_RATE, audio::STT_SAMPLE_RATE)
            .map_err(|e| SessionError::Audio(e.to_string()))?;
        let user_text = self
            .config
            .stt
            .transcribe(&for_stt, audio::STT_SAMPLE_RATE as u32)
            .await?;
        if user_text.trim().is_empty() {
            warn!(session_id = %self.id, "utterance produced an empty transcript; skipping turn");
            return Ok(());
        }
        room.send(ServerFrame::Transcript {
            role: Role::User,
            text: user_text.clone(),
        })
        .await?;

        let reply = turn::run_turn(
            &self.config.llm,
            &self.persona,
            &mut self.transcript,
            self.id,
            turn::TurnInput::User(&user_text),
        )
        .await?;
        self.say(room, &reply).await
    }

    async fn reply_turn(
        &mut self,
        room: &mut Room,
        instructions: &str,
    ) -> Result<(), SessionError> {
        let reply = turn::run_turn(
            &self.config.llm,
            &self.persona,
            &mut self.transcript,
            self.id,
            turn::TurnInput::Instruction(instructions),
        )
        .await?;
        self.say(room, &reply).await
    }

    async fn say(&mut self, room: &mut Room, text: &str) -> Result<(), SessionError> {
        if text.is_empty() {
            return Ok(());
        }
        let mut samples = self.config.tts.synthesize(text).await?;
        let tts_rate = self.config.tts.output_sample_rate() as f64;
        if tts_rate != audio::ROOM_SAMPLE_RATE {
            samples = audio::resample(&samples, tts_rate, audio::ROOM_SAMPLE_RATE)
                .map_err(|e| SessionError::Audio(e.to_string()))?;
        }

        room.send(ServerFrame::Speaking).await?;
        for chunk in samples.chunks(AUDIO_FRAME_CHUNK) {
            room.send(ServerFrame::Audio {
                data: audio::encode_i16(chunk),
            })
            .await?;
        }
        room.send(ServerFrame::SpeakingDone).await?;
        room.send(ServerFrame::Transcript {
            role: Role::Assistant,
            text: text.to_string(),
        })
        .await
        .map_err(SessionError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::turn::test_support::{RecordingTool, ScriptedLlm, call_named};
    use super::*;
    use crate::room::TransportMessage;
    use crate::room::testing::{MockTransport, join_frame};
    use async_trait::async_trait;
    use parley_core::llm::LLMAction;
    use parley_core::persona::GreetingPolicy;
    use parley_core::registry::ToolRegistry;
    use parley_core::tool::ToolOutcome;
    use serde_json::Value;
    use std::sync::Mutex;

    struct FakeStt {
        text: String,
    }

    #[async_trait]
    impl SpeechToText for FakeStt {
        async fn transcribe(&self, audio: &[i16], sample_rate: u32) -> Result<String, EngineError> {
            assert_eq!(sample_rate, crate::audio::STT_SAMPLE_RATE as u32);
            assert!(!audio.is_empty());
            Ok(self.text.clone())
        }
    }

    struct FakeTts;

    #[async_trait]
    impl TextToSpeech for FakeTts {
        async fn synthesize(&self, _text: &str) -> Result<Vec<i16>, EngineError> {
            Ok(vec![100i16; 2400])
        }

        fn output_sample_rate(&self) -> u32 {
            crate::audio::ROOM_SAMPLE_RATE as u32
        }
    }

    fn config_with(llm: Arc<dyn LLMClient>, stt_text: &str) -> SessionConfig {
        SessionConfig {
            stt: Arc::new(FakeStt {
                text: stt_text.to_string(),
            }),
            tts: Arc::new(FakeTts),
            llm,
            vad: EnergyVad::default(),
            turn_detection: TurnDetectorConfig::default(),
        }
    }

    fn persona(greeting: GreetingPolicy, tools: ToolRegistry) -> Arc<Persona> {
        Arc::new(Persona::new(
            "assistant",
            "You are a helpful voice AI assistant.",
            tools,
            greeting,
        ))
    }

    fn speech_frame() -> TransportMessage {
        let samples: Vec<i16> = (0..480)
            .map(|i| {
                let t = i as f32 / crate::audio::ROOM_SAMPLE_RATE as f32;
                ((2.0 * std::f32::consts::PI * 1000.0 * t).sin() * 0.25 * 32767.0) as i16
            })
            .collect();
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        TransportMessage::Binary(bytes.into())
    }

    fn silence_frame() -> TransportMessage {
        TransportMessage::Binary(vec![0u8; 960].into())
    }

    fn frames_of(type_name: &str, sent: &Mutex<Vec<Value>>) -> Vec<Value> {
        sent.lock()
            .unwrap()
            .iter()
            .filter(|f| f["type"] == type_name)
            .cloned()
            .collect()
    }

    fn assistant_transcripts(sent: &Mutex<Vec<Value>>) -> Vec<Value> {
        frames_of("transcript", sent)
            .into_iter()
            .filter(|f| f["role"] == "assistant")
            .collect()
    }

    #[tokio::test]
    async fn active_only_after_both_start_and_connect() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(vec![], ""));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::Deferred, ToolRegistry::empty()),
        );
        assert_eq!(session.state(), SessionState::Unstarted);

        let (transport, sent) = MockTransport::new(vec![join_frame()]);
        let room = Room::with_transport(Box::new(transport));
        session.start(room, RoomInputOptions::default()).await.unwrap();
        assert_eq!(session.state(), SessionState::Starting);

        session.connect(None).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(frames_of("connected", &sent).len(), 1);
    }

    #[tokio::test]
    async fn connect_before_start_also_activates() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(vec![], ""));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::Deferred, ToolRegistry::empty()),
        );

        let (transport, sent) = MockTransport::new(vec![join_frame()]);
        let mut room = Room::with_transport(Box::new(transport));
        room.connect(None).await.unwrap();

        session.start(room, RoomInputOptions::default()).await.unwrap();
        assert_eq!(session.state(), SessionState::Active);
        assert_eq!(frames_of("connected", &sent).len(), 1);
    }

    #[tokio::test]
    async fn start_twice_is_rejected() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(vec![], ""));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::Deferred, ToolRegistry::empty()),
        );
        let (transport, _) = MockTransport::new(vec![join_frame()]);
        session
            .start(Room::with_transport(Box::new(transport)), RoomInputOptions::default())
            .await
            .unwrap();

        let (transport, _) = MockTransport::new(vec![join_frame()]);
        let err = session
            .start(Room::with_transport(Box::new(transport)), RoomInputOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn run_before_active_is_rejected() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(vec![], ""));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::Deferred, ToolRegistry::empty()),
        );
        let err = session.run().await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn deferred_persona_greets_exactly_once_via_entry_point() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(
            vec![LLMAction::TextResponse("Hello! How can I help?".to_string())],
            "",
        ));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::Deferred, ToolRegistry::empty()),
        );
        let (transport, sent) = MockTransport::new(vec![join_frame(), TransportMessage::Closed]);
        session
            .start(Room::with_transport(Box::new(transport)), RoomInputOptions::default())
            .await
            .unwrap();
        session.connect(None).await.unwrap();

        // Entry-point greeting, then the loop runs until disconnect.
        session.generate_reply(GREETING_INSTRUCTIONS).await.unwrap();
        session.run().await.unwrap();

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(assistant_transcripts(&sent).len(), 1);
        assert_eq!(frames_of("speaking", &sent).len(), 1);
    }

    #[tokio::test]
    async fn on_enter_persona_greets_exactly_once_without_entry_point() {
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(
            vec![LLMAction::TextResponse("Welcome back!".to_string())],
            "",
        ));
        let mut session = Session::new(
            config_with(llm, ""),
            persona(GreetingPolicy::OnEnter, ToolRegistry::empty()),
        );
        let (transport, sent) = MockTransport::new(vec![join_frame(), TransportMessage::Closed]);
        session
            .start(Room::with_transport(Box::new(transport)), RoomInputOptions::default())
            .await
            .unwrap();
        session.connect(None).await.unwrap();
        session.run().await.unwrap();

        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(assistant_transcripts(&sent).len(), 1);
        let greeting = &assistant_transcripts(&sent)[0];
        assert_eq!(greeting["text"], "Welcome back!");
    }

    #[tokio::test]
    async fn failing_tool_leaves_the_session_running() {
        let session_id_holder = Uuid::new_v4();
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ToolRegistry::new(vec![RecordingTool::new(
            "web_search",
            ToolOutcome::error("Web search failed: connection refused"),
            log.clone(),
        )])
        .unwrap();
        let llm: Arc<dyn LLMClient> = Arc::new(ScriptedLlm::new(
            vec![LLMAction::ToolCalls(vec![call_named(
                "call_1",
                "web_search",
                session_id_holder,
            )])],
            "I could not reach the search service.",
        ));
        let mut session = Session::new(
            config_with(llm, "search for rust news"),
            persona(GreetingPolicy::Deferred, registry),
        );

        // 200 ms of speech, then enough silence to complete the turn.
        let mut incoming = vec![join_frame()];
        incoming.extend((0..10).map(|_| speech_frame()));
        incoming.extend((0..45).map(|_| silence_frame()));
        incoming.push(TransportMessage::Closed);

        let (transport, sent) = MockTransport::new(incoming);
        let mut room = Room::with_transport(Box::new(transport));
        room.connect(None).await.unwrap();
        session.start(room, RoomInputOptions::default()).await.unwrap();
        session.run().await.unwrap();

        // The tool failure became data; the turn completed and the session
        // ended on disconnect rather than failing.
        assert_eq!(session.state(), SessionState::Ended);
        assert_eq!(*log.lock().unwrap(), vec!["web_search".to_string()]);

        let user_lines: Vec<Value> = frames_of("transcript", &sent)
            .into_iter()
            .filter(|f| f["role"] == "user")
            .collect();
        assert_eq!(user_lines.len(), 1);
        assert_eq!(user_lines[0]["text"], "search for rust news");

        let replies = assistant_transcripts(&sent);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["text"], "I could not reach the search service.");
        assert!(!frames_of("audio", &sent).is_empty());
        assert_eq!(frames_of("speaking_done", &sent).len(), 1);

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert!(turns[1].tool_results[0].outcome.is_error());
    }
}
