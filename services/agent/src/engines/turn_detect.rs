//! Turn detection: deciding when a speaker's utterance is complete.

/// Parameters of the silence-window turn policy.
#[derive(Debug, Clone, Copy)]
pub struct TurnDetectorConfig {
    /// Silence that must follow speech before the turn is considered done.
    pub silence_duration_ms: u64,
    /// Audio kept from just before speech onset, so soft leading syllables
    /// are not clipped from the utterance.
    pub prefix_padding_ms: u64,
    /// Minimum amount of speech for a turn to count at all.
    pub min_speech_ms: u64,
}

impl Default for TurnDetectorConfig {
    fn default() -> Self {
        Self {
            silence_duration_ms: 700,
            prefix_padding_ms: 200,
            min_speech_ms: 120,
        }
    }
}

/// What the detector concluded from the latest frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnEvent {
    /// No utterance in progress.
    Idle,
    /// Speech onset: the utterance buffer should begin (with prefix padding).
    SpeechStarted,
    /// The utterance continues.
    Speaking,
    /// The silence window elapsed: the utterance is complete.
    Completed,
}

/// Accumulates per-frame VAD decisions into turn boundaries.
#[derive(Debug, Clone, Copy)]
pub struct TurnDetector {
    config: TurnDetectorConfig,
    in_speech: bool,
    speech_ms: u64,
    trailing_silence_ms: u64,
}

impl TurnDetector {
    pub fn new(config: TurnDetectorConfig) -> Self {
        Self {
            config,
            in_speech: false,
            speech_ms: 0,
            trailing_silence_ms: 0,
        }
    }

    pub fn config(&self) -> TurnDetectorConfig {
        self.config
    }

    /// Feeds one frame's VAD verdict and duration.
    pub fn push_frame(&mut self, is_speech: bool, frame_ms: u64) -> TurnEvent {
        if is_speech {
            self.trailing_silence_ms = 0;
            self.speech_ms += frame_ms;
            if !self.in_speech {
                self.in_speech = true;
                return TurnEvent::SpeechStarted;
            }
            return TurnEvent::Speaking;
        }

        if !self.in_speech {
            return TurnEvent::Idle;
        }

        self.trailing_silence_ms += frame_ms;
        if self.trailing_silence_ms >= self.config.silence_duration_ms {
            let had_enough_speech = self.speech_ms >= self.config.min_speech_ms;
            self.reset();
            if had_enough_speech {
                return TurnEvent::Completed;
            }
            // Too short to be an utterance: treat as noise and go idle.
            return TurnEvent::Idle;
        }
        TurnEvent::Speaking
    }

    pub fn reset(&mut self) {
        self.in_speech = false;
        self.speech_ms = 0;
        self.trailing_silence_ms = 0;
    }
}
