//! Mutable per-call state.
//!
//! One [`SessionContext`] exists per call and lives behind the mutex in
//! [`crate::session::CallSession`]. The lock is never held across an
//! `.await`. Each field has a single writer:
//!
//! | field | writer |
//! |---|---|
//! | `stream_sid`, `last_user_audio` | ingress gate |
//! | `ai_speaking`, `barge_in_armed`, AI audio timestamps, `greeting_pending` | turn-state transitions (also invoked by the gate for barge-in) |
//! | `nudge_count`, `last_nudge` | silence watchdog |
//! | `bridging`, `bridge_attempted`, `sms_attempted` | function-call dispatcher |
//! | `ending` | dispatcher (`end_call`) and watchdog (timeouts) |
//! | `closed` | whoever closes the telephony socket first |

use std::fmt;
use tokio::time::Instant;

/// Conversational state derived from the context flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Greeting,
    AiSpeaking,
    Listening,
    Bridging,
    Ending,
    Closed,
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "IDLE",
            Self::Greeting => "GREETING",
            Self::AiSpeaking => "AI_SPEAKING",
            Self::Listening => "LISTENING",
            Self::Bridging => "BRIDGING",
            Self::Ending => "ENDING",
            Self::Closed => "CLOSED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    /// Set by the telephony `start` event. Outbound audio needs it.
    pub stream_sid: Option<String>,
    pub ai_speaking: bool,
    /// Last forwarded caller frame loud enough to count as activity.
    pub last_user_audio: Instant,
    pub last_ai_audio: Option<Instant>,
    pub last_ai_audio_done: Option<Instant>,
    /// Set by a gate-detected barge-in, cleared when the AI's audio finishes.
    pub barge_in_armed: bool,
    pub nudge_count: u32,
    pub last_nudge: Option<Instant>,
    pub bridging: bool,
    pub ending: bool,
    pub bridge_attempted: bool,
    pub sms_attempted: bool,
    pub greeting_pending: bool,
    pub closed: bool,
}

impl SessionContext {
    /// A fresh context. The silence clock starts at `now`.
    pub fn new(now: Instant) -> Self {
        Self {
            stream_sid: None,
            ai_speaking: false,
            last_user_audio: now,
            last_ai_audio: None,
            last_ai_audio_done: None,
            barge_in_armed: false,
            nudge_count: 0,
            last_nudge: None,
            bridging: false,
            ending: false,
            bridge_attempted: false,
            sms_attempted: false,
            greeting_pending: false,
            closed: false,
        }
    }

    pub fn phase(&self) -> TurnPhase {
        if self.closed {
            TurnPhase::Closed
        } else if self.ending {
            TurnPhase::Ending
        } else if self.bridging {
            TurnPhase::Bridging
        } else if self.greeting_pending {
            TurnPhase::Greeting
        } else if self.ai_speaking {
            TurnPhase::AiSpeaking
        } else if self.last_ai_audio_done.is_some() {
            TurnPhase::Listening
        } else {
            TurnPhase::Idle
        }
    }

    /// An AI audio chunk was received.
    pub fn ai_audio_started(&mut self, now: Instant) {
        self.ai_speaking = true;
        self.last_ai_audio = Some(now);
    }

    /// The AI finished streaming audio for the current response.
    pub fn ai_audio_finished(&mut self, now: Instant) {
        self.ai_speaking = false;
        self.barge_in_armed = false;
        self.greeting_pending = false;
        self.last_ai_audio_done = Some(now);
    }

    /// The caller interrupted the AI loudly enough to count as a barge-in.
    pub fn barge_in(&mut self) {
        self.barge_in_armed = true;
        self.ai_speaking = false;
    }

    /// The backend detected caller speech. Returns true when it confirms an
    /// interruption of AI speech that the gate had already armed.
    pub fn confirm_interruption(&mut self) -> bool {
        if self.ai_speaking && self.barge_in_armed {
            self.ai_speaking = false;
            true
        } else {
            false
        }
    }
}
