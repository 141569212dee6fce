//! Telephony ingress gate: decides, frame by frame, what reaches the AI.

use crate::codec::payload_loudness;
use crate::config::BridgeTuning;
use crate::context::SessionContext;
use crate::protocol::ClientEvent;
use crate::session::{shutdown_requested, CallSession};
use crate::telephony::{AudioFrame, TelephonyEvent, TelephonyFrame};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Why a frame was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    NotInbound,
    Bridging,
    EchoTail,
    SpeakingGuard,
    BelowBargeIn,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateDecision {
    Drop(DropReason),
    Forward,
    /// Forward, and interrupt the AI first.
    BargeIn { loudness: f64 },
}

/// Applies the gate rules to one frame, as of the frame's arrival time.
///
/// Barge-in is applied to `ctx` here, inside the caller's critical section,
/// so at most one frame can interrupt a given utterance.
pub fn evaluate(
    ctx: &mut SessionContext,
    frame: &AudioFrame,
    tuning: &BridgeTuning,
) -> GateDecision {
    let now = frame.received_at;
    if !frame.is_inbound() {
        return GateDecision::Drop(DropReason::NotInbound);
    }
    if ctx.bridging {
        return GateDecision::Drop(DropReason::Bridging);
    }
    if let Some(done) = ctx.last_ai_audio_done {
        if now.saturating_duration_since(done) < tuning.post_speech_suppression() {
            return GateDecision::Drop(DropReason::EchoTail);
        }
    }

    let mut loudness = None;
    let mut decision = GateDecision::Forward;

    if ctx.ai_speaking {
        if let Some(last) = ctx.last_ai_audio {
            if now.saturating_duration_since(last) < tuning.speaking_guard() {
                return GateDecision::Drop(DropReason::SpeakingGuard);
            }
        }
        let level = payload_loudness(&frame.payload);
        if level < tuning.barge_in_threshold {
            return GateDecision::Drop(DropReason::BelowBargeIn);
        }
        ctx.barge_in();
        loudness = Some(level);
        decision = GateDecision::BargeIn { loudness: level };
    }

    let counts_as_activity = tuning.silence_activity_threshold <= 0.0
        || loudness.unwrap_or_else(|| payload_loudness(&frame.payload))
            >= tuning.silence_activity_threshold;
    if counts_as_activity {
        ctx.last_user_audio = now;
    }

    decision
}

/// Reads the telephony socket until it disconnects or the call shuts down.
pub async fn run_ingress(
    session: Arc<CallSession>,
    tuning: Arc<BridgeTuning>,
    mut inbound: mpsc::Receiver<String>,
) {
    let mut shutdown = session.shutdown_signal();
    let call_sid = session.call_sid().to_string();

    loop {
        let text = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            message = inbound.recv() => match message {
                Some(text) => text,
                None => {
                    tracing::info!(call_sid = %call_sid, "telephony socket disconnected");
                    session.close_telephony("telephony disconnected").await;
                    break;
                }
            },
        };

        let event = match TelephonyEvent::parse(&text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, "ignoring malformed telephony message: {}", e);
                continue;
            }
        };

        match event {
            TelephonyEvent::Start { start } => {
                tracing::info!(call_sid = %call_sid, stream_sid = %start.stream_sid, "media stream started");
                if let Some(announced) = start.call_sid.as_deref().filter(|sid| *sid != call_sid) {
                    tracing::warn!(
                        call_sid = %call_sid,
                        announced_call_sid = %announced,
                        "media stream announced a different call"
                    );
                }
                session.with_state(|ctx| ctx.stream_sid = Some(start.stream_sid));
            }
            TelephonyEvent::Media { media } => {
                let frame = AudioFrame::from_media(media, Instant::now());
                let (decision, stream_sid) = session.with_state(|ctx| {
                    (evaluate(ctx, &frame, &tuning), ctx.stream_sid.clone())
                });

                match decision {
                    GateDecision::Drop(reason) => {
                        tracing::trace!(call_sid = %call_sid, ?reason, "inbound frame dropped");
                        continue;
                    }
                    GateDecision::BargeIn { loudness } => {
                        tracing::info!(call_sid = %call_sid, loudness, "caller barged in");
                        if let Some(sid) = stream_sid.as_deref() {
                            let _ = session.send_frame(TelephonyFrame::clear(sid)).await;
                        }
                        let _ = session.send_realtime(ClientEvent::ResponseCancel).await;
                    }
                    GateDecision::Forward => {}
                }

                if let Err(e) = session
                    .send_realtime(ClientEvent::InputAudioBufferAppend {
                        audio: frame.payload,
                    })
                    .await
                {
                    tracing::warn!(call_sid = %call_sid, "failed to forward caller audio: {}", e);
                    session.close_telephony("realtime write failed").await;
                    break;
                }
            }
            TelephonyEvent::Dtmf { dtmf } => {
                tracing::info!(call_sid = %call_sid, digit = %dtmf.digit, "dtmf received");
            }
            TelephonyEvent::Stop => {
                tracing::info!(call_sid = %call_sid, "media stream stopped");
                session.close_telephony("stream stopped").await;
                break;
            }
            TelephonyEvent::Other => {}
        }
    }
}
