//! Turn-state controller: consumes realtime backend events.

use crate::config::BridgeTuning;
use crate::context::SessionContext;
use crate::protocol::{ClientEvent, ErrorDetail, ServerEvent};
use crate::session::{shutdown_requested, CallSession};
use crate::telephony::TelephonyFrame;
use crate::tools::{ToolDispatcher, ToolInvocation};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// What the controller must do after applying an event to the context.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnAction {
    Nothing,
    /// Write AI audio to the telephony socket.
    Relay { stream_sid: String, payload: String },
    /// AI audio arrived before the telephony stream started.
    DropAudio,
    /// Clear buffered telephony audio and cancel the AI response.
    Interrupt { stream_sid: Option<String> },
    /// The conversation is over; hang up after the grace interval.
    HangUp,
    Tool(ToolInvocation),
    BackendError(ErrorDetail),
}

/// Applies one backend event to the context. Events are applied strictly
/// in arrival order.
pub fn apply(ctx: &mut SessionContext, event: ServerEvent, now: Instant) -> TurnAction {
    match event {
        ServerEvent::AudioDelta { delta } => {
            if delta.is_empty() {
                return TurnAction::Nothing;
            }
            ctx.ai_audio_started(now);
            match &ctx.stream_sid {
                Some(sid) => TurnAction::Relay {
                    stream_sid: sid.clone(),
                    payload: delta,
                },
                None => TurnAction::DropAudio,
            }
        }
        ServerEvent::AudioDone => {
            ctx.ai_audio_finished(now);
            TurnAction::Nothing
        }
        ServerEvent::ResponseDone => {
            ctx.greeting_pending = false;
            if ctx.ending {
                TurnAction::HangUp
            } else {
                TurnAction::Nothing
            }
        }
        ServerEvent::SpeechStarted => {
            if ctx.confirm_interruption() {
                TurnAction::Interrupt {
                    stream_sid: ctx.stream_sid.clone(),
                }
            } else {
                TurnAction::Nothing
            }
        }
        ServerEvent::FunctionCallArgumentsDone {
            name,
            call_id,
            arguments,
        } => TurnAction::Tool(ToolInvocation::new(name, call_id, &arguments)),
        ServerEvent::Error { error } => TurnAction::BackendError(error),
        ServerEvent::Other => TurnAction::Nothing,
    }
}

/// Runs until the realtime connection closes or the call shuts down.
pub async fn run_turns(
    session: Arc<CallSession>,
    tuning: Arc<BridgeTuning>,
    mut events: mpsc::Receiver<String>,
    dispatcher: &mut ToolDispatcher,
) {
    let mut shutdown = session.shutdown_signal();
    let call_sid = session.call_sid().to_string();

    loop {
        let text = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            message = events.recv() => match message {
                Some(text) => text,
                None => {
                    tracing::info!(call_sid = %call_sid, "realtime connection closed");
                    session.close_telephony("realtime connection closed").await;
                    break;
                }
            },
        };

        let event = match ServerEvent::parse(&text) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(call_sid = %call_sid, "ignoring malformed realtime event: {}", e);
                continue;
            }
        };

        let action = session.with_state(|ctx| apply(ctx, event, Instant::now()));
        match action {
            TurnAction::Nothing => {}
            TurnAction::Relay {
                stream_sid,
                payload,
            } => {
                if let Err(e) = session
                    .send_frame(TelephonyFrame::media(&stream_sid, payload))
                    .await
                {
                    tracing::debug!(call_sid = %call_sid, "failed to relay AI audio: {}", e);
                    session.close_telephony("telephony write failed").await;
                    break;
                }
            }
            TurnAction::DropAudio => {
                tracing::debug!(call_sid = %call_sid, "dropping AI audio before stream start");
            }
            TurnAction::Interrupt { stream_sid } => {
                tracing::info!(call_sid = %call_sid, "caller interruption confirmed");
                if let Some(sid) = stream_sid.as_deref() {
                    let _ = session.send_frame(TelephonyFrame::clear(sid)).await;
                }
                let _ = session.send_realtime(ClientEvent::ResponseCancel).await;
            }
            TurnAction::HangUp => {
                tracing::info!(call_sid = %call_sid, "final response finished, hanging up");
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => {}
                    _ = tokio::time::sleep(tuning.end_call_grace()) => {}
                }
                session.close_telephony("conversation ended").await;
                break;
            }
            TurnAction::Tool(invocation) => dispatcher.dispatch(invocation),
            TurnAction::BackendError(error) => {
                tracing::error!(
                    call_sid = %call_sid,
                    kind = ?error.kind,
                    code = ?error.code,
                    "realtime backend error: {}",
                    error.message.as_deref().unwrap_or("unknown")
                );
            }
        }
    }
}
