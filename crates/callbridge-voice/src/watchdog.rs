//! Silence watchdog: nudges a quiet caller, then gives up.

use crate::config::BridgeTuning;
use crate::context::SessionContext;
use crate::protocol::ClientEvent;
use crate::session::{shutdown_requested, CallSession};
use callbridge_types::ScenarioScript;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    /// The call is ending or closed; the watchdog exits.
    Stop,
    /// The call is being handed off; skip this tick.
    Paused,
    Idle,
    Nudge { attempt: u32 },
    /// Nudges are used up: say goodbye, then hang up.
    Farewell,
    /// Silence exceeded the long threshold: hang up now.
    HardTimeout,
}

/// Evaluates one tick. The watchdog is the only writer of the nudge fields.
pub fn tick(
    ctx: &mut SessionContext,
    script: &ScenarioScript,
    tuning: &BridgeTuning,
    now: Instant,
) -> WatchdogAction {
    if ctx.closed || ctx.ending {
        return WatchdogAction::Stop;
    }
    if ctx.bridging {
        return WatchdogAction::Paused;
    }

    // Caller spoke since the last nudge: start a fresh nudge episode.
    if ctx.last_nudge.is_some_and(|nudged| ctx.last_user_audio > nudged) {
        ctx.nudge_count = 0;
        ctx.last_nudge = None;
    }

    let silent_for = now.saturating_duration_since(ctx.last_user_audio);
    if silent_for > Duration::from_secs(script.silence_long_secs) {
        ctx.ending = true;
        return WatchdogAction::HardTimeout;
    }

    let cooled_down = match ctx.last_nudge {
        Some(nudged) => now.saturating_duration_since(nudged) >= tuning.nudge_cooldown(),
        None => true,
    };
    if silent_for > Duration::from_secs(script.silence_short_secs) && !ctx.ai_speaking && cooled_down
    {
        ctx.last_nudge = Some(now);
        if ctx.nudge_count < tuning.max_nudges {
            ctx.nudge_count += 1;
            return WatchdogAction::Nudge {
                attempt: ctx.nudge_count,
            };
        }
        ctx.ending = true;
        return WatchdogAction::Farewell;
    }

    WatchdogAction::Idle
}

/// Ticks until the call ends, is closed, or the watchdog hangs up.
pub async fn run_watchdog(
    session: Arc<CallSession>,
    script: Arc<ScenarioScript>,
    tuning: Arc<BridgeTuning>,
) {
    let mut shutdown = session.shutdown_signal();
    let call_sid = session.call_sid().to_string();
    let period = tuning.watchdog_tick();
    let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = interval.tick() => {}
        }

        let now = Instant::now();
        let action = session.with_state(|ctx| tick(ctx, &script, &tuning, now));
        match action {
            WatchdogAction::Idle | WatchdogAction::Paused => {}
            WatchdogAction::Stop => break,
            WatchdogAction::Nudge { attempt } => {
                tracing::info!(call_sid = %call_sid, attempt, "caller silent, nudging");
                if let Err(e) = session
                    .send_realtime(ClientEvent::respond_with(tuning.nudge_instructions.clone()))
                    .await
                {
                    tracing::warn!(call_sid = %call_sid, "failed to send nudge: {}", e);
                    session.close_telephony("realtime write failed").await;
                    break;
                }
            }
            WatchdogAction::Farewell => {
                tracing::info!(call_sid = %call_sid, "caller still silent after nudges, saying goodbye");
                let _ = session
                    .send_realtime(ClientEvent::respond_with(tuning.farewell_instructions.clone()))
                    .await;
                tokio::select! {
                    _ = shutdown_requested(&mut shutdown) => {}
                    _ = tokio::time::sleep(tuning.farewell_grace()) => {}
                }
                session.close_telephony("silence farewell").await;
                break;
            }
            WatchdogAction::HardTimeout => {
                tracing::warn!(
                    call_sid = %call_sid,
                    elapsed_secs = script.silence_long_secs,
                    "silence timeout, hanging up"
                );
                session.close_telephony("silence timeout").await;
                break;
            }
        }
    }
}
