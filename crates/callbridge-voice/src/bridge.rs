//! Bridge supervisor: owns the lifecycle of one bridged call.

use crate::collaborators::{CallControl, CallRepository, Collaborators, Messaging};
use crate::config::{BridgeTuning, RealtimeConfig};
use crate::context::SessionContext;
use crate::error::BridgeError;
use crate::ingress::run_ingress;
use crate::prompt::{greeting_instructions, session_instructions};
use crate::protocol::{ClientEvent, SessionConfig};
use crate::realtime::RealtimeConnector;
use crate::session::CallSession;
use crate::telephony::{TelephonyChannel, TelephonyCommand};
use crate::tools::ToolDispatcher;
use crate::turn::run_turns;
use crate::watchdog::run_watchdog;
use callbridge_types::{CallRecord, ScenarioScript};
use std::sync::Arc;
use tokio::time::Instant;

/// Everything a bridge needs besides the telephony socket.
#[derive(Clone)]
pub struct BridgeDeps {
    pub repository: Arc<dyn CallRepository>,
    pub call_control: Arc<dyn CallControl>,
    pub messaging: Arc<dyn Messaging>,
    pub connector: Arc<dyn RealtimeConnector>,
    pub realtime: RealtimeConfig,
    pub tuning: Arc<BridgeTuning>,
}

/// Why a stream was closed without bridging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnknownCall,
    NoScenario,
    ScenarioInactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeOutcome {
    Rejected(Rejection),
    Completed,
}

async fn bootstrap(
    call_sid: &str,
    repository: &dyn CallRepository,
) -> Result<Result<(CallRecord, ScenarioScript), Rejection>, BridgeError> {
    let Some(call) = repository.load_call(call_sid).await? else {
        return Ok(Err(Rejection::UnknownCall));
    };
    let Some(scenario_id) = call.scenario_id else {
        return Ok(Err(Rejection::NoScenario));
    };
    let Some(script) = repository.load_script(scenario_id).await? else {
        return Ok(Err(Rejection::NoScenario));
    };
    if !script.active {
        return Ok(Err(Rejection::ScenarioInactive));
    }
    Ok(Ok((call, script)))
}

/// Runs the bridge for one accepted media stream.
///
/// Returns once the ingress, turn and watchdog loops have all finished. Both
/// the telephony socket and the realtime connection are closed exactly once
/// on every path.
pub async fn run_bridge(
    call_sid: &str,
    channel: TelephonyChannel,
    deps: &BridgeDeps,
) -> Result<BridgeOutcome, BridgeError> {
    let TelephonyChannel { inbound, outbound } = channel;

    let (call, script) = match bootstrap(call_sid, deps.repository.as_ref()).await {
        Ok(Ok(loaded)) => loaded,
        Ok(Err(rejection)) => {
            tracing::warn!(call_sid = %call_sid, ?rejection, "rejecting media stream");
            let _ = outbound.send(TelephonyCommand::Close).await;
            return Ok(BridgeOutcome::Rejected(rejection));
        }
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "failed to load call: {}", e);
            let _ = outbound.send(TelephonyCommand::Close).await;
            return Err(e);
        }
    };

    let realtime = match deps.connector.connect().await {
        Ok(realtime) => realtime,
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "realtime connect failed: {}", e);
            let _ = outbound.send(TelephonyCommand::Close).await;
            return Err(e);
        }
    };

    let mut context = SessionContext::new(Instant::now());
    context.bridge_attempted = call.bridge_executed;
    context.sms_attempted = call.sms_sent;
    context.greeting_pending = true;

    let session = Arc::new(CallSession::new(
        call_sid,
        context,
        outbound,
        realtime.commands,
    ));
    let script = Arc::new(script);
    let tuning = deps.tuning.clone();

    let configured = async {
        session
            .send_realtime(ClientEvent::SessionUpdate {
                session: SessionConfig::new(session_instructions(&script, &tuning), &deps.realtime),
            })
            .await?;
        session
            .send_realtime(ClientEvent::respond_with(greeting_instructions(&script)))
            .await
    }
    .await;
    if let Err(e) = configured {
        tracing::error!(call_sid = %call_sid, "failed to configure realtime session: {}", e);
        session.close_telephony("realtime setup failed").await;
        session.close_realtime().await;
        return Err(e);
    }
    tracing::info!(
        call_sid = %call_sid,
        scenario_id = script.scenario_id,
        mode = script.mode.as_tag(),
        questions = script.questions.len(),
        "greeting sent"
    );

    let mut dispatcher = ToolDispatcher::new(
        session.clone(),
        script.clone(),
        Arc::new(call),
        Collaborators {
            repository: deps.repository.clone(),
            call_control: deps.call_control.clone(),
            messaging: deps.messaging.clone(),
        },
    );

    tokio::join!(
        run_ingress(session.clone(), tuning.clone(), inbound),
        run_turns(session.clone(), tuning.clone(), realtime.events, &mut dispatcher),
        run_watchdog(session.clone(), script.clone(), tuning.clone()),
    );

    dispatcher.drain(tuning.tool_drain_timeout()).await;
    session.close_telephony("bridge finished").await;
    session.close_realtime().await;

    let phase = session.with_state(|ctx| ctx.phase());
    tracing::info!(call_sid = %call_sid, %phase, "bridge finished");
    Ok(BridgeOutcome::Completed)
}
