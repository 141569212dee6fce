//! Function-call dispatcher.
//!
//! Each invocation is claimed synchronously on the turn loop (flags that
//! must be visible to the next backend event are set before returning) and
//! its side effects then run on their own task, so external REST calls never
//! stall either audio direction.

use crate::collaborators::Collaborators;
use crate::dates::{resolve_relative_date, today_in_call_zone};
use crate::protocol::ClientEvent;
use crate::session::CallSession;
use callbridge_types::{CallRecord, ScenarioScript};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use uuid::Uuid;

/// The closed set of functions the backend may call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    CalculateDate,
    TriggerBridge,
    TriggerSms,
    EndCall,
}

impl ToolName {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "calculate_date" => Some(Self::CalculateDate),
            "trigger_bridge" => Some(Self::TriggerBridge),
            "trigger_sms" => Some(Self::TriggerSms),
            "end_call" => Some(Self::EndCall),
            _ => None,
        }
    }
}

/// One function call requested by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    /// Dispatcher-issued id, used only for log correlation.
    pub id: Uuid,
    /// Backend call id the result must be addressed to.
    pub call_id: String,
    pub name: String,
    pub arguments: Value,
}

impl ToolInvocation {
    /// Malformed argument JSON is treated as an empty argument bag.
    pub fn new(name: String, call_id: String, raw_arguments: &str) -> Self {
        let arguments = if raw_arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(raw_arguments).unwrap_or_else(|e| {
                tracing::warn!(tool = %name, "malformed tool arguments: {}", e);
                Value::Object(Map::new())
            })
        };
        Self {
            id: Uuid::new_v4(),
            call_id,
            name,
            arguments,
        }
    }

    fn string_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// The text returned to the backend and whether it should keep talking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub output: String,
    pub continue_response: bool,
}

impl ToolOutcome {
    fn quiet(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            continue_response: false,
        }
    }

    fn speak(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            continue_response: true,
        }
    }
}

/// Work remaining after an invocation has been claimed.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolPlan {
    Done(ToolOutcome),
    Redirect { destination: String },
    Sms { to: String, body: String },
}

/// Claims an invocation against the call state. Must run on the turn loop.
pub fn plan(
    session: &CallSession,
    script: &ScenarioScript,
    call: &CallRecord,
    invocation: &ToolInvocation,
) -> ToolPlan {
    let Some(tool) = ToolName::parse(&invocation.name) else {
        return ToolPlan::Done(ToolOutcome::speak(format!(
            "Unknown function \"{}\". Continue the conversation.",
            invocation.name
        )));
    };

    match tool {
        ToolName::CalculateDate => {
            let expression = invocation.string_arg("relative_expression").unwrap_or("");
            ToolPlan::Done(calculate_date(expression))
        }
        ToolName::EndCall => {
            session.with_state(|ctx| ctx.ending = true);
            ToolPlan::Done(ToolOutcome::quiet("The call will end now."))
        }
        ToolName::TriggerBridge => {
            if let Some(name) = invocation.string_arg("user_name") {
                tracing::info!(call_sid = %session.call_sid(), user_name = %name, "hand-off requested");
            }
            let Some(destination) = script.handoff_destination() else {
                return ToolPlan::Done(ToolOutcome::speak(
                    "Transfer failed: no operator line is configured for this call. \
                     Tell the caller a transfer is not possible and continue.",
                ));
            };
            let claimed = session.with_state(|ctx| {
                if ctx.bridge_attempted {
                    return false;
                }
                ctx.bridge_attempted = true;
                ctx.bridging = true;
                true
            });
            if !claimed {
                return ToolPlan::Done(ToolOutcome::quiet(
                    "A transfer has already been handled for this call.",
                ));
            }
            ToolPlan::Redirect {
                destination: destination.to_string(),
            }
        }
        ToolName::TriggerSms => {
            let Some(body) = script.render_sms(invocation.string_arg("reason")) else {
                return ToolPlan::Done(ToolOutcome::speak(
                    "SMS failed: no message template is configured for this call. \
                     Tell the caller a text message cannot be sent and continue.",
                ));
            };
            let claimed = session.with_state(|ctx| !std::mem::replace(&mut ctx.sms_attempted, true));
            if !claimed {
                return ToolPlan::Done(ToolOutcome::quiet(
                    "A text message has already been handled for this call.",
                ));
            }
            ToolPlan::Sms {
                to: call.caller_number().to_string(),
                body,
            }
        }
    }
}

/// Formats the `calculate_date` result for a given expression.
pub fn calculate_date(expression: &str) -> ToolOutcome {
    match resolve_relative_date(expression, today_in_call_zone()) {
        Some(date) => ToolOutcome::speak(format!(
            "{} ({})",
            date.format("%Y-%m-%d"),
            date.format("%A")
        )),
        None => ToolOutcome::speak(format!(
            "Could not resolve the date expression \"{expression}\". Ask the caller for a specific date."
        )),
    }
}

async fn execute(
    session: &CallSession,
    collaborators: &Collaborators,
    plan: ToolPlan,
) -> ToolOutcome {
    let call_sid = session.call_sid();
    match plan {
        ToolPlan::Done(outcome) => outcome,
        ToolPlan::Redirect { destination } => {
            match collaborators.call_control.redirect(call_sid, &destination).await {
                Ok(()) => {
                    tracing::info!(call_sid = %call_sid, destination = %destination, "call redirected to operator");
                    match collaborators.repository.mark_bridge_executed(call_sid).await {
                        Ok(true) => {}
                        Ok(false) => {
                            tracing::debug!(call_sid = %call_sid, "hand-off was already recorded")
                        }
                        Err(e) => {
                            tracing::error!(call_sid = %call_sid, "failed to record hand-off: {}", e)
                        }
                    }
                    ToolOutcome::quiet("The call is being transferred to an operator.")
                }
                Err(e) => {
                    tracing::error!(call_sid = %call_sid, "call redirect failed: {}", e);
                    session.with_state(|ctx| ctx.bridging = false);
                    ToolOutcome::speak(
                        "Transfer failed. Apologise to the caller, explain that an operator \
                         could not be reached, and continue the conversation.",
                    )
                }
            }
        }
        ToolPlan::Sms { to, body } => match collaborators.messaging.send_message(&to, &body).await {
            Ok(()) => {
                tracing::info!(call_sid = %call_sid, "sms sent");
                if let Err(e) = collaborators.repository.mark_sms_sent(call_sid).await {
                    tracing::error!(call_sid = %call_sid, "failed to record sms: {}", e);
                }
                ToolOutcome::quiet("The text message has been sent.")
            }
            Err(e) => {
                tracing::error!(call_sid = %call_sid, "sms send failed: {}", e);
                ToolOutcome::speak(
                    "Sending the text message failed. Apologise to the caller and continue \
                     the conversation.",
                )
            }
        },
    }
}

/// Runs tool invocations for one call.
pub struct ToolDispatcher {
    session: Arc<CallSession>,
    script: Arc<ScenarioScript>,
    call: Arc<CallRecord>,
    collaborators: Collaborators,
    tasks: JoinSet<()>,
}

impl ToolDispatcher {
    pub fn new(
        session: Arc<CallSession>,
        script: Arc<ScenarioScript>,
        call: Arc<CallRecord>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            session,
            script,
            call,
            collaborators,
            tasks: JoinSet::new(),
        }
    }

    /// Claims the invocation, then runs its side effects and replies on a
    /// separate task. Exactly one result is sent per invocation.
    pub fn dispatch(&mut self, invocation: ToolInvocation) {
        tracing::info!(
            call_sid = %self.session.call_sid(),
            tool = %invocation.name,
            invocation_id = %invocation.id,
            "tool invoked"
        );
        let plan = plan(&self.session, &self.script, &self.call, &invocation);

        let session = self.session.clone();
        let collaborators = self.collaborators.clone();
        self.tasks.spawn(async move {
            let outcome = execute(&session, &collaborators, plan).await;
            tracing::info!(
                call_sid = %session.call_sid(),
                tool = %invocation.name,
                invocation_id = %invocation.id,
                continue_response = outcome.continue_response,
                "tool finished: {}",
                outcome.output
            );
            let reply = ClientEvent::function_output(invocation.call_id, outcome.output);
            if let Err(e) = session.send_realtime(reply).await {
                tracing::debug!(call_sid = %session.call_sid(), "tool result not delivered: {}", e);
                return;
            }
            if outcome.continue_response {
                let _ = session.send_realtime(ClientEvent::continue_response()).await;
            }
        });

        while let Some(result) = self.tasks.try_join_next() {
            if let Err(e) = result {
                tracing::error!(call_sid = %self.session.call_sid(), "tool task failed: {}", e);
            }
        }
    }

    /// Waits for in-flight tool tasks, aborting whatever is left after `limit`.
    pub async fn drain(&mut self, limit: Duration) {
        let drained = tokio::time::timeout(limit, async {
            while let Some(result) = self.tasks.join_next().await {
                if let Err(e) = result {
                    tracing::error!("tool task failed: {}", e);
                }
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                call_sid = %self.session.call_sid(),
                pending = self.tasks.len(),
                "aborting tool tasks still running at teardown"
            );
            self.tasks.abort_all();
        }
    }
}
