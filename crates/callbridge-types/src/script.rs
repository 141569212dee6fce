//! The immutable per-call conversation script.

use crate::ConversationMode;
use serde::{Deserialize, Serialize};

/// Everything the bridge needs to know about a scenario for one call.
///
/// Loaded once at stream accept and shared read-only with every bridge task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioScript {
    /// Scenario row identifier.
    pub scenario_id: i64,
    /// Human-readable scenario name.
    pub name: String,
    /// Active questions, ordered by `sort_order`.
    pub questions: Vec<String>,
    /// Closing statements, ordered by `sort_order`.
    pub closings: Vec<String>,
    /// How strictly the question order is followed.
    pub mode: ConversationMode,
    /// Seconds of caller silence before a nudge is considered.
    pub silence_short_secs: u64,
    /// Seconds of caller silence before the call is dropped.
    pub silence_long_secs: u64,
    /// Hand-off destination number, if the scenario allows hand-off.
    pub bridge_destination: Option<String>,
    /// SMS body template. `{reason}` is substituted at send time.
    pub sms_template: Option<String>,
    /// Opening greeting.
    pub greeting: String,
    /// Legal/recording disclaimer read after the greeting.
    pub disclaimer: String,
    /// Guidance read before the first question.
    pub guidance: String,
    /// Whether the scenario may currently take calls.
    pub active: bool,
}

impl ScenarioScript {
    /// Returns the first scripted question, if any.
    pub fn first_question(&self) -> Option<&str> {
        self.questions.first().map(String::as_str)
    }

    /// Returns the hand-off destination when one is configured and non-blank.
    pub fn handoff_destination(&self) -> Option<&str> {
        self.bridge_destination
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }

    /// Renders the SMS template, substituting `{reason}`.
    ///
    /// Returns `None` when the scenario has no usable template.
    pub fn render_sms(&self, reason: Option<&str>) -> Option<String> {
        let template = self.sms_template.as_deref()?.trim();
        if template.is_empty() {
            return None;
        }
        Some(template.replace("{reason}", reason.unwrap_or("")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script() -> ScenarioScript {
        ScenarioScript {
            scenario_id: 7,
            name: "survey".to_string(),
            questions: vec!["Q1".to_string(), "Q2".to_string()],
            closings: vec!["Thanks".to_string()],
            mode: ConversationMode::Strict,
            silence_short_secs: 15,
            silence_long_secs: 60,
            bridge_destination: Some("  ".to_string()),
            sms_template: Some("Materials: {reason}".to_string()),
            greeting: "Hello".to_string(),
            disclaimer: String::new(),
            guidance: String::new(),
            active: true,
        }
    }

    #[test]
    fn blank_destination_is_not_a_handoff_target() {
        let mut s = script();
        assert_eq!(s.handoff_destination(), None);
        s.bridge_destination = Some(" +81300000000 ".to_string());
        assert_eq!(s.handoff_destination(), Some("+81300000000"));
    }

    #[test]
    fn sms_template_substitutes_reason() {
        let s = script();
        assert_eq!(
            s.render_sms(Some("brochure")).as_deref(),
            Some("Materials: brochure")
        );
        assert_eq!(s.render_sms(None).as_deref(), Some("Materials: "));
    }

    #[test]
    fn missing_template_renders_nothing() {
        let mut s = script();
        s.sms_template = Some("   ".to_string());
        assert_eq!(s.render_sms(Some("x")), None);
        s.sms_template = None;
        assert_eq!(s.render_sms(Some("x")), None);
    }

    #[test]
    fn first_question_is_in_order() {
        let mut s = script();
        assert_eq!(s.first_question(), Some("Q1"));
        s.questions.clear();
        assert_eq!(s.first_question(), None);
    }
}
