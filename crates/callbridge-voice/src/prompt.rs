//! Natural-language instructions assembled from a scenario script.

use crate::config::BridgeTuning;
use callbridge_types::ScenarioScript;
use std::fmt::Write;

/// Builds the session-level behavioral instructions.
pub fn session_instructions(script: &ScenarioScript, tuning: &BridgeTuning) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are a polite telephone interviewer calling on behalf of \"{}\". Speak {} only. \
         Keep every turn short and natural for a phone call.",
        script.name, tuning.language
    );
    let _ = writeln!(out, "Conversation mode: {}.", script.mode.describe());

    if !script.questions.is_empty() {
        out.push_str("\nQuestions:\n");
        for (i, question) in script.questions.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, question);
        }
    }

    if !script.closings.is_empty() {
        out.push_str("\nAfter the last question, read these closing statements in order:\n");
        for (i, closing) in script.closings.iter().enumerate() {
            let _ = writeln!(out, "{}. {}", i + 1, closing);
        }
    }

    if !tuning.banned_fillers.is_empty() {
        let _ = writeln!(
            out,
            "\nNever use these filler phrases: {}.",
            tuning.banned_fillers.join(", ")
        );
    }

    out.push_str("\nTools:\n");
    out.push_str(
        "- Whenever the caller mentions a relative date, call calculate_date and read back the \
         absolute date it returns. Never compute dates yourself.\n",
    );
    if script.handoff_destination().is_some() {
        out.push_str(
            "- If the caller asks to speak to a person, call trigger_bridge. Do not speak \
             afterwards unless the tool reports a failure.\n",
        );
    } else {
        out.push_str("- Transfers to a person are not available on this call.\n");
    }
    if script.render_sms(None).is_some() {
        out.push_str(
            "- If the caller asks for materials or details in writing, call trigger_sms.\n",
        );
    }
    out.push_str(
        "- Immediately after reading the final closing statement, call end_call. \
         Do not say anything after calling it.\n",
    );

    out
}

/// The spoken opening: greeting, disclaimer and guidance, then the first question.
pub fn opening_text(script: &ScenarioScript) -> String {
    let mut parts: Vec<&str> = [
        script.greeting.as_str(),
        script.disclaimer.as_str(),
        script.guidance.as_str(),
    ]
    .into_iter()
    .map(str::trim)
    .filter(|p| !p.is_empty())
    .collect();

    if let Some(first) = script.first_question() {
        parts.push(first.trim());
    }
    parts.join(" ")
}

/// Per-response instructions for the greeting.
pub fn greeting_instructions(script: &ScenarioScript) -> String {
    format!(
        "Read the following text aloud exactly as written. Do not add greetings, \
         acknowledgements or any filler before or after it, then wait for the caller:\n{}",
        opening_text(script)
    )
}
