//! Hand-off TwiML: `GET|POST /twilio/bridge_twiml?number=...`.
//!
//! Twilio fetches this after the bridge redirects a live call; the response
//! dials the hand-off destination and ends the media stream.

use axum::extract::Query;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

const NO_DESTINATION_MESSAGE: &str =
    "申し訳ございません。担当者におつなぎできませんでした。お電話ありがとうございました。";

#[derive(Debug, Default, Deserialize)]
pub struct BridgeTwimlParams {
    #[serde(default)]
    pub number: String,
}

pub async fn bridge_twiml_handler(Query(params): Query<BridgeTwimlParams>) -> Response {
    (
        [(header::CONTENT_TYPE, "application/xml")],
        bridge_twiml(&params.number),
    )
        .into_response()
}

/// Renders the TwiML document that dials `number`.
pub fn bridge_twiml(number: &str) -> String {
    let number = number.trim();
    if number.is_empty() {
        tracing::warn!("hand-off twiml requested without a destination number");
        return format!(
            "{XML_DECLARATION}<Response><Say language=\"ja-JP\">{}</Say><Hangup/></Response>",
            escape_xml(NO_DESTINATION_MESSAGE)
        );
    }
    tracing::info!(number = %number, "serving hand-off twiml");
    format!(
        "{XML_DECLARATION}<Response><Dial>{}</Dial></Response>",
        escape_xml(number)
    )
}

fn escape_xml(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dials_the_destination() {
        assert_eq!(
            bridge_twiml(" +81355550000 "),
            format!("{XML_DECLARATION}<Response><Dial>+81355550000</Dial></Response>")
        );
    }

    #[test]
    fn markup_in_the_number_is_escaped() {
        let twiml = bridge_twiml("1</Dial><Play>x&y</Play>");
        assert!(twiml.contains("<Dial>1&lt;/Dial&gt;&lt;Play&gt;x&amp;y&lt;/Play&gt;</Dial>"));
        assert!(!twiml.contains("<Play>"));
    }

    #[test]
    fn empty_number_says_sorry_and_hangs_up() {
        let twiml = bridge_twiml("   ");
        assert!(twiml.contains("<Say language=\"ja-JP\">"));
        assert!(twiml.ends_with("<Hangup/></Response>"));
        assert!(!twiml.contains("<Dial>"));
    }
}
