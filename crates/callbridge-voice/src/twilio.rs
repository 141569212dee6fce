//! Twilio REST collaborator: live-call redirect and SMS.

use crate::collaborators::{CallControl, Messaging};
use crate::config::TwilioConfig;
use crate::error::BridgeError;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Path of the TwiML endpoint that dials the hand-off destination.
pub const BRIDGE_TWIML_PATH: &str = "/twilio/bridge_twiml";

/// Builds the hand-off TwiML URL on the public origin of `public_base_url`.
pub fn handoff_url(public_base_url: &str, destination: &str) -> Result<String, BridgeError> {
    let mut url = Url::parse(public_base_url)
        .map_err(|e| BridgeError::Config(format!("invalid public_base_url: {e}")))?;
    url.set_path(BRIDGE_TWIML_PATH);
    url.set_query(None);
    url.set_fragment(None);
    url.query_pairs_mut().append_pair("number", destination);
    Ok(url.into())
}

#[derive(Debug, Clone)]
pub struct TwilioClient {
    http: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioClient {
    pub fn new(config: TwilioConfig) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build http client: {e}")))?;
        Ok(Self { http, config })
    }

    fn account_url(&self, resource: &str) -> Result<String, BridgeError> {
        if self.config.account_sid.is_empty() {
            return Err(BridgeError::Config("twilio account_sid is not set".to_string()));
        }
        Ok(format!(
            "{}/2010-04-01/Accounts/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid,
            resource
        ))
    }

    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<(), BridgeError> {
        let response = self
            .http
            .post(url)
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(form)
            .send()
            .await
            .map_err(|e| BridgeError::Collaborator(format!("twilio request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(BridgeError::Collaborator(format!(
            "twilio returned {status}: {body}"
        )))
    }
}

#[async_trait]
impl CallControl for TwilioClient {
    async fn redirect(&self, call_sid: &str, destination: &str) -> Result<(), BridgeError> {
        let twiml_url = handoff_url(&self.config.public_base_url, destination)?;
        let url = self.account_url(&format!("Calls/{call_sid}.json"))?;
        self.post_form(&url, &[("Url", twiml_url.as_str()), ("Method", "POST")])
            .await
    }
}

#[async_trait]
impl Messaging for TwilioClient {
    async fn send_message(&self, to: &str, body: &str) -> Result<(), BridgeError> {
        if self.config.sms_from.is_empty() {
            return Err(BridgeError::Config("twilio sms_from is not set".to_string()));
        }
        let url = self.account_url("Messages.json")?;
        self.post_form(
            &url,
            &[("From", self.config.sms_from.as_str()), ("To", to), ("Body", body)],
        )
        .await
    }
}
