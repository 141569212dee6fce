//! Duplex connection to the speech-AI realtime backend.
//!
//! A connection is split into two pumps: a writer that serializes each
//! [`ClientEvent`] into exactly one text frame, and a reader that forwards
//! raw text frames to the turn-state controller. Any number of tasks can
//! hold the command sender; frames never interleave mid-message.

use crate::config::RealtimeConfig;
use crate::error::BridgeError;
use crate::protocol::ClientEvent;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, Request};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const CHANNEL_CAPACITY: usize = 256;

/// Upper bound on flushing the close frame to the backend.
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Instructions for the writer pump.
#[derive(Debug, Clone)]
pub enum RealtimeCommand {
    Send(ClientEvent),
    Close,
}

/// An open realtime session: a command sender for the writer pump and a
/// receiver of raw inbound text frames. `events` ends when the connection
/// closes.
pub struct RealtimeSession {
    pub commands: mpsc::Sender<RealtimeCommand>,
    pub events: mpsc::Receiver<String>,
}

/// Opens realtime sessions.
#[async_trait]
pub trait RealtimeConnector: Send + Sync {
    async fn connect(&self) -> Result<RealtimeSession, BridgeError>;
}

/// Connects to an OpenAI-compatible realtime endpoint over WebSocket.
#[derive(Debug, Clone)]
pub struct OpenAiRealtimeConnector {
    config: RealtimeConfig,
}

impl OpenAiRealtimeConnector {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    /// Credential in `Authorization`, beta opt-in in `OpenAI-Beta`.
    fn header_request(&self) -> Result<Request<()>, BridgeError> {
        let mut request = self.base_request()?;
        let headers = request.headers_mut();
        headers.insert(
            header::AUTHORIZATION,
            header_value(&format!("Bearer {}", self.config.api_key))?,
        );
        headers.insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));
        Ok(request)
    }

    /// Credential carried as WebSocket subprotocols, for transports that
    /// cannot pass custom headers.
    fn subprotocol_request(&self) -> Result<Request<()>, BridgeError> {
        let mut request = self.base_request()?;
        request.headers_mut().insert(
            header::SEC_WEBSOCKET_PROTOCOL,
            header_value(&format!(
                "realtime, openai-insecure-api-key.{}, openai-beta.realtime-v1",
                self.config.api_key
            ))?,
        );
        Ok(request)
    }

    fn base_request(&self) -> Result<Request<()>, BridgeError> {
        self.config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Config(format!("invalid realtime url: {e}")))
    }

    async fn open(
        &self,
        request: Request<()>,
    ) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Error> {
        let limit = Duration::from_secs(self.config.connect_timeout_secs);
        match tokio::time::timeout(limit, tokio_tungstenite::connect_async(request)).await {
            Ok(result) => result.map(|(stream, _response)| stream),
            Err(_) => Err(tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "realtime connect timed out",
            ))),
        }
    }
}

#[async_trait]
impl RealtimeConnector for OpenAiRealtimeConnector {
    async fn connect(&self) -> Result<RealtimeSession, BridgeError> {
        if self.config.api_key.is_empty() {
            return Err(BridgeError::Config("realtime api_key is not set".to_string()));
        }

        let stream = match self.open(self.header_request()?).await {
            Ok(stream) => stream,
            Err(e) if is_header_rejection(&e) => {
                tracing::warn!(error = %e, "realtime handshake rejected, retrying with subprotocol credentials");
                self.open(self.subprotocol_request()?)
                    .await
                    .map_err(|e| BridgeError::Handshake(e.to_string()))?
            }
            Err(e) => return Err(BridgeError::Handshake(e.to_string())),
        };

        tracing::info!(url = %self.config.url, "realtime connection established");
        Ok(spawn_pumps(stream))
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BridgeError> {
    HeaderValue::from_str(value)
        .map_err(|e| BridgeError::Config(format!("credential is not a valid header value: {e}")))
}

fn is_header_rejection(error: &tungstenite::Error) -> bool {
    matches!(
        error,
        tungstenite::Error::Http(_) | tungstenite::Error::HttpFormat(_)
    )
}

/// Splits a connected socket into writer and reader pump tasks.
///
/// The writer owns the connection's lifetime: once it sees `Close`, or every
/// command sender is dropped, it sends a close frame (bounded by
/// [`CLOSE_TIMEOUT`]) and stops the reader. Both halves are then dropped and
/// the socket is released even if the backend never answers the close.
pub fn spawn_pumps<S>(stream: WebSocketStream<S>) -> RealtimeSession
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut source) = stream.split();
    let (commands, mut command_rx) = mpsc::channel::<RealtimeCommand>(CHANNEL_CAPACITY);
    let (event_tx, events) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (stop_reader, mut reader_stopped) = oneshot::channel::<()>();

    tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            match command {
                RealtimeCommand::Send(event) => {
                    let text = match encode(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("failed to encode realtime event: {}", e);
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text.into())).await {
                        tracing::debug!("realtime write failed: {}", e);
                        break;
                    }
                }
                RealtimeCommand::Close => break,
            }
        }
        if tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await.is_err() {
            tracing::warn!("realtime close frame not flushed in time, dropping connection");
        }
        let _ = stop_reader.send(());
    });

    tokio::spawn(async move {
        loop {
            let message = tokio::select! {
                _ = &mut reader_stopped => break,
                message = source.next() => message,
            };
            match message {
                Some(Ok(Message::Text(text))) => {
                    if event_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(?frame, "realtime backend closed the connection");
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!("realtime read failed: {}", e);
                    break;
                }
                None => break,
            }
        }
    });

    RealtimeSession { commands, events }
}

fn encode(event: &ClientEvent) -> Result<String, BridgeError> {
    Ok(serde_json::to_string(event)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(key: &str) -> OpenAiRealtimeConnector {
        OpenAiRealtimeConnector::new(RealtimeConfig {
            url: "wss://realtime.example.test/v1/realtime?model=m".to_string(),
            api_key: key.to_string(),
            ..RealtimeConfig::default()
        })
    }

    #[test]
    fn header_request_carries_bearer_and_beta_headers() {
        let request = connector("sk-test").header_request().expect("request");
        assert_eq!(
            request.headers().get(header::AUTHORIZATION).map(|v| v.as_bytes()),
            Some(&b"Bearer sk-test"[..])
        );
        assert_eq!(
            request.headers().get("OpenAI-Beta").map(|v| v.as_bytes()),
            Some(&b"realtime=v1"[..])
        );
    }

    #[test]
    fn subprotocol_request_embeds_credential() {
        let request = connector("sk-test").subprotocol_request().expect("request");
        assert!(request.headers().get(header::AUTHORIZATION).is_none());
        let protocols = request
            .headers()
            .get(header::SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .expect("protocol header");
        assert_eq!(
            protocols,
            "realtime, openai-insecure-api-key.sk-test, openai-beta.realtime-v1"
        );
    }

    #[test]
    fn credential_with_newline_is_a_config_error() {
        let err = connector("bad\nkey").header_request().expect_err("must fail");
        assert!(matches!(err, BridgeError::Config(_)));
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_dialing() {
        let err = connector("").connect().await.err().expect("must fail");
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
