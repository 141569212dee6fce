//! Media-stream WebSocket endpoint: `GET /realtime/stream/{call_sid}`.
//!
//! Twilio opens this socket when the call's TwiML starts a `<Stream>`. The
//! handler pumps frames between the socket and a [`TelephonyChannel`] and
//! hands the channel to the bridge.

use crate::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::Path;
use axum::response::IntoResponse;
use axum::Extension;
use callbridge_voice::{run_bridge, BridgeOutcome, TelephonyChannel, TelephonyCommand};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;

const CHANNEL_CAPACITY: usize = 256;

pub async fn stream_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_sid): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    tracing::info!(call_sid = %call_sid, "media stream connecting");
    ws.on_upgrade(move |socket| handle_stream(socket, state, call_sid))
}

async fn handle_stream(socket: WebSocket, state: Arc<AppState>, call_sid: String) {
    let (mut sender, mut receiver) = socket.split();
    let (inbound_tx, inbound) = mpsc::channel::<String>(CHANNEL_CAPACITY);
    let (outbound, mut outbound_rx) = mpsc::channel::<TelephonyCommand>(CHANNEL_CAPACITY);

    // Writer: one JSON text frame per command, close frame on `Close`.
    let send_task = tokio::spawn(async move {
        while let Some(command) = outbound_rx.recv().await {
            match command {
                TelephonyCommand::Send(frame) => {
                    let text = match serde_json::to_string(&frame) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!("failed to encode telephony frame: {}", e);
                            continue;
                        }
                    };
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                TelephonyCommand::Close => break,
            }
        }
        let _ = sender.close().await;
    });

    // Reader: text frames go to the ingress gate until the provider hangs up.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(message)) = receiver.next().await {
            match message {
                Message::Text(text) => {
                    if inbound_tx.send(text.as_str().to_owned()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let channel = TelephonyChannel { inbound, outbound };
    match run_bridge(&call_sid, channel, &state.bridge).await {
        Ok(BridgeOutcome::Completed) => {
            tracing::info!(call_sid = %call_sid, "media stream finished");
        }
        Ok(BridgeOutcome::Rejected(rejection)) => {
            tracing::info!(call_sid = %call_sid, ?rejection, "media stream rejected");
        }
        Err(e) => {
            tracing::error!(call_sid = %call_sid, "bridge failed: {}", e);
        }
    }

    recv_task.abort();
    let _ = send_task.await;
}
