//! Shared handle for one bridged call.

use crate::context::SessionContext;
use crate::error::BridgeError;
use crate::protocol::ClientEvent;
use crate::realtime::RealtimeCommand;
use crate::telephony::{TelephonyCommand, TelephonyFrame};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tokio::sync::{mpsc, watch};

/// State and outputs shared by the ingress, turn and watchdog loops and by
/// tool tasks.
pub struct CallSession {
    call_sid: String,
    state: Mutex<SessionContext>,
    telephony: mpsc::Sender<TelephonyCommand>,
    realtime: mpsc::Sender<RealtimeCommand>,
    shutdown: watch::Sender<bool>,
    telephony_closed: AtomicBool,
    realtime_closed: AtomicBool,
}

impl CallSession {
    pub fn new(
        call_sid: impl Into<String>,
        context: SessionContext,
        telephony: mpsc::Sender<TelephonyCommand>,
        realtime: mpsc::Sender<RealtimeCommand>,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            call_sid: call_sid.into(),
            state: Mutex::new(context),
            telephony,
            realtime,
            shutdown,
            telephony_closed: AtomicBool::new(false),
            realtime_closed: AtomicBool::new(false),
        }
    }

    pub fn call_sid(&self) -> &str {
        &self.call_sid
    }

    /// Runs `f` with exclusive access to the context.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut SessionContext) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub async fn send_frame(&self, frame: TelephonyFrame) -> Result<(), BridgeError> {
        if self.telephony_closed.load(Ordering::Acquire) {
            return Err(BridgeError::Closed);
        }
        self.telephony
            .send(TelephonyCommand::Send(frame))
            .await
            .map_err(|_| BridgeError::Transport("telephony socket gone".to_string()))
    }

    /// Queues one complete event for the realtime writer.
    pub async fn send_realtime(&self, event: ClientEvent) -> Result<(), BridgeError> {
        if self.realtime_closed.load(Ordering::Acquire) {
            return Err(BridgeError::Closed);
        }
        self.realtime
            .send(RealtimeCommand::Send(event))
            .await
            .map_err(|_| BridgeError::Transport("realtime connection gone".to_string()))
    }

    /// Closes the telephony socket and signals shutdown to every loop.
    ///
    /// Returns `false` when the socket had already been closed.
    pub async fn close_telephony(&self, reason: &str) -> bool {
        if self.telephony_closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.with_state(|ctx| ctx.closed = true);
        tracing::info!(call_sid = %self.call_sid, reason, "closing telephony stream");
        let _ = self.telephony.send(TelephonyCommand::Close).await;
        self.shutdown.send_replace(true);
        true
    }

    /// Closes the realtime connection. Idempotent.
    pub async fn close_realtime(&self) -> bool {
        if self.realtime_closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        tracing::debug!(call_sid = %self.call_sid, "closing realtime connection");
        let _ = self.realtime.send(RealtimeCommand::Close).await;
        self.shutdown.send_replace(true);
        true
    }

    pub fn is_shutting_down(&self) -> bool {
        *self.shutdown.borrow()
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

/// Resolves once shutdown has been signalled.
pub async fn shutdown_requested(signal: &mut watch::Receiver<bool>) {
    let _ = signal.wait_for(|stop| *stop).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn session() -> (
        CallSession,
        mpsc::Receiver<TelephonyCommand>,
        mpsc::Receiver<RealtimeCommand>,
    ) {
        let (tel_tx, tel_rx) = mpsc::channel(8);
        let (rt_tx, rt_rx) = mpsc::channel(8);
        let session = CallSession::new("CA1", SessionContext::new(Instant::now()), tel_tx, rt_tx);
        (session, tel_rx, rt_rx)
    }

    #[tokio::test]
    async fn telephony_closes_once_and_signals_shutdown() {
        let (session, mut tel_rx, _rt_rx) = session();
        let mut signal = session.shutdown_signal();

        assert!(session.close_telephony("test").await);
        assert!(!session.close_telephony("again").await);

        assert_eq!(tel_rx.recv().await, Some(TelephonyCommand::Close));
        assert!(tel_rx.try_recv().is_err());
        shutdown_requested(&mut signal).await;
        assert!(session.with_state(|ctx| ctx.closed));

        let err = session
            .send_frame(TelephonyFrame::clear("MZ1"))
            .await
            .expect_err("closed socket rejects frames");
        assert!(matches!(err, BridgeError::Closed));
    }

    #[tokio::test]
    async fn realtime_close_is_idempotent() {
        let (session, _tel_rx, mut rt_rx) = session();
        assert!(session.close_realtime().await);
        assert!(!session.close_realtime().await);
        assert!(matches!(rt_rx.recv().await, Some(RealtimeCommand::Close)));
        assert!(session.is_shutting_down());
        assert!(matches!(
            session.send_realtime(ClientEvent::ResponseCancel).await,
            Err(BridgeError::Closed)
        ));
    }
}
