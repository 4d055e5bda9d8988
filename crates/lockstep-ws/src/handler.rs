use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;
use tokio::time::Duration;

use lockstep_core::events::{ClientEvent, ServerEvent};
use lockstep_core::AppState;

use crate::session::Session;

const PING_INTERVAL_SECS: u64 = 20;
const MAX_CONNECTIONS_DEFAULT: usize = 256;

static ACTIVE_CONNECTIONS: AtomicUsize = AtomicUsize::new(0);
static MAX_CONNECTIONS: OnceLock<usize> = OnceLock::new();

fn max_connections() -> usize {
    *MAX_CONNECTIONS.get_or_init(|| {
        std::env::var("LOCKSTEP_WS_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
            .unwrap_or(MAX_CONNECTIONS_DEFAULT)
    })
}

struct ConnectionGuard {
    acquired: bool,
}

impl ConnectionGuard {
    fn try_acquire() -> Self {
        let limit = max_connections();
        let mut current = ACTIVE_CONNECTIONS.load(Ordering::SeqCst);
        loop {
            if current >= limit {
                return Self { acquired: false };
            }
            match ACTIVE_CONNECTIONS.compare_exchange(
                current,
                current + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return Self { acquired: true },
                Err(observed) => current = observed,
            }
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.acquired {
            ACTIVE_CONNECTIONS.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &ServerEvent) -> Result<(), ()> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("failed to encode sync event: {err}");
            return Ok(());
        }
    };
    sender.send(Message::Text(payload.into())).await.map_err(|_| ())
}

pub async fn handle_connection(socket: WebSocket, state: AppState) {
    let connection_guard = ConnectionGuard::try_acquire();
    if !connection_guard.acquired {
        let (mut sender, _) = socket.split();
        let _ = sender
            .send(Message::Close(Some(CloseFrame {
                code: 1013,
                reason: "Sync channel is at connection capacity".into(),
            })))
            .await;
        return;
    }

    let session = Session::new();
    let (mut sender, receiver) = socket.split();

    let ack = match state.coordinator.connect(session.session_id).await {
        Ok(ack) => ack,
        Err(err) => {
            tracing::error!("sync registration failed: {err}");
            let _ = sender.close().await;
            return;
        }
    };

    // Bring the joiner up to date before any broadcast can reach it. The
    // registration already suspended playback if a stream was running, so
    // the snapshot here is never mid-play for a fresh session.
    if send_event(
        &mut sender,
        &ServerEvent::VideoStateUpdate(ack.snapshot),
    )
    .await
    .is_err()
    {
        state.coordinator.disconnect(session.session_id).await;
        return;
    }

    let reason = run_session(&mut sender, receiver, &session, &state, ack.events).await;
    tracing::info!(
        session_id = %session.session_id,
        uptime_seconds = session.uptime_seconds(),
        "viewer session ended: {reason}"
    );
    state.coordinator.disconnect(session.session_id).await;
}

async fn run_session(
    sender: &mut SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    session: &Session,
    state: &AppState,
    mut events: tokio::sync::broadcast::Receiver<ServerEvent>,
) -> String {
    let mut ping_interval = tokio::time::interval(Duration::from_secs(PING_INTERVAL_SECS));
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(ClientEvent::UserInteraction) => {
                                state.coordinator.interaction(session.session_id).await;
                            }
                            Ok(ClientEvent::Control(control)) => {
                                state.coordinator.control(session.session_id, control).await;
                            }
                            Err(err) => {
                                tracing::debug!(
                                    session_id = %session.session_id,
                                    "ignoring unparseable client frame: {err}"
                                );
                            }
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(frame) => format!(
                                "client close frame (code={}, reason={})",
                                frame.code, frame.reason
                            ),
                            None => "client close frame (no code/reason)".to_string(),
                        };
                    }
                    Some(Err(err)) => break format!("websocket receive error: {err}"),
                    None => break "websocket stream ended".to_string(),
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        if send_event(sender, &event).await.is_err() {
                            break "websocket send error".to_string();
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        // A stale viewer only desynchronizes until the next
                        // state broadcast; the corrective pass on the next
                        // registry change realigns the gate.
                        tracing::warn!(
                            session_id = %session.session_id,
                            skipped,
                            "sync event stream lagged"
                        );
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        break "sync event stream closed".to_string();
                    }
                }
            }
            _ = ping_interval.tick() => {
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break "websocket ping send error".to_string();
                }
            }
        }
    }
}
