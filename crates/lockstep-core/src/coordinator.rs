use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use uuid::Uuid;

use crate::error::CoreError;
use crate::events::{ClientControl, ControlKind, EventBus, GatePayload, ServerEvent};
use crate::library::VideoLibrary;
use crate::playback::{ControlAction, PlaybackState};
use crate::registry::{ViewerCounts, ViewerRegistry};

const INBOX_CAPACITY: usize = 256;

/// Operator intents arriving from the command surface. Every one resolves to
/// a human-readable outcome string that the front end relays verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartStream { index: usize },
    Play,
    Pause,
    Resume,
    Clear,
    ForcePlay,
}

/// Reply to a session registration: the snapshot that brings the joiner up
/// to date plus its subscription to all subsequent broadcasts.
pub struct ConnectAck {
    pub snapshot: PlaybackState,
    pub events: broadcast::Receiver<ServerEvent>,
}

enum Message {
    Connect {
        session_id: Uuid,
        reply: oneshot::Sender<ConnectAck>,
    },
    Disconnect {
        session_id: Uuid,
    },
    Interaction {
        session_id: Uuid,
    },
    Control {
        session_id: Uuid,
        control: ClientControl,
    },
    Command {
        command: Command,
        reply: oneshot::Sender<String>,
    },
    ViewerCounts {
        reply: oneshot::Sender<ViewerCounts>,
    },
}

/// Handle used by the transport and command layers to talk to the
/// coordinator actor. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Message>,
}

impl CoordinatorHandle {
    /// Register a viewer session. The reply carries the current playback
    /// snapshot and the broadcast subscription for this session.
    pub async fn connect(&self, session_id: Uuid) -> Result<ConnectAck, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::Connect { session_id, reply })
            .await
            .map_err(|_| CoreError::CoordinatorClosed)?;
        rx.await.map_err(|_| CoreError::CoordinatorClosed)
    }

    pub async fn disconnect(&self, session_id: Uuid) {
        let _ = self.tx.send(Message::Disconnect { session_id }).await;
    }

    pub async fn interaction(&self, session_id: Uuid) {
        let _ = self.tx.send(Message::Interaction { session_id }).await;
    }

    pub async fn control(&self, session_id: Uuid, control: ClientControl) {
        let _ = self.tx.send(Message::Control { session_id, control }).await;
    }

    pub async fn command(&self, command: Command) -> Result<String, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::Command { command, reply })
            .await
            .map_err(|_| CoreError::CoordinatorClosed)?;
        rx.await.map_err(|_| CoreError::CoordinatorClosed)
    }

    pub async fn viewer_counts(&self) -> Result<ViewerCounts, CoreError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::ViewerCounts { reply })
            .await
            .map_err(|_| CoreError::CoordinatorClosed)?;
        rx.await.map_err(|_| CoreError::CoordinatorClosed)
    }
}

/// The coordination engine: owns the playback state, the viewer registry and
/// the active-stream identifier, and is the only writer of all three.
///
/// It runs as a single-consumer actor; each inbound event is handled to
/// completion, including every broadcast it causes, before the next one is
/// dequeued, so near-simultaneous triggers are serialized in arrival order.
pub struct Coordinator {
    state: PlaybackState,
    registry: ViewerRegistry,
    active_stream: Option<String>,
    library: Arc<VideoLibrary>,
    bus: EventBus,
}

impl Coordinator {
    pub fn new(library: Arc<VideoLibrary>, bus: EventBus) -> Self {
        Self {
            state: PlaybackState::new(),
            registry: ViewerRegistry::new(),
            active_stream: None,
            library,
            bus,
        }
    }

    /// Spawn the actor loop and return the handle the rest of the process
    /// uses to reach it.
    pub fn spawn(library: Arc<VideoLibrary>, bus: EventBus) -> CoordinatorHandle {
        let (tx, mut rx) = mpsc::channel(INBOX_CAPACITY);
        let mut coordinator = Self::new(library, bus);
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                coordinator.handle_message(message);
            }
            tracing::info!("sync coordinator stopped (all handles dropped)");
        });
        CoordinatorHandle { tx }
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Connect { session_id, reply } => {
                let ack = self.handle_connect(session_id);
                let _ = reply.send(ack);
            }
            Message::Disconnect { session_id } => self.handle_disconnect(session_id),
            Message::Interaction { session_id } => self.handle_interaction(session_id),
            Message::Control { session_id, control } => self.handle_control(session_id, control),
            Message::Command { command, reply } => {
                let _ = reply.send(self.handle_command(command));
            }
            Message::ViewerCounts { reply } => {
                let _ = reply.send(self.registry.counts());
            }
        }
    }

    fn handle_connect(&mut self, session_id: Uuid) -> ConnectAck {
        self.registry.on_connect(session_id);
        tracing::info!(session_id = %session_id, viewers = self.registry.counts().total_viewers, "viewer connected");

        // A late joiner cannot have interacted yet, so a running stream must
        // suspend until everyone (joiner included) has unlocked playback.
        if self.state.is_playing {
            self.state.force_pause();
            self.bus.control(ControlKind::Pause);
            self.bus.wait_for_interaction(GatePayload::new_viewer());
        }

        let ack = ConnectAck {
            snapshot: self.state.snapshot(),
            events: self.bus.subscribe(),
        };
        self.broadcast_counts();
        ack
    }

    fn handle_disconnect(&mut self, session_id: Uuid) {
        let was_playing = self.state.is_playing;
        self.registry.on_disconnect(session_id);
        self.registry.reconcile();
        tracing::info!(session_id = %session_id, viewers = self.registry.counts().total_viewers, "viewer disconnected");

        if was_playing {
            self.state.force_pause();
            self.bus.control(ControlKind::Pause);
            self.bus.wait_for_interaction(GatePayload::viewer_left());
        }
        self.broadcast_counts();

        // When the leaver was the one session blocking the gate, the
        // remaining viewers are all unlocked and a gated pause can end now.
        // A disconnect that itself forced the pause stays paused; resuming
        // immediately would defeat the leave-side gate.
        if !was_playing {
            self.try_reopen_gate();
        }
    }

    fn handle_interaction(&mut self, session_id: Uuid) {
        self.registry.on_interaction(session_id);
        self.registry.reconcile();
        tracing::debug!(session_id = %session_id, "viewer interaction received");
        self.broadcast_counts();
        self.try_reopen_gate();
    }

    fn handle_control(&mut self, session_id: Uuid, control: ClientControl) {
        match control {
            ClientControl::Play { current_time } => {
                self.state.apply_control(ControlAction::Play, current_time);
            }
            ClientControl::Pause { current_time } => {
                self.state.apply_control(ControlAction::Pause, current_time);
            }
            ClientControl::Seek { time } => self.state.apply_seek(time),
        }
        tracing::debug!(session_id = %session_id, state = ?self.state, "viewer control applied");
        self.bus.state_update(self.state.snapshot());
    }

    fn handle_command(&mut self, command: Command) -> String {
        // start and clear manage the active stream themselves; everything
        // else requires one
        if self.active_stream.is_none()
            && !matches!(command, Command::StartStream { .. } | Command::Clear)
        {
            return "No active stream. Use the stream command to start one.".to_string();
        }

        match command {
            Command::StartStream { index } => self.start_stream(index),
            Command::Play => {
                self.registry.reconcile();
                if self.registry.all_interacted() {
                    self.state.force_resume();
                    self.bus.control(ControlKind::Play);
                    "Video playback started for all viewers.".to_string()
                } else {
                    self.bus.wait_for_interaction(GatePayload::default());
                    "Waiting for all viewers to unlock playback. Ask everyone to press the join button."
                        .to_string()
                }
            }
            Command::Pause => {
                let position = self.state.current_time;
                self.state.apply_control(ControlAction::Pause, position);
                self.bus.control(ControlKind::Pause);
                "Video playback paused for all viewers.".to_string()
            }
            Command::Resume => {
                // Deliberate operator resume bypasses the interaction gate;
                // only the automatic join/leave pause re-checks it.
                let position = self.state.current_time;
                self.state.apply_control(ControlAction::Play, position);
                self.bus.control(ControlKind::Play);
                "Video playback resumed for all viewers.".to_string()
            }
            Command::Clear => {
                if self.active_stream.take().is_none() {
                    return "No active stream to clear.".to_string();
                }
                self.state.clear();
                self.bus.control(ControlKind::Clear);
                "Stream ended and cleared.".to_string()
            }
            Command::ForcePlay => {
                self.bus.control(ControlKind::ForcePlay);
                "Forcing video playback for all viewers. Some browsers may still block autoplay."
                    .to_string()
            }
        }
    }

    fn start_stream(&mut self, index: usize) -> String {
        match self.library.resolve(index) {
            Ok(file) => {
                let url = self.library.player_url(&file);
                tracing::info!(file = %file, "active stream selected");
                self.active_stream = Some(file.clone());
                format!("Preparing to stream: {file}. Watch here: {url}")
            }
            Err(CoreError::LibraryUnavailable) => {
                "Video directory not configured. Set media.video_dir in the config.".to_string()
            }
            Err(CoreError::BadIndex(_)) => {
                "Invalid file number. Use the library listing to see available files.".to_string()
            }
            Err(err) => {
                tracing::error!("library scan failed: {err}");
                format!("Could not read the video directory: {err}")
            }
        }
    }

    fn broadcast_counts(&self) {
        self.bus.viewer_count(self.registry.counts());
    }

    /// Reopen the gate exactly once: only when every connected viewer has
    /// interacted while playback sits in a gated pause.
    fn try_reopen_gate(&mut self) {
        if self.registry.all_interacted() && self.state.is_paused {
            self.state.force_resume();
            self.bus.control(ControlKind::Play);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ControlPayload;

    fn test_coordinator() -> (Coordinator, broadcast::Receiver<ServerEvent>) {
        let library = Arc::new(VideoLibrary::new(None, "http://127.0.0.1:4000"));
        let bus = EventBus::default();
        let rx = bus.subscribe();
        (Coordinator::new(library, bus), rx)
    }

    fn coordinator_with_library(
        files: &[&str],
    ) -> (tempfile::TempDir, Coordinator, broadcast::Receiver<ServerEvent>) {
        let dir = tempfile::tempdir().unwrap();
        for file in files {
            std::fs::write(dir.path().join(file), b"").unwrap();
        }
        let library = Arc::new(VideoLibrary::new(
            Some(dir.path().to_path_buf()),
            "http://127.0.0.1:4000",
        ));
        let bus = EventBus::default();
        let rx = bus.subscribe();
        (dir, Coordinator::new(library, bus), rx)
    }

    fn drain(rx: &mut broadcast::Receiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn control_broadcasts(events: &[ServerEvent]) -> Vec<ControlPayload> {
        events
            .iter()
            .filter_map(|event| match event {
                ServerEvent::Control(payload) => Some(*payload),
                _ => None,
            })
            .collect()
    }

    fn activate_stream(coordinator: &mut Coordinator) {
        let outcome = coordinator.handle_command(Command::StartStream { index: 1 });
        assert!(outcome.starts_with("Preparing to stream"), "{outcome}");
    }

    #[test]
    fn join_while_playing_forces_gated_pause() {
        let (mut coordinator, mut rx) = test_coordinator();
        let first = Uuid::new_v4();
        coordinator.handle_connect(first);
        coordinator.handle_interaction(first);
        coordinator.state.apply_control(ControlAction::Play, 10.0);
        drain(&mut rx);

        coordinator.handle_connect(Uuid::new_v4());
        assert!(!coordinator.state.is_playing);
        assert!(coordinator.state.is_paused);
        let events = drain(&mut rx);
        assert!(events.contains(&ServerEvent::WaitForInteraction(GatePayload::new_viewer())));
        assert_eq!(
            control_broadcasts(&events),
            vec![ControlPayload {
                action: ControlKind::Pause,
                bypass: None
            }]
        );
    }

    #[test]
    fn leave_while_playing_forces_gated_pause() {
        let (mut coordinator, mut rx) = test_coordinator();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.handle_connect(a);
        coordinator.handle_connect(b);
        coordinator.handle_interaction(a);
        coordinator.handle_interaction(b);
        coordinator.state.apply_control(ControlAction::Play, 30.0);
        drain(&mut rx);

        coordinator.handle_disconnect(b);
        assert!(!coordinator.state.is_playing);
        assert!(coordinator.state.is_paused);
        let events = drain(&mut rx);
        assert!(events.contains(&ServerEvent::WaitForInteraction(GatePayload::viewer_left())));
    }

    #[test]
    fn gate_reopens_exactly_once_after_last_interaction() {
        let (mut coordinator, mut rx) = test_coordinator();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.handle_connect(a);
        coordinator.handle_connect(b);
        coordinator.state.force_pause();
        drain(&mut rx);

        coordinator.handle_interaction(a);
        assert!(!coordinator.state.is_playing);
        coordinator.handle_interaction(b);
        assert!(coordinator.state.is_playing);
        assert!(!coordinator.state.is_paused);

        // repeat interaction after the resume must not re-broadcast play
        coordinator.handle_interaction(b);
        let plays = control_broadcasts(&drain(&mut rx))
            .iter()
            .filter(|payload| payload.action == ControlKind::Play)
            .count();
        assert_eq!(plays, 1);
    }

    #[test]
    fn interaction_is_observably_idempotent() {
        let (mut coordinator, mut rx) = test_coordinator();
        let a = Uuid::new_v4();
        coordinator.handle_connect(a);
        drain(&mut rx);

        coordinator.handle_interaction(a);
        let first = drain(&mut rx);
        coordinator.handle_interaction(a);
        let second = drain(&mut rx);
        assert_eq!(first, second);
    }

    #[test]
    fn departing_gate_blocker_lets_the_rest_resume() {
        let (mut coordinator, mut rx) = test_coordinator();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.handle_connect(a);
        coordinator.handle_interaction(a);
        coordinator.state.apply_control(ControlAction::Play, 5.0);
        coordinator.handle_connect(b);
        assert!(coordinator.state.is_paused);
        drain(&mut rx);

        // the never-interacting joiner leaves; the remaining viewer is fully
        // unlocked, so the gated pause ends without a new play command
        coordinator.handle_disconnect(b);
        assert!(coordinator.state.is_playing);
        assert!(!coordinator.state.is_paused);
    }

    #[test]
    fn play_with_no_viewers_reports_waiting_without_control_broadcast() {
        let (_dir, mut coordinator, mut rx) = coordinator_with_library(&["movie.mp4"]);
        activate_stream(&mut coordinator);
        drain(&mut rx);

        let outcome = coordinator.handle_command(Command::Play);
        assert!(outcome.starts_with("Waiting"), "{outcome}");
        assert!(!coordinator.state.is_playing);
        let events = drain(&mut rx);
        assert!(control_broadcasts(&events).is_empty());
        assert!(events.contains(&ServerEvent::WaitForInteraction(GatePayload::default())));
    }

    #[test]
    fn commands_without_active_stream_are_rejected() {
        let (mut coordinator, mut rx) = test_coordinator();
        for command in [Command::Play, Command::Pause, Command::Resume, Command::ForcePlay] {
            let outcome = coordinator.handle_command(command);
            assert_eq!(outcome, "No active stream. Use the stream command to start one.");
        }
        assert_eq!(
            coordinator.handle_command(Command::Clear),
            "No active stream to clear."
        );
        assert!(control_broadcasts(&drain(&mut rx)).is_empty());
    }

    #[test]
    fn manual_pause_and_resume_bypass_the_gate() {
        let (_dir, mut coordinator, mut rx) = coordinator_with_library(&["movie.mp4"]);
        activate_stream(&mut coordinator);
        coordinator.handle_connect(Uuid::new_v4());
        drain(&mut rx);

        // no viewer has interacted, yet explicit commands go through
        let outcome = coordinator.handle_command(Command::Resume);
        assert!(outcome.contains("resumed"), "{outcome}");
        assert!(coordinator.state.is_playing);
        assert!(!coordinator.state.is_paused);

        let outcome = coordinator.handle_command(Command::Pause);
        assert!(outcome.contains("paused"), "{outcome}");
        assert!(!coordinator.state.is_playing);
        assert!(!coordinator.state.is_paused);

        let actions: Vec<ControlKind> = control_broadcasts(&drain(&mut rx))
            .iter()
            .map(|payload| payload.action)
            .collect();
        assert_eq!(actions, vec![ControlKind::Play, ControlKind::Pause]);
    }

    #[test]
    fn staged_interactions_leave_operator_play_pending() {
        let (_dir, mut coordinator, mut rx) = coordinator_with_library(&["movie.mp4"]);
        let (s1, s2) = (Uuid::new_v4(), Uuid::new_v4());
        coordinator.handle_connect(s1);
        coordinator.handle_connect(s2);
        activate_stream(&mut coordinator);

        let outcome = coordinator.handle_command(Command::Play);
        assert!(outcome.starts_with("Waiting"), "{outcome}");

        coordinator.handle_interaction(s1);
        assert!(!coordinator.registry.all_interacted());
        coordinator.handle_interaction(s2);
        assert!(coordinator.registry.all_interacted());
        // no gated pause was pending, so nothing started automatically;
        // the command has to be reissued once the gate is open
        assert!(!coordinator.state.is_playing);

        drain(&mut rx);
        let outcome = coordinator.handle_command(Command::Play);
        assert!(outcome.contains("started"), "{outcome}");
        assert!(coordinator.state.is_playing);
        assert_eq!(
            control_broadcasts(&drain(&mut rx)),
            vec![ControlPayload {
                action: ControlKind::Play,
                bypass: None
            }]
        );
    }

    #[test]
    fn viewer_control_rebroadcasts_full_snapshot() {
        let (mut coordinator, mut rx) = test_coordinator();
        let a = Uuid::new_v4();
        coordinator.handle_connect(a);
        drain(&mut rx);

        coordinator.handle_control(a, ClientControl::Play { current_time: 17.5 });
        coordinator.handle_control(a, ClientControl::Seek { time: 60.0 });
        let snapshots: Vec<PlaybackState> = drain(&mut rx)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::VideoStateUpdate(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(snapshots.len(), 2);
        assert!(snapshots[0].is_playing);
        assert_eq!(snapshots[0].current_time, 17.5);
        assert_eq!(snapshots[1].current_time, 60.0);
    }

    #[test]
    fn clear_resets_playback_state() {
        let (_dir, mut coordinator, mut rx) = coordinator_with_library(&["movie.mp4"]);
        activate_stream(&mut coordinator);
        coordinator.state.apply_control(ControlAction::Play, 120.0);
        drain(&mut rx);

        let outcome = coordinator.handle_command(Command::Clear);
        assert_eq!(outcome, "Stream ended and cleared.");
        assert!(!coordinator.state.is_playing);
        assert_eq!(coordinator.state.current_time, 0.0);
        assert!(coordinator.active_stream.is_none());
        assert_eq!(
            control_broadcasts(&drain(&mut rx)),
            vec![ControlPayload {
                action: ControlKind::Clear,
                bypass: None
            }]
        );
    }

    #[test]
    fn force_play_broadcasts_bypass_without_store_mutation() {
        let (_dir, mut coordinator, mut rx) = coordinator_with_library(&["movie.mp4"]);
        activate_stream(&mut coordinator);
        let before = coordinator.state.snapshot();
        drain(&mut rx);

        let outcome = coordinator.handle_command(Command::ForcePlay);
        assert!(outcome.starts_with("Forcing"), "{outcome}");
        assert_eq!(coordinator.state, before);
        assert_eq!(
            control_broadcasts(&drain(&mut rx)),
            vec![ControlPayload {
                action: ControlKind::ForcePlay,
                bypass: Some(true)
            }]
        );
    }

    #[tokio::test]
    async fn spawned_actor_round_trips_through_the_handle() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("movie.mp4"), b"").unwrap();
        let library = Arc::new(VideoLibrary::new(
            Some(dir.path().to_path_buf()),
            "http://127.0.0.1:4000",
        ));
        let handle = Coordinator::spawn(library, EventBus::default());

        let session = Uuid::new_v4();
        let ack = handle.connect(session).await.unwrap();
        assert!(!ack.snapshot.is_playing);
        let mut events = ack.events;

        let outcome = handle.command(Command::StartStream { index: 1 }).await.unwrap();
        assert!(outcome.contains("movie.mp4"), "{outcome}");

        handle.interaction(session).await;
        // commands are serialized behind the interaction, so by the time the
        // reply arrives the registry has processed it
        let outcome = handle.command(Command::Play).await.unwrap();
        assert!(outcome.contains("started"), "{outcome}");

        let counts = handle.viewer_counts().await.unwrap();
        assert_eq!(counts.total_viewers, 1);
        assert!(counts.all_users_interacted);

        let mut saw_play = false;
        while let Ok(event) = events.try_recv() {
            if matches!(
                event,
                ServerEvent::Control(ControlPayload {
                    action: ControlKind::Play,
                    ..
                })
            ) {
                saw_play = true;
            }
        }
        assert!(saw_play);
    }
}
