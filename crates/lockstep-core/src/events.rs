use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::playback::PlaybackState;
use crate::registry::ViewerCounts;

/// Events fanned out to every connected viewer session.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Full playback snapshot bringing a client up to date.
    VideoStateUpdate(PlaybackState),
    Control(ControlPayload),
    WaitForInteraction(GatePayload),
    ViewerCount(ViewerCounts),
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct ControlPayload {
    pub action: ControlKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Play,
    Pause,
    Clear,
    ForcePlay,
}

/// Why the "waiting for interaction" prompt went out. Serialized as
/// `{newViewer: true}`, `{viewerLeft: true}` or `{}`.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_viewer: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_left: Option<bool>,
}

impl GatePayload {
    pub fn new_viewer() -> Self {
        Self {
            new_viewer: Some(true),
            ..Self::default()
        }
    }

    pub fn viewer_left() -> Self {
        Self {
            viewer_left: Some(true),
            ..Self::default()
        }
    }
}

/// Events a viewer session sends over the sync channel. `connect` and
/// `disconnect` are transport-level and never appear as frames.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    UserInteraction,
    Control(ClientControl),
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ClientControl {
    Play {
        #[serde(rename = "currentTime", default)]
        current_time: f64,
    },
    Pause {
        #[serde(rename = "currentTime", default)]
        current_time: f64,
    },
    Seek {
        #[serde(default)]
        time: f64,
    },
}

/// Broadcast-based fan-out to all live viewer sessions. A send with no
/// receivers (or to a receiver that has since dropped) is silently ignored;
/// the registry's reconcile pass cleans up after dead sessions.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ServerEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: ServerEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.sender.subscribe()
    }

    pub fn control(&self, action: ControlKind) {
        let bypass = (action == ControlKind::ForcePlay).then_some(true);
        self.publish(ServerEvent::Control(ControlPayload { action, bypass }));
    }

    pub fn wait_for_interaction(&self, gate: GatePayload) {
        self.publish(ServerEvent::WaitForInteraction(gate));
    }

    pub fn state_update(&self, snapshot: PlaybackState) {
        self.publish(ServerEvent::VideoStateUpdate(snapshot));
    }

    pub fn viewer_count(&self, counts: ViewerCounts) {
        self.publish(ServerEvent::ViewerCount(counts));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
