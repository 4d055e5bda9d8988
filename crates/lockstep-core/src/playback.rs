use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Deliberate control action applied to the shared timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Play,
    Pause,
}

/// The single shared record of the logical video timeline.
///
/// `is_paused` is not the inverse of `is_playing`: it marks a pause forced by
/// the interaction gate (a viewer joined or left mid-play), as opposed to a
/// deliberate pause. Transient overlap during a transition is tolerated, but
/// no terminal state asserts both.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_paused: bool,
    /// Seconds into the media.
    pub current_time: f64,
    /// Wall clock of the last mutation, in epoch milliseconds on the wire.
    /// Clients extrapolate elapsed time from it; it plays no part in
    /// conflict resolution.
    #[serde(rename = "lastUpdateTime", serialize_with = "serialize_epoch_millis")]
    pub last_update: DateTime<Utc>,
}

fn serialize_epoch_millis<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(ts.timestamp_millis())
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_paused: false,
            current_time: 0.0,
            last_update: Utc::now(),
        }
    }
}

impl PlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a deliberate play/pause from a player, carrying the player's own
    /// position so everyone converges on it. Leaves the gate flag alone.
    pub fn apply_control(&mut self, action: ControlAction, client_time: f64) {
        self.is_playing = action == ControlAction::Play;
        self.current_time = client_time;
        self.last_update = Utc::now();
    }

    pub fn apply_seek(&mut self, time: f64) {
        self.current_time = time;
        self.last_update = Utc::now();
    }

    /// Suspend playback because the interaction gate closed (viewer joined or
    /// left mid-play).
    pub fn force_pause(&mut self) {
        self.is_playing = false;
        self.is_paused = true;
        self.last_update = Utc::now();
    }

    /// Reopen the gate: only called once every connected viewer has
    /// interacted while the state was gate-paused.
    pub fn force_resume(&mut self) {
        self.is_playing = true;
        self.is_paused = false;
        self.last_update = Utc::now();
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// By-value copy for broadcast.
    pub fn snapshot(&self) -> Self {
        self.clone()
    }
}
