use std::collections::HashSet;

use serde::Serialize;
use uuid::Uuid;

/// Snapshot of the registry broadcast to every session after a membership
/// change.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ViewerCounts {
    pub total_viewers: usize,
    pub interacted_viewers: usize,
    pub all_users_interacted: bool,
}

/// Tracks connected viewer sessions and which of them have furnished the
/// unlock gesture browsers require before programmatic playback.
///
/// Invariant: the interacted set is always a subset of the connected set; a
/// disconnect removes a session from both.
#[derive(Debug, Default)]
pub struct ViewerRegistry {
    connected: HashSet<Uuid>,
    interacted: HashSet<Uuid>,
}

impl ViewerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_connect(&mut self, session_id: Uuid) {
        self.connected.insert(session_id);
    }

    pub fn on_disconnect(&mut self, session_id: Uuid) {
        self.connected.remove(&session_id);
        self.interacted.remove(&session_id);
    }

    /// Idempotent: a repeat interaction from the same session is a no-op.
    pub fn on_interaction(&mut self, session_id: Uuid) {
        if self.connected.contains(&session_id) {
            self.interacted.insert(session_id);
        }
    }

    /// Drop interacted ids whose session is no longer live. Broadcast
    /// delivery failures are silent, so this pass is the sole corrective
    /// mechanism for stale entries.
    pub fn reconcile(&mut self) {
        let connected = &self.connected;
        self.interacted.retain(|id| connected.contains(id));
    }

    /// Derived, never stored: true iff at least one viewer is connected and
    /// every connected viewer has interacted.
    pub fn all_interacted(&self) -> bool {
        !self.connected.is_empty() && self.interacted.len() == self.connected.len()
    }

    pub fn counts(&self) -> ViewerCounts {
        ViewerCounts {
            total_viewers: self.connected.len(),
            interacted_viewers: self.interacted.len(),
            all_users_interacted: self.all_interacted(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Uuid {
        Uuid::new_v4()
    }

    #[test]
    fn empty_registry_gate_is_closed() {
        let registry = ViewerRegistry::new();
        assert!(!registry.all_interacted());
        assert_eq!(registry.counts().total_viewers, 0);
    }

    #[test]
    fn gate_opens_only_when_every_connected_session_interacted() {
        let mut registry = ViewerRegistry::new();
        let (a, b) = (session(), session());
        registry.on_connect(a);
        registry.on_connect(b);
        assert!(!registry.all_interacted());
        registry.on_interaction(a);
        assert!(!registry.all_interacted());
        registry.on_interaction(b);
        assert!(registry.all_interacted());
    }

    #[test]
    fn interaction_is_idempotent() {
        let mut registry = ViewerRegistry::new();
        let a = session();
        registry.on_connect(a);
        registry.on_interaction(a);
        let counts = registry.counts();
        registry.on_interaction(a);
        assert_eq!(registry.counts(), counts);
    }

    #[test]
    fn disconnect_removes_from_both_sets() {
        let mut registry = ViewerRegistry::new();
        let (a, b) = (session(), session());
        registry.on_connect(a);
        registry.on_connect(b);
        registry.on_interaction(a);
        registry.on_interaction(b);
        registry.on_disconnect(b);
        let counts = registry.counts();
        assert_eq!(counts.total_viewers, 1);
        assert_eq!(counts.interacted_viewers, 1);
        assert!(counts.all_users_interacted);
    }

    #[test]
    fn interaction_from_unknown_session_is_ignored() {
        let mut registry = ViewerRegistry::new();
        registry.on_connect(session());
        registry.on_interaction(session());
        assert_eq!(registry.counts().interacted_viewers, 0);
    }

    #[test]
    fn reconcile_drops_stale_ids() {
        let mut registry = ViewerRegistry::new();
        let a = session();
        registry.on_connect(a);
        registry.on_interaction(a);
        // simulate a stale entry surviving an out-of-band removal
        registry.connected.remove(&a);
        registry.reconcile();
        assert_eq!(registry.counts().interacted_viewers, 0);
        assert!(!registry.all_interacted());
    }
}
