use chrono::{DateTime, Utc};
use uuid::Uuid;

pub struct Session {
    pub session_id: Uuid,
    pub connected_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            connected_at: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
