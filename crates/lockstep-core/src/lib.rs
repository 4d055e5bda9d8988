pub mod coordinator;
pub mod error;
pub mod events;
pub mod library;
pub mod playback;
pub mod registry;

use std::sync::Arc;

use crate::coordinator::CoordinatorHandle;
use crate::library::VideoLibrary;

/// Shared application state handed to every transport layer.
///
/// All playback/registry state lives behind the coordinator handle; nothing
/// here is mutated directly by routes or socket handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub library: Arc<VideoLibrary>,
    pub config: AppConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Public base URL of this server (e.g. http://192.168.1.20:4000).
    /// Used to build the viewer-facing player links.
    pub public_url: String,
    pub server_name: String,
}
