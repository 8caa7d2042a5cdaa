//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use crate::encryption::MessageEncryption;
use crate::rocketchat::ChatBackend;
use crate::services::MessageFacade;

/// Collaborators shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub facade: Arc<dyn MessageFacade>,
    pub encryption: Arc<dyn MessageEncryption>,
    /// Used by readiness to ping the chat server.
    pub chat: Arc<dyn ChatBackend>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        facade: Arc<dyn MessageFacade>,
        encryption: Arc<dyn MessageEncryption>,
        chat: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            facade,
            encryption,
            chat,
            start_time: Instant::now(),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

crate::impl_from_ref!(Arc<dyn MessageFacade>, facade);
crate::impl_from_ref!(Arc<dyn MessageEncryption>, encryption);
crate::impl_from_ref!(Arc<dyn ChatBackend>, chat);
crate::impl_from_ref!(Instant, start_time);
