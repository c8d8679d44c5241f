//! # Web API Application State
//!
//! Shared state for the HTTP layer. Handlers reach the scheduling core
//! exclusively through the [`Scheduler`] held here; the server never touches
//! the task store directly.

use std::sync::Arc;

use crate::config::ServerConfig;
use crate::scheduler::Scheduler;

/// Shared application state for the web API
#[derive(Debug, Clone)]
pub struct AppState {
    /// Scheduling core (store access plus event notifier)
    pub scheduler: Scheduler,

    /// Web server configuration, including the long-poll ceiling
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(scheduler: Scheduler, config: ServerConfig) -> Self {
        Self {
            scheduler,
            config: Arc::new(config),
        }
    }
}
