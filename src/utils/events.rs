//! Hub notifications
//!
//! Observable side effects (rate-limit waits, registry failures, health
//! transitions, ...) are published here instead of being folded into return
//! values. Subscribers that fall behind lose the oldest events.

use crate::config::types::HealthStatus;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    SearchCompleted {
        registries: usize,
        servers: usize,
        failed_sources: usize,
    },
    RegistryFailed {
        registry_id: String,
        error: String,
    },
    RateLimited {
        registry_id: String,
        wait_ms: u64,
    },
    CacheHit {
        registry_id: String,
    },
    RegistriesSynced {
        registries: usize,
    },
    InstallStarted {
        server_id: String,
    },
    Installed {
        server_id: String,
        version: String,
    },
    InstallFailed {
        server_id: String,
        reason: String,
    },
    Uninstalled {
        instance_id: String,
    },
    HealthChanged {
        instance_id: String,
        status: HealthStatus,
    },
    BecameUnhealthy {
        instance_id: String,
        error: Option<String>,
    },
    ConfigSaveFailed {
        error: String,
    },
}

/// Cloneable publisher handle
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<HubEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: HubEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
