//! Runtime wrapper around a loaded endpoint

use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use super::{Endpoint, EndpointStatus};

/// An endpoint as held by the fleet: stable runtime id, editable
/// configuration and the live status channel.
///
/// The id is assigned on load and is not persisted.
#[derive(Debug)]
pub struct ManagedEndpoint {
    id: Uuid,
    config: RwLock<Endpoint>,
    status: watch::Sender<EndpointStatus>,
}

impl ManagedEndpoint {
    /// Wraps an endpoint with a fresh id and offline status
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_id(Uuid::new_v4(), endpoint)
    }

    /// Wraps an endpoint with the given id
    #[must_use]
    pub fn with_id(id: Uuid, endpoint: Endpoint) -> Self {
        let (status, _) = watch::channel(EndpointStatus::default());
        Self {
            id,
            config: RwLock::new(endpoint),
            status,
        }
    }

    /// Runtime identifier
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns a copy of the current configuration
    pub async fn snapshot(&self) -> Endpoint {
        self.config.read().await.clone()
    }

    /// Configuration lock
    #[must_use]
    pub const fn config(&self) -> &RwLock<Endpoint> {
        &self.config
    }

    /// Current status
    #[must_use]
    pub fn status(&self) -> EndpointStatus {
        self.status.borrow().clone()
    }

    /// Subscribes to status changes
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EndpointStatus> {
        self.status.subscribe()
    }

    /// Replaces the whole status at once
    pub fn publish(&self, status: EndpointStatus) {
        self.status.send_replace(status);
    }
}
