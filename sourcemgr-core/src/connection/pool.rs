//! Keyed pool of live protocol sessions
//!
//! Each key owns a slot guarded by its own async mutex, so acquisitions for
//! the same key are serialized (at most one live session per key) while
//! different keys proceed independently. The outer map lock is held only
//! long enough to find or create a slot.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::join_all;
use tokio::sync::Mutex;
use tracing::Instrument;

use super::retry::{RetryConfig, retry_with_backoff};
use super::session::{ConnectParams, ConnectionKey, Connector, PooledSession};
use crate::error::{ProtocolError, ProtocolResult};
use crate::tracing::span_names;

type Slot<S> = Arc<Mutex<Option<Arc<S>>>>;

/// True for a slot referenced only by the map and holding no session.
/// Must be checked under the map lock.
fn is_idle<S: ?Sized>(slot: &Slot<S>) -> bool {
    Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|cached| cached.is_none())
}

/// Counters describing pool activity
#[derive(Debug, Default)]
pub struct PoolStats {
    /// New sessions opened
    pub connects: AtomicU64,
    /// Acquisitions served from a cached live session
    pub reuses: AtomicU64,
    /// Dead sessions disconnected before reconnecting
    pub replacements: AtomicU64,
    /// Sessions dropped by eviction
    pub evictions: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStatsSnapshot {
    /// New sessions opened
    pub connects: u64,
    /// Acquisitions served from a cached live session
    pub reuses: u64,
    /// Dead sessions disconnected before reconnecting
    pub replacements: u64,
    /// Sessions dropped by eviction
    pub evictions: u64,
}

impl PoolStats {
    /// Takes a snapshot of the counters
    #[must_use]
    pub fn snapshot(&self) -> PoolStatsSnapshot {
        PoolStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            reuses: self.reuses.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Pool of sessions of one protocol, keyed by [`ConnectionKey`]
pub struct SessionPool<S: ?Sized + PooledSession + 'static> {
    name: &'static str,
    connector: Arc<dyn Connector<S>>,
    retry: RetryConfig,
    slots: Mutex<HashMap<ConnectionKey, Slot<S>>>,
    stats: PoolStats,
}

impl<S: ?Sized + PooledSession + 'static> std::fmt::Debug for SessionPool<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionPool")
            .field("name", &self.name)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl<S: ?Sized + PooledSession + 'static> SessionPool<S> {
    /// Creates an empty pool
    #[must_use]
    pub fn new(name: &'static str, connector: Arc<dyn Connector<S>>, retry: RetryConfig) -> Self {
        Self {
            name,
            connector,
            retry,
            slots: Mutex::new(HashMap::new()),
            stats: PoolStats::default(),
        }
    }

    /// Pool name used in logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Activity counters
    #[must_use]
    pub const fn stats(&self) -> &PoolStats {
        &self.stats
    }

    async fn slot(&self, key: &ConnectionKey) -> Slot<S> {
        let mut slots = self.slots.lock().await;
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns a live session for `key`, connecting a new one if needed.
    ///
    /// A cached session is reused if it passes its liveness check; a dead
    /// one is disconnected and replaced.
    ///
    /// # Errors
    ///
    /// Returns the last connect error once retries are exhausted.
    /// Authentication failures are not retried.
    pub async fn acquire(
        &self,
        key: &ConnectionKey,
        params: &ConnectParams,
    ) -> ProtocolResult<Arc<S>> {
        let span = tracing::debug_span!(span_names::POOL_ACQUIRE, pool = self.name, key = %key);
        async {
            let slot = self.slot(key).await;
            let mut cached = slot.lock().await;

            if let Some(session) = cached.as_ref() {
                if session.is_alive().await {
                    self.stats.reuses.fetch_add(1, Ordering::Relaxed);
                    tracing::trace!(session_id = session.session_id(), "Reusing session");
                    return Ok(Arc::clone(session));
                }
                tracing::debug!(session_id = session.session_id(), "Replacing dead session");
                session.disconnect().await;
                self.stats.replacements.fetch_add(1, Ordering::Relaxed);
                *cached = None;
            }

            let connected = retry_with_backoff(
                &self.retry,
                |_| self.connector.connect(params),
                |e| !matches!(e, ProtocolError::Auth(_)),
            )
            .await;

            match connected {
                Ok(session) => {
                    self.stats.connects.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(session_id = session.session_id(), "Opened session");
                    *cached = Some(Arc::clone(&session));
                    Ok(session)
                }
                Err(e) => {
                    drop(cached);
                    drop(slot);
                    self.prune(key).await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Returns the cached session for `key` without checking or connecting
    pub async fn cached(&self, key: &ConnectionKey) -> Option<Arc<S>> {
        let slot = self.slots.lock().await.get(key).cloned()?;
        let cached = slot.lock().await;
        cached.clone()
    }

    /// Disconnects and drops the session for `key`, if any.
    ///
    /// Returns true if a session was dropped. Safe to call repeatedly.
    pub async fn evict(&self, key: &ConnectionKey) -> bool {
        let Some(slot) = self.slots.lock().await.get(key).cloned() else {
            return false;
        };
        let dropped = self.drain_slot(&slot).await;
        drop(slot);
        self.prune(key).await;
        dropped
    }

    /// Disconnects and drops every session, waiting for all disconnects
    pub async fn evict_all(&self) -> usize {
        let span = tracing::debug_span!(span_names::POOL_EVICT, pool = self.name);
        async {
            let slots: Vec<Slot<S>> = self.slots.lock().await.values().cloned().collect();
            let dropped = join_all(slots.iter().map(|slot| self.drain_slot(slot)))
                .await
                .into_iter()
                .filter(|dropped| *dropped)
                .count();
            drop(slots);
            self.slots.lock().await.retain(|_, slot| !is_idle(slot));
            if dropped > 0 {
                tracing::debug!(dropped, "Evicted sessions");
            }
            dropped
        }
        .instrument(span)
        .await
    }

    /// Forgets `key` once its slot is empty and nobody else holds it
    async fn prune(&self, key: &ConnectionKey) {
        let mut slots = self.slots.lock().await;
        if slots.get(key).is_some_and(is_idle) {
            slots.remove(key);
        }
    }

    async fn drain_slot(&self, slot: &Slot<S>) -> bool {
        let session = slot.lock().await.take();
        match session {
            Some(session) => {
                session.disconnect().await;
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                true
            }
            None => false,
        }
    }

    /// Number of sessions currently cached
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot<S>> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if slot.lock().await.is_some() {
                count += 1;
            }
        }
        count
    }

    /// Returns true if no session is cached
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
