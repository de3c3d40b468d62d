//! Fleet status polling
//!
//! Each endpoint goes through three tiers: a reachability probe, an
//! A2S_INFO query through the query pool, and a degraded "reachable but
//! silent" result when the query fails. Endpoints are polled concurrently
//! and one endpoint's failure never affects another.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;

use super::ReachabilityProbe;
use crate::connection::{ConnectParams, ConnectionKey, SessionPool};
use crate::models::{Endpoint, EndpointStatus, ManagedEndpoint, StatusTier};
use crate::protocol::InfoSession;
use crate::tracing::span_names;

/// Default number of endpoints polled at once
pub const DEFAULT_CONCURRENCY: usize = 32;

/// Default A2S_INFO timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of polling one endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PollResult {
    /// Endpoint runtime id
    pub id: Uuid,
    /// Display name after the poll
    pub name: String,
    /// Published status
    pub status: EndpointStatus,
    /// Why the endpoint is offline or degraded
    pub error: Option<String>,
}

impl PollResult {
    /// Status tier of this result
    #[must_use]
    pub fn tier(&self) -> StatusTier {
        self.status.tier()
    }
}

/// Aggregate of a fleet-wide poll, results in endpoint order
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollSummary {
    /// Endpoints polled
    pub total: usize,
    /// Endpoints that answered the query
    pub online: usize,
    /// Endpoints that failed the probe
    pub offline: usize,
    /// Endpoints reachable but not answering the query
    pub degraded: usize,
    /// Per-endpoint results
    pub results: Vec<PollResult>,
}

impl PollSummary {
    /// Builds a summary from ordered results
    #[must_use]
    pub fn from_results(results: Vec<PollResult>) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in &results {
            match result.tier() {
                StatusTier::Online => summary.online += 1,
                StatusTier::Offline => summary.offline += 1,
                StatusTier::Degraded => summary.degraded += 1,
            }
        }
        summary.results = results;
        summary
    }

    /// Returns true if every endpoint answered the query
    #[must_use]
    pub const fn all_online(&self) -> bool {
        self.online == self.total
    }
}

struct TierOutcome {
    status: EndpointStatus,
    hostname: Option<String>,
    error: Option<String>,
}

impl TierOutcome {
    fn offline(error: impl Into<String>) -> Self {
        Self {
            status: EndpointStatus::offline(),
            hostname: None,
            error: Some(error.into()),
        }
    }

    fn degraded(error: impl Into<String>) -> Self {
        Self {
            status: EndpointStatus::degraded(),
            hostname: None,
            error: Some(error.into()),
        }
    }
}

/// Runs the tiered status routine for one endpoint or the whole fleet.
///
/// Cloning is cheap: clones share the probe and the query pool.
#[derive(Clone)]
pub struct StatusPoller {
    probe: Arc<dyn ReachabilityProbe>,
    query_pool: Arc<SessionPool<dyn InfoSession>>,
    query_timeout: Duration,
    concurrency: usize,
}

impl std::fmt::Debug for StatusPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPoller")
            .field("probe", &self.probe.name())
            .field("query_timeout", &self.query_timeout)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl StatusPoller {
    /// Creates a poller with default timeout and concurrency
    #[must_use]
    pub fn new(
        probe: Arc<dyn ReachabilityProbe>,
        query_pool: Arc<SessionPool<dyn InfoSession>>,
    ) -> Self {
        Self {
            probe,
            query_pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sets the query timeout
    #[must_use]
    pub const fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Sets the maximum number of concurrent polls (at least 1)
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Query pool shared with the fleet
    #[must_use]
    pub fn query_pool(&self) -> &Arc<SessionPool<dyn InfoSession>> {
        &self.query_pool
    }

    async fn run_tiers(&self, endpoint: &Endpoint) -> TierOutcome {
        let host = endpoint.ip_address.trim();
        if host.is_empty() {
            return TierOutcome::offline("no address configured");
        }

        if let Err(e) = self.probe.probe(host, endpoint.rcon_port).await {
            tracing::debug!(host, error = %e, "Probe failed");
            return TierOutcome::offline(e.to_string());
        }

        let port = endpoint.effective_query_port();
        let key = ConnectionKey::address(host, port);
        let params = ConnectParams::new(host, port, self.query_timeout);

        let query = async {
            let session = self.query_pool.acquire(&key, &params).await?;
            session.get_info().await
        };
        // The session applies its own timeout per datagram; this bounds
        // connect plus challenge rounds.
        let outcome = tokio::time::timeout(self.query_timeout * 2, query).await;

        match outcome {
            Ok(Ok(info)) => TierOutcome {
                status: EndpointStatus::live(info.players, info.max_players, info.map),
                hostname: Some(info.hostname).filter(|h| !h.trim().is_empty()),
                error: None,
            },
            Ok(Err(e)) => {
                self.query_pool.evict(&key).await;
                tracing::debug!(host, port, error = %e, "Query failed on reachable host");
                TierOutcome::degraded(e.to_string())
            }
            Err(_) => {
                self.query_pool.evict(&key).await;
                TierOutcome::degraded("status query timed out")
            }
        }
    }

    /// Polls one endpoint and publishes its new status.
    ///
    /// Never fails: errors and panics inside the routine are reported as a
    /// degraded status.
    pub async fn poll(&self, endpoint: &ManagedEndpoint) -> PollResult {
        let span = tracing::debug_span!(span_names::STATUS_POLL, endpoint_id = %endpoint.id());
        async {
            let snapshot = endpoint.snapshot().await;
            let outcome = match AssertUnwindSafe(self.run_tiers(&snapshot))
                .catch_unwind()
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(endpoint = snapshot.display_name(), "Status routine panicked");
                    TierOutcome::degraded("status routine panicked")
                }
            };

            let name = {
                let mut config = endpoint.config().write().await;
                if let Some(hostname) = &outcome.hostname {
                    if config.record_hostname(hostname) {
                        tracing::info!(hostname = %hostname, "Adopted server hostname as label");
                    }
                }
                config.display_name().to_string()
            };

            endpoint.publish(outcome.status.clone());
            PollResult {
                id: endpoint.id(),
                name,
                status: outcome.status,
                error: outcome.error,
            }
        }
        .instrument(span)
        .await
    }

    /// Polls every endpoint concurrently, up to the concurrency cap.
    ///
    /// Completes once every routine has completed; results keep the order
    /// of `endpoints`.
    pub async fn poll_all(&self, endpoints: &[Arc<ManagedEndpoint>]) -> PollSummary {
        let span = tracing::info_span!(span_names::STATUS_POLL_ALL, item_count = endpoints.len());
        async {
            // Routines own their handles; polls also run inside spawned tasks.
            let routines: Vec<_> = endpoints
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, endpoint)| {
                    let poller = self.clone();
                    async move { (index, poller.poll(&endpoint).await) }
                })
                .collect();
            let mut results: Vec<(usize, PollResult)> = stream::iter(routines)
                .buffer_unordered(self.concurrency)
                .collect()
                .await;
            results.sort_by_key(|(index, _)| *index);

            let summary =
                PollSummary::from_results(results.into_iter().map(|(_, r)| r).collect());
            tracing::info!(
                online = summary.online,
                degraded = summary.degraded,
                offline = summary.offline,
                "Fleet poll complete"
            );
            summary
        }
        .instrument(span)
        .await
    }
}
