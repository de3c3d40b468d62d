//! Fleet-wide status polling

use std::sync::Arc;

use sourcemgr_core::models::UNKNOWN_MAP;
use sourcemgr_core::{
    Connector, Endpoint, InfoSession, ManagedEndpoint, RetryConfig, SessionPool, StatusPoller,
    StatusTier,
};

use super::support::{ListProbe, StaticInfoConnector};

fn poller(probe: ListProbe) -> StatusPoller {
    let pool = SessionPool::new(
        "query",
        Arc::new(StaticInfoConnector) as Arc<dyn Connector<dyn InfoSession>>,
        RetryConfig::no_retry(),
    );
    StatusPoller::new(Arc::new(probe), Arc::new(pool))
}

fn fleet(hosts: &[&str]) -> Vec<Arc<ManagedEndpoint>> {
    hosts
        .iter()
        .map(|host| Arc::new(ManagedEndpoint::new(Endpoint::new(*host, *host, 27015))))
        .collect()
}

#[tokio::test]
async fn one_unreachable_endpoint_does_not_affect_the_rest() {
    let poller = poller(ListProbe::down(&["10.0.0.3"]));
    let endpoints = fleet(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]);

    let summary = poller.poll_all(&endpoints).await;
    let tiers: Vec<StatusTier> = summary.results.iter().map(|r| r.tier()).collect();
    assert_eq!(
        tiers,
        [StatusTier::Online, StatusTier::Online, StatusTier::Offline]
    );
    assert_eq!(summary.total, 3);
    assert_eq!(summary.offline, 1);

    assert!(endpoints[0].status().online);
    assert!(endpoints[1].status().online);
    let offline = endpoints[2].status();
    assert!(!offline.reachable);
    assert!(!offline.online);
    assert_eq!(offline.players, 0);
    assert!(offline.map.is_empty());
}

#[tokio::test]
async fn order_follows_declaration_not_completion() {
    // The unreachable endpoint returns first; results still follow input order
    let poller = poller(ListProbe::down(&["first-down"])).with_concurrency(3);
    let endpoints = fleet(&["first-down", "10.0.0.8", "mute-9"]);

    let summary = poller.poll_all(&endpoints).await;
    let ids: Vec<_> = summary.results.iter().map(|r| r.id).collect();
    let expected: Vec<_> = endpoints.iter().map(|e| e.id()).collect();
    assert_eq!(ids, expected);
    assert_eq!(summary.results[0].tier(), StatusTier::Offline);
    assert_eq!(summary.results[1].tier(), StatusTier::Online);
    assert_eq!(summary.results[2].tier(), StatusTier::Degraded);
}

#[tokio::test]
async fn silent_query_degrades_to_unknown_map() {
    let poller = poller(ListProbe::default());
    let endpoints = fleet(&["mute-1"]);

    let result = poller.poll(&endpoints[0]).await;
    assert_eq!(result.tier(), StatusTier::Degraded);
    let status = endpoints[0].status();
    assert!(status.reachable);
    assert!(status.online);
    assert_eq!(status.map, UNKNOWN_MAP);
    assert!(poller.query_pool().is_empty().await);
}

#[tokio::test]
async fn subscribers_see_the_published_status() {
    let poller = poller(ListProbe::default());
    let endpoints = fleet(&["10.0.0.4"]);
    let mut rx = endpoints[0].subscribe();

    poller.poll_all(&endpoints).await;
    rx.changed().await.unwrap();
    let status = rx.borrow().clone();
    assert_eq!(status.player_map_info(), "10/16 - de_nuke");
}

#[tokio::test]
async fn reachability_loss_resets_live_fields() {
    let endpoints = fleet(&["10.0.0.5"]);
    poller(ListProbe::default()).poll(&endpoints[0]).await;
    assert_eq!(endpoints[0].status().players, 10);

    poller(ListProbe::down(&["10.0.0.5"])).poll(&endpoints[0]).await;
    let status = endpoints[0].status();
    assert_eq!(status.players, 0);
    assert!(!status.online);
}
