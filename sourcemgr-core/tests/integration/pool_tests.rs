//! Session pool behaviour against in-memory connectors

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use secrecy::SecretString;
use sourcemgr_core::{CommandSession, ConnectParams, ConnectionKey, Connector, RetryConfig, SessionPool};

use super::support::EchoConnector;

fn pool() -> (Arc<SessionPool<dyn CommandSession>>, Arc<EchoConnector>) {
    let connector = Arc::new(EchoConnector::default());
    let pool = SessionPool::new(
        "rcon",
        Arc::clone(&connector) as Arc<dyn Connector<dyn CommandSession>>,
        RetryConfig::no_retry(),
    );
    (Arc::new(pool), connector)
}

fn params(host: &str) -> ConnectParams {
    ConnectParams::new(host, 27015, Duration::from_secs(5))
        .with_credentials("", SecretString::from("secret".to_string()))
}

#[tokio::test]
async fn sequential_acquires_share_one_session() {
    let (pool, connector) = pool();
    let key = ConnectionKey::address("10.0.0.5", 27015);

    let first = pool.acquire(&key, &params("10.0.0.5")).await.unwrap();
    let second = pool.acquire(&key, &params("10.0.0.5")).await.unwrap();

    assert_eq!(first.session_id(), second.session_id());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(connector.connects(), 1);
    assert_eq!(pool.stats().snapshot().reuses, 1);
}

#[tokio::test]
async fn dead_session_is_replaced() {
    let (pool, connector) = pool();
    let key = ConnectionKey::address("10.0.0.5", 27015);

    let first = pool.acquire(&key, &params("10.0.0.5")).await.unwrap();
    let dead = connector.last_session();
    dead.alive.store(false, Ordering::SeqCst);

    let second = pool.acquire(&key, &params("10.0.0.5")).await.unwrap();
    assert_ne!(first.session_id(), second.session_id());
    assert!(dead.disconnected.load(Ordering::SeqCst));
    assert_eq!(connector.connects(), 2);
    assert_eq!(pool.stats().snapshot().replacements, 1);
}

#[tokio::test]
async fn concurrent_acquires_for_one_key_connect_once() {
    let (pool, connector) = pool();
    let key = ConnectionKey::address("slow-1", 27015);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = Arc::clone(&pool);
        let key = key.clone();
        tasks.push(tokio::spawn(async move {
            pool.acquire(&key, &params("slow-1")).await.unwrap().session_id()
        }));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    connector.gate.add_permits(8);

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(connector.connects(), 1);
}

#[tokio::test]
async fn different_keys_do_not_block_each_other() {
    let (pool, connector) = pool();
    let slow_key = ConnectionKey::address("slow-2", 27015);

    let slow = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.acquire(&slow_key, &params("slow-2")).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fast_key = ConnectionKey::address("10.0.0.6", 27015);
    let fast = tokio::time::timeout(
        Duration::from_secs(2),
        pool.acquire(&fast_key, &params("10.0.0.6")),
    )
    .await
    .expect("fast key blocked behind slow key");
    assert!(fast.is_ok());

    connector.gate.add_permits(1);
    assert!(slow.await.unwrap().is_ok());
    assert_eq!(pool.len().await, 2);
}

#[tokio::test]
async fn evict_is_idempotent_and_evict_all_drains() {
    let (pool, connector) = pool();
    let a = ConnectionKey::address("10.0.0.1", 27015);
    let b = ConnectionKey::address("10.0.0.2", 27015);
    pool.acquire(&a, &params("10.0.0.1")).await.unwrap();
    pool.acquire(&b, &params("10.0.0.2")).await.unwrap();

    assert!(pool.evict(&a).await);
    assert!(!pool.evict(&a).await);
    assert_eq!(pool.len().await, 1);

    // A session that died on its own is still drained without error
    connector.last_session().alive.store(false, Ordering::SeqCst);
    assert_eq!(pool.evict_all().await, 1);
    assert!(pool.is_empty().await);
    assert_eq!(pool.evict_all().await, 0);
}

#[tokio::test]
async fn auth_failure_is_not_retried() {
    let connector = Arc::new(EchoConnector::default());
    let pool: SessionPool<dyn CommandSession> = SessionPool::new(
        "rcon",
        Arc::clone(&connector) as Arc<dyn Connector<dyn CommandSession>>,
        RetryConfig::new().with_attempts(3).with_initial_delay_ms(1),
    );
    let key = ConnectionKey::address("10.0.0.7", 27015);
    let params = ConnectParams::new("10.0.0.7", 27015, Duration::from_secs(1))
        .with_credentials("", SecretString::from("wrong".to_string()));

    assert!(pool.acquire(&key, &params).await.is_err());
    assert_eq!(connector.connects(), 1);
    assert!(pool.is_empty().await);
}
