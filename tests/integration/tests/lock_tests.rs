//! Identify lock service tests over real sockets

use std::time::Duration;

use tether_rpc::{HttpLockClient, IdentifyLockChain, LockServer, RpcError};

async fn lock_server() -> String {
    let server = LockServer::new();
    let (addr, _handle) = server
        .serve("127.0.0.1:0".parse().unwrap())
        .await
        .expect("serve lock");
    format!("http://{addr}")
}

#[tokio::test]
async fn test_acquire_release_round_trip() {
    let url = lock_server().await;
    let first = HttpLockClient::new(&url, Duration::from_secs(10), false);
    let second = HttpLockClient::new(&url, Duration::from_secs(10), false);

    let status = first.acquire().await.expect("acquire");
    assert!(status.success);

    // a distinct holder is refused while the lock is live
    let status = second.acquire().await.expect("acquire");
    assert!(!status.success);

    let status = first.release().await.expect("release");
    assert!(status.success);

    let status = second.acquire().await.expect("acquire");
    assert!(status.success);
}

#[tokio::test]
async fn test_reacquire_with_same_token_refreshes() {
    let url = lock_server().await;
    let client = HttpLockClient::new(&url, Duration::from_secs(10), false);

    assert!(client.acquire().await.expect("acquire").success);
    assert!(client.acquire().await.expect("acquire").success);
}

#[tokio::test]
async fn test_expired_lock_is_reclaimable() {
    let url = lock_server().await;
    let first = HttpLockClient::new(&url, Duration::from_millis(100), false);
    let second = HttpLockClient::new(&url, Duration::from_secs(10), false);

    assert!(first.acquire().await.expect("acquire").success);
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(second.acquire().await.expect("acquire").success);
}

#[tokio::test]
async fn test_chain_rolls_back_auxiliaries_on_denial() {
    let url_a = lock_server().await;
    let url_b = lock_server().await;
    let url_c = lock_server().await;

    // someone else already holds C
    let holder = HttpLockClient::new(&url_c, Duration::from_secs(10), false);
    assert!(holder.acquire().await.expect("acquire").success);

    let chain = IdentifyLockChain::new(vec![
        HttpLockClient::new(&url_a, Duration::from_secs(10), false),
        HttpLockClient::new(&url_b, Duration::from_secs(10), false),
        HttpLockClient::new(&url_c, Duration::from_secs(10), false),
    ]);
    let acquired = chain.acquire_all().await.expect("chain");
    assert!(!acquired);

    // the auxiliary B was released during rollback
    let prober = HttpLockClient::new(&url_b, Duration::from_secs(10), false);
    assert!(prober.acquire().await.expect("acquire").success);

    // the main lock A stays held until its server-side expiry
    let prober = HttpLockClient::new(&url_a, Duration::from_secs(10), false);
    assert!(!prober.acquire().await.expect("acquire").success);
}

#[tokio::test]
async fn test_chain_succeeds_end_to_end() {
    let url_a = lock_server().await;
    let url_b = lock_server().await;

    let chain = IdentifyLockChain::new(vec![
        HttpLockClient::new(&url_a, Duration::from_secs(10), false),
        HttpLockClient::new(&url_b, Duration::from_secs(10), false),
    ]);
    assert!(chain.acquire_all().await.expect("chain"));

    // both locks are held
    let prober = HttpLockClient::new(&url_a, Duration::from_secs(10), false);
    assert!(!prober.acquire().await.expect("acquire").success);
    let prober = HttpLockClient::new(&url_b, Duration::from_secs(10), false);
    assert!(!prober.acquire().await.expect("acquire").success);
}

#[tokio::test]
async fn test_unreachable_lock_with_fallback_is_skipped() {
    let url_a = lock_server().await;

    let chain = IdentifyLockChain::new(vec![
        HttpLockClient::new(&url_a, Duration::from_secs(10), false),
        HttpLockClient::new("http://127.0.0.1:9", Duration::from_secs(10), true),
    ]);
    assert!(chain.acquire_all().await.expect("chain"));
}

#[tokio::test]
async fn test_unreachable_lock_without_fallback_propagates() {
    let url_a = lock_server().await;

    let chain = IdentifyLockChain::new(vec![
        HttpLockClient::new(&url_a, Duration::from_secs(10), false),
        HttpLockClient::new("http://127.0.0.1:9", Duration::from_secs(10), false),
    ]);
    let result = chain.acquire_all().await;
    assert!(matches!(result, Err(RpcError::Unavailable(_))));

    // the main lock stays held, left to its server-side expiry
    let prober = HttpLockClient::new(&url_a, Duration::from_secs(10), false);
    assert!(!prober.acquire().await.expect("acquire").success);
}
