//! Ordered acquisition across multiple identify locks

use tracing::{debug, warn};

use crate::error::RpcResult;

use super::HttpLockClient;

/// The set of locks a shard must hold before identifying, acquired in
/// configuration order. When a later lock is denied, the auxiliary locks
/// already taken in that attempt are released in reverse order. The main
/// (first) lock is never explicitly released; its server-side expiry is
/// what spaces identifies globally.
#[derive(Debug, Default)]
pub struct IdentifyLockChain {
    locks: Vec<HttpLockClient>,
}

impl IdentifyLockChain {
    #[must_use]
    pub fn new(locks: Vec<HttpLockClient>) -> Self {
        Self { locks }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Attempts to acquire every lock in order.
    ///
    /// Returns `Ok(true)` when the shard may identify, `Ok(false)` when a
    /// lock was denied and the caller should retry later. An unreachable
    /// service counts as acquired for locks with fallback enabled and is
    /// an error otherwise.
    pub async fn acquire_all(&self) -> RpcResult<bool> {
        let mut taken: Vec<&HttpLockClient> = Vec::new();

        for (index, lock) in self.locks.iter().enumerate() {
            match lock.acquire().await {
                Ok(status) if status.success => {
                    // The main lock is left to expire on its own.
                    if index > 0 {
                        taken.push(lock);
                    }
                }
                Ok(status) => {
                    debug!(
                        url = %lock.base_url(),
                        message = status.message.as_deref().unwrap_or(""),
                        "identify lock denied, rolling back"
                    );
                    self.rollback(taken).await;
                    return Ok(false);
                }
                Err(err) if err.is_unavailable() && lock.allow_fallback() => {
                    warn!(
                        url = %lock.base_url(),
                        "identify lock service unreachable, continuing without it"
                    );
                }
                Err(err) => {
                    self.rollback(taken).await;
                    return Err(err);
                }
            }
        }

        Ok(true)
    }

    async fn rollback(&self, taken: Vec<&HttpLockClient>) {
        for lock in taken.into_iter().rev() {
            if let Err(err) = lock.release().await {
                warn!(url = %lock.base_url(), %err, "failed to release identify lock");
            }
        }
    }
}
