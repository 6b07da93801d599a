//! The lock itself, independent of any transport

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::messages::LockStatus;

/// A token-granting mutex with automatic expiry.
///
/// An unheld lock grants a fresh token to whoever asks first. The holder
/// may re-acquire with its token to refresh the expiry, and release with
/// it when done. If the holder disappears, the armed timer releases the
/// lock after the requested duration.
#[derive(Debug, Clone, Default)]
pub struct Lock {
    inner: Arc<Mutex<LockInner>>,
}

#[derive(Debug, Default)]
struct LockInner {
    /// Token of the current holder; `None` means available
    token: Option<String>,
    expiry: Option<JoinHandle<()>>,
}

impl Lock {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts to take or refresh the lock
    pub fn acquire(&self, duration: Duration, token: Option<&str>) -> LockStatus {
        let mut inner = self.inner.lock();

        match (&inner.token, token) {
            (None, presented) => {
                // a caller returning with its old token keeps it
                let granted = presented
                    .map_or_else(|| Uuid::new_v4().to_string(), str::to_owned);
                debug!(token = %granted, ?duration, "lock acquired");
                self.arm(&mut inner, duration, granted.clone());
                LockStatus::granted(granted)
            }
            (Some(held), Some(presented)) if held == presented => {
                let granted = presented.to_owned();
                debug!(token = %granted, ?duration, "lock refreshed");
                self.arm(&mut inner, duration, granted.clone());
                LockStatus::granted(granted)
            }
            (Some(_), _) => LockStatus::denied("already locked by a different client"),
        }
    }

    /// Attempts to release the lock. Releasing an unheld lock succeeds.
    pub fn release(&self, token: Option<&str>) -> LockStatus {
        let mut inner = self.inner.lock();

        match (&inner.token, token) {
            (None, _) => LockStatus::released(),
            (Some(_), None) => LockStatus::denied("no token provided"),
            (Some(held), Some(presented)) if held == presented => {
                debug!(token = %presented, "lock released");
                Self::clear(&mut inner);
                LockStatus::released()
            }
            (Some(_), Some(_)) => LockStatus::denied("locked by a different client"),
        }
    }

    /// Whether the lock is currently held
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.inner.lock().token.is_some()
    }

    /// Sets the holder and re-arms the expiry timer
    fn arm(&self, inner: &mut LockInner, duration: Duration, token: String) {
        if let Some(old) = inner.expiry.take() {
            old.abort();
        }
        inner.token = Some(token.clone());

        let lock = Arc::clone(&self.inner);
        inner.expiry = Some(tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let mut inner = lock.lock();
            // only expire the grant this timer belongs to
            if inner.token.as_deref() == Some(token.as_str()) {
                debug!(%token, ?duration, "lock expired");
                inner.token = None;
                inner.expiry = None;
            }
        }));
    }

    fn clear(inner: &mut LockInner) {
        if let Some(expiry) = inner.expiry.take() {
            expiry.abort();
        }
        inner.token = None;
    }
}
