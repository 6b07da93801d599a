//! In-process identify admission

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes identify attempts across every connection in this process.
///
/// Holding the inner mutex while waiting makes admission strictly one at
/// a time; each admission pushes the next safe instant forward by the
/// configured buffer. Resuming connections never touch the gate since a
/// resume carries no identify cost.
#[derive(Debug, Default)]
pub struct IdentifyGate {
    safe_after: Mutex<Option<Instant>>,
}

impl IdentifyGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until it is this caller's turn to identify, then reserves
    /// the window for `buffer` before the next admission.
    pub async fn wait_turn(&self, buffer: Duration) {
        let mut safe_after = self.safe_after.lock().await;
        if let Some(at) = *safe_after {
            tokio::time::sleep_until(at).await;
        }
        *safe_after = Some(Instant::now() + buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_admissions_are_spaced_by_buffer() {
        let gate = Arc::new(IdentifyGate::new());
        let buffer = Duration::from_secs(5);

        let start = Instant::now();
        gate.wait_turn(buffer).await;
        let first = start.elapsed();

        gate.wait_turn(buffer).await;
        let second = start.elapsed();

        assert!(first < Duration::from_millis(10));
        assert!(second >= buffer);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_waiters_serialize() {
        let gate = Arc::new(IdentifyGate::new());
        let buffer = Duration::from_secs(2);

        let a = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.wait_turn(buffer).await;
                Instant::now()
            })
        };
        let b = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.wait_turn(buffer).await;
                Instant::now()
            })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        let gap = if a > b { a - b } else { b - a };
        assert!(gap >= buffer);
    }
}
