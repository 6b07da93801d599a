//! Holding area for requests that could not be sent immediately

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::request::{ApiRequest, ApiResponse};

/// A request parked in the queue, holding the channel its caller awaits
#[derive(Debug)]
pub struct QueuedRequest {
    pub request: ApiRequest,
    pub queued_at: Instant,
    pub responder: oneshot::Sender<ApiResult<ApiResponse>>,
}

/// FIFO queue of rate limited requests, drained by a periodic scan.
///
/// A scan takes every entry, attempts the ones whose rate limits have
/// cleared, and reinstates the rest in their original order, so no
/// request can starve behind newer traffic to a different route.
#[derive(Debug, Default)]
pub struct RequestQueue {
    entries: Mutex<VecDeque<QueuedRequest>>,
    /// Requests queued before this instant are not attempted
    paused_until: Mutex<Option<Instant>>,
    /// Guards against overlapping scans when one runs long
    processing: AtomicBool,
}

impl RequestQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a request and returns the channel that will carry its outcome
    pub fn push(&self, request: ApiRequest) -> oneshot::Receiver<ApiResult<ApiResponse>> {
        let (responder, receiver) = oneshot::channel();
        self.entries.lock().push_back(QueuedRequest {
            request,
            queued_at: Instant::now(),
            responder,
        });
        receiver
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Holds the whole queue until `until`. A later pause always wins so
    /// overlapping holds cannot shorten each other.
    pub fn pause_until(&self, until: Instant) {
        let mut paused = self.paused_until.lock();
        match *paused {
            Some(current) if current >= until => {}
            _ => *paused = Some(until),
        }
    }

    fn is_paused(&self) -> bool {
        let mut paused = self.paused_until.lock();
        match *paused {
            Some(until) if until > Instant::now() => true,
            Some(_) => {
                *paused = None;
                false
            }
            None => false,
        }
    }

    /// Runs one scan: expires entries past `timeout`, offers the rest to
    /// `try_send` in queue order. `try_send` returns the entry back when
    /// it still cannot go out; kept entries retain their position.
    ///
    /// No-ops when a previous scan is still running or the queue is paused.
    pub fn process<F>(&self, timeout: Option<Duration>, mut try_send: F)
    where
        F: FnMut(QueuedRequest) -> Option<QueuedRequest>,
    {
        if self.is_paused() {
            return;
        }
        if self
            .processing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return;
        }

        let taken: Vec<QueuedRequest> = {
            let mut entries = self.entries.lock();
            entries.drain(..).collect()
        };

        let now = Instant::now();
        let mut kept = VecDeque::new();
        for entry in taken {
            if let Some(timeout) = timeout {
                if now.duration_since(entry.queued_at) > timeout {
                    warn!(
                        url = %entry.request.route.url,
                        "request expired in queue"
                    );
                    let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    let _ = entry.responder.send(Err(ApiError::QueueTimeout(millis)));
                    continue;
                }
            }
            if let Some(entry) = try_send(entry) {
                kept.push_back(entry);
            }
        }

        if !kept.is_empty() {
            let mut entries = self.entries.lock();
            // newer arrivals during the scan go behind the kept entries
            while let Some(entry) = kept.pop_back() {
                entries.push_front(entry);
            }
        }

        self.processing.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;

    fn request(url: &str) -> ApiRequest {
        ApiRequest::new(Method::GET, url, None)
    }

    #[tokio::test]
    async fn test_push_then_process_fulfills_in_order() {
        let queue = RequestQueue::new();
        let _a = queue.push(request("channels/1"));
        let _b = queue.push(request("channels/2"));

        let mut seen = Vec::new();
        queue.process(None, |entry| {
            seen.push(entry.request.route.url.clone());
            let _ = entry.responder.send(Ok(ApiResponse {
                status: 200,
                rate_limit: None,
                body: serde_json::Value::Null,
            }));
            None
        });

        assert_eq!(seen, vec!["channels/1", "channels/2"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_kept_entries_stay_in_front() {
        let queue = RequestQueue::new();
        let _a = queue.push(request("channels/1"));
        let _b = queue.push(request("channels/2"));

        // nothing can go out; both entries survive the scan
        queue.process(None, Some);
        assert_eq!(queue.len(), 2);

        let _c = queue.push(request("channels/3"));

        let mut seen = Vec::new();
        queue.process(None, |entry| {
            seen.push(entry.request.route.url.clone());
            Some(entry)
        });
        assert_eq!(seen, vec!["channels/1", "channels/2", "channels/3"]);
    }

    #[tokio::test]
    async fn test_expired_entries_fail_with_timeout() {
        let queue = RequestQueue::new();
        let receiver = queue.push(request("channels/1"));

        queue.process(Some(Duration::ZERO), |entry| {
            panic!("expired entry {} should not be offered", entry.request.route.url)
        });

        let outcome = receiver.await.expect("responder dropped");
        assert!(matches!(outcome, Err(ApiError::QueueTimeout(_))));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_paused_queue_skips_scan() {
        let queue = RequestQueue::new();
        let _a = queue.push(request("channels/1"));

        queue.pause_until(Instant::now() + Duration::from_secs(60));
        queue.process(None, |_| panic!("scan should be skipped while paused"));
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn test_later_pause_wins() {
        let queue = RequestQueue::new();
        let now = Instant::now();

        queue.pause_until(now + Duration::from_secs(60));
        queue.pause_until(now + Duration::from_secs(1));

        // still paused by the longer hold
        let _a = queue.push(request("channels/1"));
        queue.process(None, |_| panic!("scan should be skipped while paused"));
        assert_eq!(queue.len(), 1);
    }
}
