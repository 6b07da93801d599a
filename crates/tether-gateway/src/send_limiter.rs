//! Outbound frame admission

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Frames allowed per window
const WINDOW_QUOTA: u32 = 120;
/// Window length
const WINDOW: Duration = Duration::from_secs(60);
/// Capacity held back for liveness-critical frames
const RESERVED_BUFFER: u32 = 4;

/// Sliding-window counter guarding all outbound sends.
///
/// Ordinary frames stop being admitted once remaining capacity falls
/// below the reserved buffer; heartbeat and resume frames may keep
/// drawing from the buffer so bulk sends can never starve liveness.
#[derive(Debug)]
pub struct SendLimiter {
    inner: Mutex<Window>,
}

#[derive(Debug)]
struct Window {
    remaining: u32,
    reset_at: Instant,
}

impl Default for SendLimiter {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Window {
                remaining: WINDOW_QUOTA,
                reset_at: Instant::now() + WINDOW,
            }),
        }
    }
}

impl SendLimiter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admits or rejects one send, consuming capacity when admitted
    pub fn try_send(&self, bypass_buffer: bool) -> bool {
        let mut window = self.inner.lock();
        let now = Instant::now();
        if now >= window.reset_at {
            window.remaining = WINDOW_QUOTA;
            window.reset_at = now + WINDOW;
        }

        let admitted = if bypass_buffer {
            window.remaining > 0
        } else {
            window.remaining >= RESERVED_BUFFER
        };
        if admitted {
            window.remaining -= 1;
        }
        admitted
    }

    /// How long until the window resets
    #[must_use]
    pub fn reset_after(&self) -> Duration {
        let window = self.inner.lock();
        window.reset_at.saturating_duration_since(Instant::now())
    }
}
