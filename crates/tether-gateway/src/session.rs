//! Per-connection session state

use parking_lot::Mutex;
use tracing::warn;

/// Session identity and sequence tracking for one gateway connection.
///
/// The sequence is monotonically non-decreasing within a session and
/// resets to 0 only when a fresh identify starts a new session.
#[derive(Debug, Default)]
pub struct Session {
    inner: Mutex<SessionState>,
}

#[derive(Debug, Default)]
struct SessionState {
    session_id: Option<String>,
    sequence: u64,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a resume is possible: a session id exists and at least one
    /// dispatch was seen
    #[must_use]
    pub fn resumable(&self) -> bool {
        let inner = self.inner.lock();
        inner.session_id.is_some() && inner.sequence != 0
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().session_id.clone()
    }

    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Records the session id from a Ready dispatch
    pub fn start(&self, session_id: String) {
        self.inner.lock().session_id = Some(session_id);
    }

    /// Clears all state ahead of a fresh identify
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.session_id = None;
        inner.sequence = 0;
    }

    /// Advances the sequence from a dispatch frame. Only moves forward;
    /// an out-of-order or gapped value is logged and otherwise ignored.
    pub fn update_sequence(&self, incoming: u64) {
        let mut inner = self.inner.lock();
        if incoming < inner.sequence {
            warn!(
                current = inner.sequence,
                incoming, "dispatch sequence went backwards"
            );
            return;
        }
        if inner.sequence != 0 && incoming > inner.sequence + 1 {
            warn!(
                current = inner.sequence,
                incoming, "dispatch sequence skipped ahead"
            );
        }
        inner.sequence = incoming;
    }
}
