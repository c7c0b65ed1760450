use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Short-lived map from normalized path to "is synced".
///
/// Entries only arrive in bulk from a daemon listing and only leave through
/// a full clear.
#[derive(Debug)]
pub struct SyncStatusCache {
    entries: HashMap<String, bool>,
    last_reset_at: Instant,
    freshness: Duration,
}

impl SyncStatusCache {
    pub fn new(freshness: Duration) -> Self {
        Self::starting_at(freshness, Instant::now())
    }

    pub fn starting_at(freshness: Duration, now: Instant) -> Self {
        Self {
            entries: HashMap::new(),
            last_reset_at: now,
            freshness,
        }
    }

    pub fn lookup(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn bulk_insert<I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (String, bool)>,
    {
        self.entries.extend(pairs);
    }

    /// Clears everything when the daemon is unreachable or the freshness
    /// window has elapsed. Returns `true` if a clear happened.
    pub fn maybe_invalidate(&mut self, now: Instant, connected: bool) -> bool {
        if !connected || now.saturating_duration_since(self.last_reset_at) > self.freshness {
            self.clear(now);
            return true;
        }
        false
    }

    pub fn clear(&mut self, now: Instant) {
        self.entries.clear();
        self.last_reset_at = now;
    }

    pub fn last_reset_at(&self) -> Instant {
        self.last_reset_at
    }

    pub fn freshness(&self) -> Duration {
        self.freshness
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
