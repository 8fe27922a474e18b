//! Bounded nonce replay window.
//!
//! A nonce→timestamp map with a secondary timestamp-ordered index. Capacity
//! overflow evicts the oldest entry by timestamp; entries older than the
//! retention horizon are pruned on insert. Insert-if-absent and contains are
//! atomic under one lock, so two concurrent presentations of the same nonce
//! cannot both pass.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use anp_types::UtcTimestamp;

/// Replay defense for `DIDWba` nonces.
#[derive(Debug)]
pub struct NonceWindow {
    capacity: usize,
    retention: chrono::Duration,
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    by_nonce: HashMap<String, UtcTimestamp>,
    by_time: BTreeSet<(UtcTimestamp, String)>,
}

impl NonceWindow {
    /// A window holding at most `capacity` nonces, forgetting entries older
    /// than `retention`.
    pub fn new(capacity: usize, retention: chrono::Duration) -> Self {
        Self {
            capacity,
            retention,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Whether the nonce is currently present.
    pub fn contains(&self, nonce: &str) -> bool {
        self.inner.lock().expect("nonce window lock").by_nonce.contains_key(nonce)
    }

    /// Records a nonce. Returns `false` if it was already present (replay).
    ///
    /// Prunes expired entries relative to `now`, then evicts
    /// oldest-by-timestamp entries if the window is at capacity.
    pub fn insert(&self, nonce: &str, timestamp: UtcTimestamp, now: UtcTimestamp) -> bool {
        let mut inner = self.inner.lock().expect("nonce window lock");
        let horizon = now - self.retention;
        while let Some(entry) = inner.by_time.first().cloned() {
            if entry.0 >= horizon {
                break;
            }
            inner.by_time.remove(&entry);
            inner.by_nonce.remove(&entry.1);
        }
        if inner.by_nonce.contains_key(nonce) {
            return false;
        }
        while inner.by_nonce.len() >= self.capacity {
            let Some(oldest) = inner.by_time.first().cloned() else {
                break;
            };
            inner.by_time.remove(&oldest);
            inner.by_nonce.remove(&oldest.1);
        }
        inner.by_nonce.insert(nonce.to_string(), timestamp);
        inner.by_time.insert((timestamp, nonce.to_string()));
        true
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("nonce window lock").by_nonce.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> UtcTimestamp {
        UtcTimestamp::from_unix(secs).unwrap()
    }

    fn window(capacity: usize) -> NonceWindow {
        NonceWindow::new(capacity, chrono::Duration::seconds(300))
    }

    #[test]
    fn accepts_each_nonce_once() {
        let window = window(16);
        assert!(window.insert("n1", at(1_000), at(1_000)));
        assert!(!window.insert("n1", at(1_001), at(1_001)));
        assert!(window.contains("n1"));
    }

    #[test]
    fn evicts_oldest_on_overflow() {
        let window = window(2);
        assert!(window.insert("old", at(1_000), at(1_000)));
        assert!(window.insert("mid", at(1_010), at(1_010)));
        assert!(window.insert("new", at(1_020), at(1_020)));
        assert_eq!(window.len(), 2);
        assert!(!window.contains("old"));
        assert!(window.contains("mid"));
        assert!(window.contains("new"));
    }

    #[test]
    fn prunes_entries_past_retention() {
        let window = window(16);
        assert!(window.insert("stale", at(1_000), at(1_000)));
        // 400 seconds later the stale nonce has aged out of the window.
        assert!(window.insert("fresh", at(1_400), at(1_400)));
        assert!(!window.contains("stale"));
        // Re-presenting it now passes the nonce check; the timestamp-skew
        // rule is what keeps the old header unusable.
        assert!(window.insert("stale", at(1_000), at(1_400)));
    }
}
