//! Short-window suppression of repeated identical actions.
//!
//! A turnstile arm bouncing, a badge held against the reader, or a gate
//! controller retransmitting on a flaky link all produce bursts of identical
//! events.  Waking a host twice is harmless; racing two shutdown chains
//! against the same target is not.  The cache answers one question: has this
//! (identity, action) pair already been acted on within the window?
//!
//! Suppressed duplicates do **not** refresh the window — only accepted
//! actions call [`DedupCache::record`].  Otherwise a badge held against the
//! reader would push the window forward forever and the action would never
//! fire again.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use gatewake_core::AccessKind;

/// Entries older than this are discarded when the cache is over capacity.
/// Far larger than any sane suppression window, so pruning can never affect
/// an entry a caller might still ask about.
const PRUNE_AGE: Duration = Duration::from_secs(300);

/// Thread-safe (identity, action) → last-accepted-time cache.
///
/// Shared across all dispatch workers behind an `Arc`; the map lives behind
/// a `Mutex` so concurrent lookups and records for different identities
/// cannot lose updates.  Memory stays bounded under sustained load: once the
/// map exceeds `capacity`, expired entries are pruned, and if every entry is
/// still fresh the oldest ones are evicted to make room.
pub struct DedupCache {
    entries: Mutex<HashMap<(String, AccessKind), Instant>>,
    capacity: usize,
}

impl DedupCache {
    /// Creates a cache that starts pruning above `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// True when an action of `kind` for `identity` was accepted less than
    /// `window` ago.  Does not modify the cache.
    pub fn has_recent(&self, identity: &str, kind: AccessKind, window: Duration) -> bool {
        let entries = self.lock();
        match entries.get(&(identity.to_string(), kind)) {
            Some(accepted_at) => accepted_at.elapsed() < window,
            None => false,
        }
    }

    /// Marks an action as accepted now.  Call only on the path that actually
    /// took the action.
    pub fn record(&self, identity: &str, kind: AccessKind) {
        let mut entries = self.lock();
        if entries.len() >= self.capacity {
            Self::evict(&mut entries, self.capacity);
        }
        entries.insert((identity.to_string(), kind), Instant::now());
    }

    /// Number of live entries (test hook).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// True when the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, AccessKind), Instant>> {
        // A panic while holding the lock leaves the map intact; recover it.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drops expired entries, then the oldest fresh ones until the map fits
    /// under `capacity` again.
    fn evict(entries: &mut HashMap<(String, AccessKind), Instant>, capacity: usize) {
        if let Some(horizon) = Instant::now().checked_sub(PRUNE_AGE) {
            entries.retain(|_, accepted_at| *accepted_at > horizon);
        }
        while entries.len() >= capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, accepted_at)| **accepted_at)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
