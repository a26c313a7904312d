//! # Duplicate Suppressor
//!
//! Guards "add bundle to cart" against double submits.
//!
//! ```text
//! suppress(key) at t
//!   ├── seen at t' with t − t' < window  → true  (duplicate, reject)
//!   └── otherwise                        → false (record t, allow)
//!
//! capacity reached → sweep expired entries → still full → evict oldest
//! ```
//!
//! Callers whose action can fail after the check use `is_duplicate`
//! followed by `record` once the action has gone through.
//!
//! False positives (two genuine adds within the window) are accepted.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::hashing::sha256_hex;
use crate::types::ProductId;

/// Default suppression window.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(2);

/// Default number of remembered keys.
pub const DEFAULT_CAPACITY: usize = 10_000;

// =============================================================================
// Key
// =============================================================================

/// Hash of one "add bundle" action.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Builds the key from the product, its variation and any custom
    /// fields. Fields are hashed in key order, so map order never matters.
    pub fn new(
        product_id: ProductId,
        variation_id: Option<ProductId>,
        custom_fields: &BTreeMap<String, String>,
    ) -> Self {
        let variation = variation_id.map(|v| v.to_string()).unwrap_or_default();
        let mut canonical = format!("{product_id}|{variation}|");
        for (name, value) in custom_fields {
            // Length prefixes keep "a=b;c" and "a=b" + "c" apart.
            let _ = write!(canonical, "{}:{name}={}:{value};", name.len(), value.len());
        }
        DedupeKey(sha256_hex(canonical.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Suppressor
// =============================================================================

/// Bounded, TTL-evicted record of recent actions. Shared across requests.
#[derive(Debug)]
pub struct DuplicateSuppressor {
    window: Duration,
    capacity: usize,
    seen: Mutex<HashMap<DedupeKey, Instant>>,
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        DuplicateSuppressor::new(DEFAULT_WINDOW, DEFAULT_CAPACITY)
    }
}

impl DuplicateSuppressor {
    /// Creates a suppressor. A capacity of zero is treated as one.
    pub fn new(window: Duration, capacity: usize) -> Self {
        DuplicateSuppressor {
            window,
            capacity: capacity.max(1),
            seen: Mutex::new(HashMap::new()),
        }
    }

    /// Returns `true` when `key` was seen within the window (reject),
    /// otherwise records it and returns `false`.
    pub fn suppress(&self, key: &DedupeKey) -> bool {
        self.suppress_at(key, Instant::now())
    }

    /// [`suppress`](Self::suppress) with an explicit clock.
    pub fn suppress_at(&self, key: &DedupeKey, now: Instant) -> bool {
        let mut seen = self.lock();
        if self.seen_within_window(&seen, key, now) {
            debug!(key = %key.as_str(), "Duplicate action suppressed");
            return true;
        }
        self.insert(&mut seen, key, now);
        false
    }

    /// Whether `key` was recorded within the window. Records nothing.
    ///
    /// Pair with [`record`](Self::record) when the action can still fail
    /// after the check; a failed action must not block its retry.
    pub fn is_duplicate(&self, key: &DedupeKey) -> bool {
        self.is_duplicate_at(key, Instant::now())
    }

    pub fn is_duplicate_at(&self, key: &DedupeKey, now: Instant) -> bool {
        let seen = self.lock();
        self.seen_within_window(&seen, key, now)
    }

    /// Records a completed action.
    pub fn record(&self, key: &DedupeKey) {
        self.record_at(key, Instant::now());
    }

    pub fn record_at(&self, key: &DedupeKey, now: Instant) {
        let mut seen = self.lock();
        self.insert(&mut seen, key, now);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DedupeKey, Instant>> {
        // A poisoned map of timestamps is still a valid map.
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn seen_within_window(
        &self,
        seen: &HashMap<DedupeKey, Instant>,
        key: &DedupeKey,
        now: Instant,
    ) -> bool {
        seen.get(key)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.window)
    }

    fn insert(&self, seen: &mut HashMap<DedupeKey, Instant>, key: &DedupeKey, now: Instant) {
        if !seen.contains_key(key) && seen.len() >= self.capacity {
            let window = self.window;
            seen.retain(|_, at| now.saturating_duration_since(*at) < window);
            if seen.len() >= self.capacity {
                if let Some(oldest) = seen.iter().min_by_key(|(_, at)| **at).map(|(k, _)| k.clone()) {
                    seen.remove(&oldest);
                }
            }
        }
        seen.insert(key.clone(), now);
    }

    /// Number of remembered keys.
    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(product_id: ProductId) -> DedupeKey {
        DedupeKey::new(product_id, None, &BTreeMap::new())
    }

    #[test]
    fn test_second_call_within_window_is_suppressed() {
        let s = DuplicateSuppressor::default();
        let now = Instant::now();
        assert!(!s.suppress_at(&key(10), now));
        assert!(s.suppress_at(&key(10), now + Duration::from_millis(500)));
        assert!(!s.suppress_at(&key(11), now));
    }

    #[test]
    fn test_call_after_window_is_allowed() {
        let s = DuplicateSuppressor::new(Duration::from_secs(2), 10);
        let now = Instant::now();
        assert!(!s.suppress_at(&key(10), now));
        assert!(!s.suppress_at(&key(10), now + Duration::from_secs(2)));
    }

    #[test]
    fn test_key_depends_on_variation_and_fields() {
        let mut fields = BTreeMap::new();
        fields.insert("engraving".to_string(), "A".to_string());

        assert_ne!(key(10), DedupeKey::new(10, Some(101), &BTreeMap::new()));
        assert_ne!(key(10), DedupeKey::new(10, None, &fields));
        assert_eq!(DedupeKey::new(10, None, &fields), DedupeKey::new(10, None, &fields.clone()));
    }

    #[test]
    fn test_capacity_sweeps_expired_then_evicts_oldest() {
        let s = DuplicateSuppressor::new(Duration::from_secs(2), 2);
        let t0 = Instant::now();
        s.suppress_at(&key(1), t0);
        s.suppress_at(&key(2), t0 + Duration::from_secs(1));

        // Nothing expired yet: key 1 is the oldest and goes.
        s.suppress_at(&key(3), t0 + Duration::from_millis(1500));
        assert_eq!(s.len(), 2);
        assert!(!s.suppress_at(&key(1), t0 + Duration::from_millis(1600)));

        // Much later every entry has expired and is swept.
        s.suppress_at(&key(4), t0 + Duration::from_secs(10));
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_check_without_record_does_not_block() {
        let s = DuplicateSuppressor::default();
        let now = Instant::now();

        assert!(!s.is_duplicate_at(&key(10), now));
        assert!(!s.is_duplicate_at(&key(10), now + Duration::from_millis(100)));
        assert!(s.is_empty());

        s.record_at(&key(10), now + Duration::from_millis(200));
        assert!(s.is_duplicate_at(&key(10), now + Duration::from_millis(300)));
        assert!(!s.is_duplicate_at(&key(10), now + Duration::from_millis(2200)));
    }
}
