//! Keyed token-bucket store with idle eviction.
//!
//! Maps a rate-limit key to its [`TokenBucket`], creating buckets on first
//! sight with get-or-insert semantics (one creation per key even under
//! concurrent first callers). Entries idle longer than the configured TTL are
//! swept opportunistically to bound memory. An evicted bucket that comes back
//! starts full, which only ever makes limiting more permissive after a long
//! idle gap, never less.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use super::bucket::TokenBucket;

/// How many `is_allowed` calls pass between opportunistic idle sweeps.
const SWEEP_INTERVAL_CALLS: u64 = 1024;

/// Configuration for the keyed bucket store.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Entries untouched for this long are evicted.
    pub idle_ttl: Duration,
    /// Entry count above which a sweep runs regardless of call cadence.
    pub sweep_watermark: usize,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(60 * 60),
            sweep_watermark: 5_000,
        }
    }
}

struct Entry {
    bucket: TokenBucket,
    /// Milliseconds since the limiter epoch of the last touch.
    last_access_ms: AtomicU64,
}

/// Shared, lock-free-on-the-hot-path rate limiter.
///
/// The only state intentionally shared across concurrent request tasks;
/// everything else in the tenant/audit machinery is task-confined.
pub struct RateLimiter {
    buckets: DashMap<String, Arc<Entry>>,
    config: RateLimiterConfig,
    calls: AtomicU64,
    epoch: Instant,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            buckets: DashMap::new(),
            config,
            calls: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Check whether one more invocation keyed by `key` is allowed within a
    /// `count`-per-`window_secs` budget.
    ///
    /// The bucket for `key` is sized from the first call's parameters;
    /// subsequent calls reuse it until idle eviction resets it.
    pub fn is_allowed(&self, key: &str, count: u64, window_secs: u64) -> bool {
        let now_ms = self.now_ms();
        self.maybe_sweep(now_ms);

        let entry = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                Arc::new(Entry {
                    bucket: TokenBucket::new(count, window_secs),
                    last_access_ms: AtomicU64::new(now_ms),
                })
            })
            .clone();

        entry.last_access_ms.store(now_ms, Ordering::Release);
        entry.bucket.try_acquire()
    }

    /// Number of live (non-evicted) buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Evict idle entries every `SWEEP_INTERVAL_CALLS` calls, or immediately
    /// once the store grows past the watermark.
    fn maybe_sweep(&self, now_ms: u64) {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let over_watermark = self.buckets.len() > self.config.sweep_watermark;
        if call % SWEEP_INTERVAL_CALLS != 0 && !over_watermark {
            return;
        }

        let ttl_ms = u64::try_from(self.config.idle_ttl.as_millis()).unwrap_or(u64::MAX);
        let before = self.buckets.len();
        self.buckets.retain(|_, entry| {
            now_ms.saturating_sub(entry.last_access_ms.load(Ordering::Acquire)) < ttl_ms
        });
        // Concurrent callers can insert while retain runs, so the live count
        // may exceed the snapshot taken before the sweep.
        let evicted = before.saturating_sub(self.buckets.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.buckets.len(), "rate limiter idle sweep");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
