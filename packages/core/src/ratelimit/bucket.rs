//! CAS-based token bucket.
//!
//! The bucket holds up to `capacity` tokens and refills continuously at
//! `capacity / window_secs` tokens per second. Refill and acquisition are
//! both compare-and-swap loops, so arbitrary concurrent callers never block
//! and never double-credit a refill.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// A concurrency-safe token bucket.
///
/// Starts full, so the first burst up to `capacity` always succeeds. Token
/// counts are whole numbers; fractional accrual is preserved by leaving
/// `last_refill` untouched until at least one whole token has accrued.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens the bucket can hold.
    capacity: u64,
    /// Tokens generated per second (`capacity / window_secs`).
    refill_rate: f64,
    /// Current token count, bounded to `[0, capacity]`.
    tokens: AtomicU64,
    /// Milliseconds since `epoch` of the last credited refill.
    last_refill_ms: AtomicU64,
    /// Monotonic anchor; time never goes backward relative to it, which
    /// satisfies the `delta >= 0` clamp by construction.
    epoch: Instant,
}

impl TokenBucket {
    /// Create a full bucket sized `capacity` over a `window_secs` window.
    ///
    /// A zero window is treated as one second so the refill rate stays finite.
    #[must_use]
    pub fn new(capacity: u64, window_secs: u64) -> Self {
        let window = window_secs.max(1);
        #[allow(clippy::cast_precision_loss)]
        let refill_rate = capacity as f64 / window as f64;
        Self {
            capacity,
            refill_rate,
            tokens: AtomicU64::new(capacity),
            last_refill_ms: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Attempt to take one token. Returns `false` when the bucket is empty.
    pub fn try_acquire(&self) -> bool {
        let now_ms = u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.try_acquire_at(now_ms)
    }

    /// Acquisition with an explicit clock reading, relative to the bucket
    /// epoch. Kept separate so tests can drive time deterministically.
    pub(crate) fn try_acquire_at(&self, now_ms: u64) -> bool {
        self.refill(now_ms);

        let mut current = self.tokens.load(Ordering::Acquire);
        while current > 0 {
            match self.tokens.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(observed) => current = observed,
            }
        }
        false
    }

    /// Credit tokens accrued since the last refill, clamped to `capacity`.
    ///
    /// Only the caller that wins the `last_refill_ms` CAS credits tokens, so
    /// concurrent refills never double-credit the same interval.
    fn refill(&self, now_ms: u64) {
        let last = self.last_refill_ms.load(Ordering::Acquire);
        let delta = now_ms.saturating_sub(last);
        if delta == 0 {
            return;
        }

        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let accrued = (delta as f64 * self.refill_rate / 1000.0) as u64;
        if accrued == 0 {
            return;
        }

        if self
            .last_refill_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let _ = self.tokens.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                Some(current.saturating_add(accrued).min(self.capacity))
            });
        }
    }

    /// Maximum number of tokens this bucket can hold.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
