//! Lock-free rate limiting primitives.
//!
//! [`TokenBucket`] is the per-key CAS primitive; [`RateLimiter`] is the keyed
//! store that creates buckets on demand and evicts idle entries. Both sit on
//! hot concurrent paths (login, comment submission, verification codes) and
//! deliberately avoid locks.

mod bucket;
mod store;

pub use bucket::TokenBucket;
pub use store::{RateLimiter, RateLimiterConfig};
