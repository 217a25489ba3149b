//! Rate-limit enforcement points.
//!
//! Limits are declared as const [`RateLimitSpec`]s next to this module and
//! applied explicitly at each call site via [`enforce`]. The key combines the
//! spec's prefix, the operation name, and a discriminator chosen by the
//! strategy, so two operations sharing a prefix still get distinct buckets.

use quill_core::{LimitStrategy, RateLimiter};
use tracing::warn;

use crate::context::{PrincipalContext, RequestMetaContext};
use crate::error::AppError;

/// Declarative description of one rate-limited operation.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitSpec {
    /// Operation name, also used in the 429 error and metrics.
    pub operation: &'static str,
    /// Key prefix, kept distinct per concern so keys remain greppable.
    pub prefix: &'static str,
    /// Permits per window.
    pub count: u64,
    /// Window length in seconds.
    pub window_secs: u64,
    /// How callers are told apart.
    pub strategy: LimitStrategy,
}

// ---------------------------------------------------------------------------
// Registered limits
// ---------------------------------------------------------------------------

/// Login attempts: 3 per minute per client IP.
pub const LOGIN: RateLimitSpec = RateLimitSpec {
    operation: "auth.login",
    prefix: "login_limit:",
    count: 3,
    window_secs: 60,
    strategy: LimitStrategy::PerIp,
};

/// Verification-code sends: 2 per minute per client IP.
pub const VERIFICATION_CODE: RateLimitSpec = RateLimitSpec {
    operation: "auth.send_verification_code",
    prefix: "send_verification_code:",
    count: 2,
    window_secs: 60,
    strategy: LimitStrategy::PerIp,
};

/// Comment submission: 1 per minute per client IP.
pub const COMMENT_SUBMIT: RateLimitSpec = RateLimitSpec {
    operation: "comment.submit",
    prefix: "rate_limit:",
    count: 1,
    window_secs: 60,
    strategy: LimitStrategy::PerIp,
};

/// Search queries: 5 per second per client IP.
pub const SEARCH: RateLimitSpec = RateLimitSpec {
    operation: "content.search",
    prefix: "rate_limit:",
    count: 5,
    window_secs: 1,
    strategy: LimitStrategy::PerIp,
};

/// File uploads: 3 per minute per authenticated user.
pub const FILE_UPLOAD: RateLimitSpec = RateLimitSpec {
    operation: "file.upload",
    prefix: "rate_limit:",
    count: 3,
    window_secs: 60,
    strategy: LimitStrategy::PerUser,
};

// ---------------------------------------------------------------------------
// Enforcement
// ---------------------------------------------------------------------------

/// Bucket key for the current caller under `spec`.
fn bucket_key(spec: &RateLimitSpec) -> String {
    let discriminator = match spec.strategy {
        LimitStrategy::PerIp => RequestMetaContext::current()
            .map(|meta| meta.ip)
            .unwrap_or_else(|| "unknown".to_string()),
        LimitStrategy::PerUser => PrincipalContext::current()
            .map(|principal| principal.username)
            .unwrap_or_else(|| "anonymous".to_string()),
        LimitStrategy::Global => "global".to_string(),
    };
    format!("{}{}:{}", spec.prefix, spec.operation, discriminator)
}

/// Check the caller against `spec` and consume one permit.
///
/// # Errors
///
/// Returns [`AppError::RateLimited`] when the caller's bucket is exhausted;
/// the caller is expected to abort the operation before any side effect.
pub fn enforce(limiter: &RateLimiter, spec: &RateLimitSpec) -> Result<(), AppError> {
    let key = bucket_key(spec);
    if limiter.is_allowed(&key, spec.count, spec.window_secs) {
        return Ok(());
    }
    warn!(operation = spec.operation, key = %key, "rate limit exceeded");
    metrics::counter!("quill_rate_limited_total", "operation" => spec.operation).increment(1);
    Err(AppError::RateLimited {
        operation: spec.operation,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
