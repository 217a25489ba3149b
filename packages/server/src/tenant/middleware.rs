//! Tenant identification middleware.
//!
//! Outermost application middleware: resolves the tenant from the Host
//! header, captures request environment metadata while it is still available,
//! and binds both into the task-scoped context around the rest of the chain.
//! The scope guarantees the context is gone when the request ends, whether
//! the chain succeeded or raised.

use axum::extract::{Request, State};
use axum::http::header::{HOST, USER_AGENT};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use crate::app::AppState;
use crate::context::{bind_request, RequestMeta};

/// Paths that never need a tenant: probes and static assets. Skipping them
/// avoids a directory lookup per asset request.
fn is_exempt(path: &str) -> bool {
    path == "/health"
        || path.starts_with("/health/")
        || path.starts_with("/assets/")
        || path.starts_with("/uploads/")
        || path == "/favicon.ico"
}

/// Resolve the tenant and establish the request context.
pub async fn resolve_tenant(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    if is_exempt(request.uri().path()) {
        return next.run(request).await;
    }

    let host = request
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    match state.resolver.resolve_host(&host).await {
        Ok(identity) => {
            debug!(tenant_id = identity.id, code = %identity.code, "request bound to tenant");
            let meta = RequestMeta::from_headers(request.headers());
            bind_request(Some(identity), Some(meta), next.run(request)).await
        }
        Err(err) => err.into_response(),
    }
}

impl RequestMeta {
    /// Capture the client environment from request headers. This runs on the
    /// request task, before any async handoff could make the request
    /// unavailable.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ua = headers
            .get(USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        Self {
            ip: client_ip(headers),
            browser: classify_browser(ua).to_string(),
            os: classify_os(ua).to_string(),
            device: classify_device(ua).to_string(),
        }
    }
}

/// First address in `X-Forwarded-For`, then `X-Real-IP`, else `"unknown"`.
fn client_ip(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    if let Some(real) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let real = real.trim();
        if !real.is_empty() {
            return real.to_string();
        }
    }
    "unknown".to_string()
}

fn classify_browser(ua: &str) -> &'static str {
    if ua.is_empty() {
        "Unknown"
    } else if ua.contains("Edg") {
        "Edge"
    } else if ua.contains("Chrome") {
        "Chrome"
    } else if ua.contains("Firefox") {
        "Firefox"
    } else if ua.contains("Safari") {
        "Safari"
    } else {
        "Other"
    }
}

fn classify_os(ua: &str) -> &'static str {
    if ua.is_empty() {
        "Unknown"
    } else if ua.contains("Windows") {
        "Windows"
    } else if ua.contains("Android") {
        "Android"
    } else if ua.contains("iPhone") || ua.contains("iPad") {
        // Checked before "Mac OS": iOS agents advertise "like Mac OS X".
        "iOS"
    } else if ua.contains("Mac OS") {
        "macOS"
    } else if ua.contains("Linux") {
        "Linux"
    } else {
        "Other"
    }
}

fn classify_device(ua: &str) -> &'static str {
    if ua.is_empty() {
        "Unknown"
    } else if ua.contains("Mobile") {
        "Mobile"
    } else if ua.contains("Tablet") || ua.contains("iPad") {
        "Tablet"
    } else {
        "Desktop"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
