//! Inbound host → tenant identity.
//!
//! Derives a tenant code from the request's host, looks the tenant up through
//! the directory (with a short-lived cache), and enforces activation and
//! expiry before any handler code runs.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::config::TenantConfig;
use crate::context::TenantIdentity;
use crate::error::AppError;

use super::directory::{epoch_ms_now, TenantDirectory, TenantRecord};
use quill_core::TenantStatus;

/// Derive the tenant code from a host name.
///
/// Rules, first match wins:
/// 1. apex domain or its `www.` variant → the default code
/// 2. subdomain of the apex → everything before `.{base_domain}`
/// 3. IP literal → the default code
/// 4. anything else with a dot → its first label
/// 5. otherwise → the default code
#[must_use]
pub fn extract_tenant_code(host: &str, base_domain: &str, default_code: &str) -> String {
    let host = normalize_host(host);
    let base = base_domain.to_ascii_lowercase();

    if host.is_empty() || host == base || host == format!("www.{base}") {
        return default_code.to_string();
    }

    if let Some(label) = host.strip_suffix(&format!(".{base}")) {
        if !label.is_empty() {
            return label.to_string();
        }
    }

    if host.parse::<IpAddr>().is_ok() {
        return default_code.to_string();
    }

    match host.split_once('.') {
        Some((first, _)) if !first.is_empty() => first.to_string(),
        _ => default_code.to_string(),
    }
}

/// Lowercase the host and strip any port suffix, including the bracketed
/// IPv6 form (`[::1]:8080`).
fn normalize_host(host: &str) -> String {
    let host = host.trim().to_ascii_lowercase();
    if let Some(rest) = host.strip_prefix('[') {
        if let Some((inner, _)) = rest.split_once(']') {
            return inner.to_string();
        }
    }
    // A single colon separates host and port; more than one means a bare
    // IPv6 literal, which has no port to strip.
    if host.matches(':').count() == 1 {
        if let Some((name, _)) = host.split_once(':') {
            return name.to_string();
        }
    }
    host
}

struct CachedTenant {
    record: TenantRecord,
    fetched_at: Instant,
}

/// Resolves hosts to tenants with a TTL cache over the directory.
pub struct TenantResolver {
    directory: Arc<dyn TenantDirectory>,
    cache: DashMap<String, CachedTenant>,
    config: TenantConfig,
}

impl TenantResolver {
    #[must_use]
    pub fn new(directory: Arc<dyn TenantDirectory>, config: TenantConfig) -> Self {
        Self {
            directory,
            cache: DashMap::new(),
            config,
        }
    }

    /// Resolve an inbound host to an active tenant.
    ///
    /// # Errors
    ///
    /// - [`AppError::TenantNotFound`] when the code matches no tenant
    /// - [`AppError::TenantDisabled`] when the tenant is not active
    /// - [`AppError::TenantExpired`] when the tenant's expiry has passed
    /// - [`AppError::Internal`] when the directory itself fails
    pub async fn resolve_host(&self, host: &str) -> Result<TenantIdentity, AppError> {
        let code = extract_tenant_code(host, &self.config.base_domain, &self.config.default_code);

        let Some(record) = self.lookup(&code).await? else {
            warn!(host, code, "unknown tenant code");
            return Err(AppError::TenantNotFound { code });
        };

        if record.status != TenantStatus::Active {
            warn!(code, status = ?record.status, "tenant is not active");
            return Err(AppError::TenantDisabled { code });
        }
        if record.is_expired(epoch_ms_now()) {
            warn!(code, expire_at_ms = record.expire_at_ms, "tenant has expired");
            return Err(AppError::TenantExpired { code });
        }

        debug!(host, code, tenant_id = record.id, "resolved tenant");
        Ok(TenantIdentity {
            id: record.id,
            code: record.code,
        })
    }

    /// Cached directory lookup. Status and expiry are intentionally checked
    /// on every request even for cached entries, so a disabling takes effect
    /// within one cache TTL at worst and an expiry immediately.
    async fn lookup(&self, code: &str) -> Result<Option<TenantRecord>, AppError> {
        if let Some(entry) = self.cache.get(code) {
            if entry.fetched_at.elapsed() < self.config.cache_ttl {
                return Ok(Some(entry.record.clone()));
            }
        }

        let found = self.directory.find_by_code(code).await?;
        match found {
            Some(record) => {
                self.cache.insert(
                    code.to_string(),
                    CachedTenant {
                        record: record.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                Ok(Some(record))
            }
            None => {
                // Negative results are not cached: a freshly provisioned
                // tenant should be reachable without waiting out a TTL.
                self.cache.remove(code);
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::super::directory::InMemoryTenantDirectory;
    use super::*;

    #[test]
    fn subdomain_resolves_to_its_label() {
        assert_eq!(extract_tenant_code("acme.example.com", "example.com", "main"), "acme");
    }

    #[test]
    fn apex_and_www_resolve_to_default() {
        assert_eq!(extract_tenant_code("example.com", "example.com", "main"), "main");
        assert_eq!(extract_tenant_code("www.example.com", "example.com", "main"), "main");
    }

    #[test]
    fn ip_literals_resolve_to_default() {
        assert_eq!(extract_tenant_code("203.0.113.5", "example.com", "main"), "main");
        assert_eq!(extract_tenant_code("[::1]:8080", "example.com", "main"), "main");
    }

    #[test]
    fn unrelated_domain_resolves_to_first_label() {
        assert_eq!(extract_tenant_code("acme.other.org", "example.com", "main"), "acme");
    }

    #[test]
    fn bare_names_and_empty_hosts_resolve_to_default() {
        assert_eq!(extract_tenant_code("localhost", "example.com", "main"), "main");
        assert_eq!(extract_tenant_code("", "example.com", "main"), "main");
    }

    #[test]
    fn ports_and_case_are_normalized() {
        assert_eq!(
            extract_tenant_code("ACME.Example.Com:8443", "example.com", "main"),
            "acme"
        );
    }

    #[test]
    fn nested_subdomains_keep_the_full_prefix() {
        assert_eq!(
            extract_tenant_code("staging.acme.example.com", "example.com", "main"),
            "staging.acme"
        );
    }

    fn test_config() -> TenantConfig {
        TenantConfig {
            base_domain: "example.com".to_string(),
            default_code: "main".to_string(),
            cache_ttl: Duration::from_secs(600),
        }
    }

    fn active_tenant(id: i64, code: &str) -> TenantRecord {
        TenantRecord {
            id,
            code: code.to_string(),
            name: code.to_uppercase(),
            status: TenantStatus::Active,
            expire_at_ms: None,
        }
    }

    #[tokio::test]
    async fn resolves_active_tenant_from_host() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        directory.upsert(active_tenant(7, "acme"));
        let resolver = TenantResolver::new(directory, test_config());

        let identity = resolver.resolve_host("acme.example.com").await.unwrap();
        assert_eq!(identity.id, 7);
        assert_eq!(identity.code, "acme");
    }

    #[tokio::test]
    async fn unknown_tenant_is_not_found() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let resolver = TenantResolver::new(directory, test_config());

        let err = resolver.resolve_host("ghost.example.com").await.unwrap_err();
        assert!(matches!(err, AppError::TenantNotFound { code } if code == "ghost"));
    }

    #[tokio::test]
    async fn disabled_tenant_is_forbidden() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let mut tenant = active_tenant(1, "frozen");
        tenant.status = TenantStatus::Disabled;
        directory.upsert(tenant);
        let resolver = TenantResolver::new(directory, test_config());

        let err = resolver.resolve_host("frozen.example.com").await.unwrap_err();
        assert!(matches!(err, AppError::TenantDisabled { .. }));
    }

    #[tokio::test]
    async fn expired_tenant_is_forbidden() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        let mut tenant = active_tenant(1, "lapsed");
        tenant.expire_at_ms = Some(1);
        directory.upsert(tenant);
        let resolver = TenantResolver::new(directory, test_config());

        let err = resolver.resolve_host("lapsed.example.com").await.unwrap_err();
        assert!(matches!(err, AppError::TenantExpired { .. }));
    }

    /// Directory that counts lookups, for cache behavior assertions.
    struct CountingDirectory {
        inner: InMemoryTenantDirectory,
        lookups: AtomicU32,
    }

    #[async_trait]
    impl TenantDirectory for CountingDirectory {
        async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<TenantRecord>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_by_code(code).await
        }
    }

    #[tokio::test]
    async fn repeated_resolution_hits_the_cache() {
        let inner = InMemoryTenantDirectory::new();
        inner.upsert(active_tenant(2, "acme"));
        let directory = Arc::new(CountingDirectory {
            inner,
            lookups: AtomicU32::new(0),
        });
        let resolver = TenantResolver::new(directory.clone(), test_config());

        for _ in 0..5 {
            resolver.resolve_host("acme.example.com").await.unwrap();
        }
        assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn status_is_rechecked_even_when_cached() {
        let directory = Arc::new(InMemoryTenantDirectory::new());
        directory.upsert(active_tenant(3, "acme"));
        let resolver = TenantResolver::new(directory.clone(), test_config());

        resolver.resolve_host("acme.example.com").await.unwrap();

        // Expire the tenant in place; the cached record is stale but expiry
        // uses the wall clock, so the next request is rejected once the cache
        // refreshes or the record itself carries the expiry. Simulate the
        // cache refresh by expiring the cached copy directly.
        let mut expired = active_tenant(3, "acme");
        expired.expire_at_ms = Some(1);
        directory.upsert(expired.clone());
        resolver.cache.insert(
            "acme".to_string(),
            CachedTenant {
                record: expired,
                fetched_at: Instant::now(),
            },
        );

        let err = resolver.resolve_host("acme.example.com").await.unwrap_err();
        assert!(matches!(err, AppError::TenantExpired { .. }));
    }
}
