//! Tenant directory seam.
//!
//! The resolver consumes tenants through [`TenantDirectory`]; the backing
//! store (database, config file) is someone else's concern. The in-memory
//! implementation backs tests and single-node deployments.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use dashmap::DashMap;
use quill_core::{TenantId, TenantStatus};

/// One tenant as the directory knows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRecord {
    pub id: TenantId,
    pub code: String,
    pub name: String,
    pub status: TenantStatus,
    /// Epoch-millis expiry; `None` means the tenant never expires.
    pub expire_at_ms: Option<u64>,
}

impl TenantRecord {
    /// True when the expiry timestamp is in the past.
    #[must_use]
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expire_at_ms.is_some_and(|at| at < now_ms)
    }
}

/// Current wall-clock epoch millis, used for tenant expiry checks.
#[must_use]
pub fn epoch_ms_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Lookup interface the resolver depends on.
#[async_trait]
pub trait TenantDirectory: Send + Sync {
    /// Find a tenant by its code.
    ///
    /// # Errors
    ///
    /// Returns an error when the backing store cannot be reached; the
    /// resolver surfaces that as an internal error, not as "tenant unknown".
    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<TenantRecord>>;
}

/// In-memory directory keyed by tenant code.
#[derive(Default)]
pub struct InMemoryTenantDirectory {
    tenants: DashMap<String, TenantRecord>,
}

impl InMemoryTenantDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a tenant.
    pub fn upsert(&self, record: TenantRecord) {
        self.tenants.insert(record.code.clone(), record);
    }

    pub fn remove(&self, code: &str) {
        self.tenants.remove(code);
    }
}

#[async_trait]
impl TenantDirectory for InMemoryTenantDirectory {
    async fn find_by_code(&self, code: &str) -> anyhow::Result<Option<TenantRecord>> {
        Ok(self.tenants.get(code).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(code: &str) -> TenantRecord {
        TenantRecord {
            id: 1,
            code: code.to_string(),
            name: code.to_uppercase(),
            status: TenantStatus::Active,
            expire_at_ms: None,
        }
    }

    #[tokio::test]
    async fn upsert_and_find() {
        let directory = InMemoryTenantDirectory::new();
        directory.upsert(record("acme"));

        let found = directory.find_by_code("acme").await.unwrap();
        assert_eq!(found.map(|t| t.code), Some("acme".to_string()));
        assert!(directory.find_by_code("ghost").await.unwrap().is_none());
    }

    #[test]
    fn expiry_check() {
        let mut tenant = record("acme");
        assert!(!tenant.is_expired(1_000));

        tenant.expire_at_ms = Some(500);
        assert!(tenant.is_expired(1_000));
        assert!(!tenant.is_expired(400));
    }
}
