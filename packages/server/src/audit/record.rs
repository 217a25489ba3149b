//! Audit records and persistence sinks.

use async_trait::async_trait;
use parking_lot::Mutex;
use quill_core::{AuditStatus, TenantId};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::tenant::guard;

/// One persisted security event. Fields mirror the security-log table; the
/// action and status travel as stable strings so the catalog can grow without
/// data migration.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub tenant_id: TenantId,
    pub user_id: Option<i64>,
    pub username: String,
    pub action: &'static str,
    pub status: AuditStatus,
    pub ip: String,
    /// Geographic region resolved from the client IP. No resolver is wired
    /// in yet, so this stays `None` until one is.
    pub location: Option<String>,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub message: String,
    /// Sanitized captured arguments, when the spec asks for them.
    pub params: Option<Value>,
    /// Sanitized operation result, when the spec asks for it.
    pub result: Option<Value>,
    pub execution_time_ms: u64,
    pub create_time_ms: u64,
}

/// Persistence seam for audit records. The store behind it (database, log
/// shipper) is out of scope; faults must be contained by the caller.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn persist(&self, record: AuditRecord) -> anyhow::Result<()>;
}

/// In-memory sink, used in tests and as the default store for a single
/// process.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records visible to the current caller, filtered by the isolation
    /// guard: tenant-scoped callers see their own tenant's events, global
    /// scopes and the super admin see everything.
    #[must_use]
    pub fn list(&self) -> Vec<AuditRecord> {
        let decision = guard::decide();
        self.records
            .lock()
            .iter()
            .filter(|record| decision.permits(record.tenant_id))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn persist(&self, record: AuditRecord) -> anyhow::Result<()> {
        self.records.lock().push(record);
        Ok(())
    }
}

/// Sink that emits each record as a structured log event instead of storing
/// it.
#[derive(Default)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn persist(&self, record: AuditRecord) -> anyhow::Result<()> {
        info!(
            target: "audit",
            tenant_id = record.tenant_id,
            user = %record.username,
            action = record.action,
            status = record.status.as_str(),
            ip = %record.ip,
            elapsed_ms = record.execution_time_ms,
            message = %record.message,
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::context::{bind_request, TenantIdentity};
    use crate::tenant::with_global_scope;

    use super::*;

    fn record(tenant_id: TenantId, username: &str) -> AuditRecord {
        AuditRecord {
            tenant_id,
            user_id: Some(1),
            username: username.to_string(),
            action: "AUTH_LOGIN",
            status: AuditStatus::Success,
            ip: "203.0.113.5".to_string(),
            location: None,
            device: "Desktop".to_string(),
            browser: "Firefox".to_string(),
            os: "Linux".to_string(),
            message: "user logged in".to_string(),
            params: None,
            result: None,
            execution_time_ms: 12,
            create_time_ms: 0,
        }
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_callers_tenant() {
        let sink = MemoryAuditSink::new();
        sink.persist(record(1, "alice")).await.unwrap();
        sink.persist(record(2, "bob")).await.unwrap();

        let scoped = bind_request(
            Some(TenantIdentity {
                id: 1,
                code: "acme".to_string(),
            }),
            None,
            async { sink.list() },
        )
        .await;
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].username, "alice");
    }

    #[tokio::test]
    async fn global_scope_lists_every_tenant() {
        let sink = MemoryAuditSink::new();
        sink.persist(record(1, "alice")).await.unwrap();
        sink.persist(record(2, "bob")).await.unwrap();

        let all = bind_request(
            Some(TenantIdentity {
                id: 1,
                code: "acme".to_string(),
            }),
            None,
            with_global_scope(async { sink.list() }),
        )
        .await;
        assert_eq!(all.len(), 2);
    }
}
