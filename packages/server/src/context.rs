//! Request-scoped ambient state with an explicit propagation contract.
//!
//! Tenant identity, the authenticated principal, and request environment
//! metadata are task-confined: they live in tokio task-locals established by
//! [`bind_request`] around each request's handler chain. The scope guarantees
//! cleanup on every exit path (normal return, error, panic unwind), so a
//! pooled worker can never observe a previous request's state.
//!
//! The only way state crosses a task boundary is [`ContextSnapshot`]: an
//! immutable by-value copy taken on the submitting task and re-established
//! (and torn down) around the receiving task's future.

use std::cell::RefCell;

use quill_core::{Principal, TenantId};

/// Tenant identity bound to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantIdentity {
    pub id: TenantId,
    pub code: String,
}

/// Request environment captured at the edge, before it becomes unavailable
/// to asynchronous logging work.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub ip: String,
    pub browser: String,
    pub os: String,
    pub device: String,
}

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantIdentity>>;
    static CURRENT_PRINCIPAL: RefCell<Option<Principal>>;
    static CURRENT_META: RefCell<Option<RequestMeta>>;
}

/// Run `fut` with fresh, mutable context cells holding the given initial
/// values. When the returned future completes (or is dropped), all three
/// cells vanish with the scope; no explicit cleanup can be forgotten.
pub async fn bind_request<F>(
    tenant: Option<TenantIdentity>,
    meta: Option<RequestMeta>,
    fut: F,
) -> F::Output
where
    F: std::future::Future,
{
    CURRENT_TENANT
        .scope(
            RefCell::new(tenant),
            CURRENT_PRINCIPAL.scope(
                RefCell::new(None),
                CURRENT_META.scope(RefCell::new(meta), fut),
            ),
        )
        .await
}

/// Accessors for the current tenant, mirroring the strict set/get/clear
/// contract: readable only inside the scope that set it.
pub struct TenantContext;

impl TenantContext {
    /// Bind the current tenant. A no-op outside a request scope.
    pub fn set(identity: TenantIdentity) {
        let _ = CURRENT_TENANT.try_with(|cell| *cell.borrow_mut() = Some(identity));
    }

    #[must_use]
    pub fn current() -> Option<TenantIdentity> {
        CURRENT_TENANT
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    #[must_use]
    pub fn current_id() -> Option<TenantId> {
        Self::current().map(|identity| identity.id)
    }

    #[must_use]
    pub fn current_code() -> Option<String> {
        Self::current().map(|identity| identity.code)
    }

    /// Explicitly clear the tenant within the current scope. Scope teardown
    /// makes this redundant on normal exits; it exists for paths that must
    /// drop the tenant early.
    pub fn clear() {
        let _ = CURRENT_TENANT.try_with(|cell| *cell.borrow_mut() = None);
    }
}

/// Accessors for the authenticated principal of the current request.
pub struct PrincipalContext;

impl PrincipalContext {
    pub fn set(principal: Principal) {
        let _ = CURRENT_PRINCIPAL.try_with(|cell| *cell.borrow_mut() = Some(principal));
    }

    #[must_use]
    pub fn current() -> Option<Principal> {
        CURRENT_PRINCIPAL
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn clear() {
        let _ = CURRENT_PRINCIPAL.try_with(|cell| *cell.borrow_mut() = None);
    }
}

/// Accessor for the request environment metadata.
pub struct RequestMetaContext;

impl RequestMetaContext {
    #[must_use]
    pub fn current() -> Option<RequestMeta> {
        CURRENT_META
            .try_with(|cell| cell.borrow().clone())
            .ok()
            .flatten()
    }
}

/// Immutable by-value copy of the ambient context, for crossing a task
/// boundary. Never a live reference into the mutable cells.
#[derive(Debug, Clone)]
pub struct ContextSnapshot {
    pub tenant: Option<TenantIdentity>,
    pub principal: Option<Principal>,
    pub meta: Option<RequestMeta>,
}

impl ContextSnapshot {
    /// Capture the submitting task's context. Outside any request scope all
    /// fields are `None`.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            tenant: TenantContext::current(),
            principal: PrincipalContext::current(),
            meta: RequestMetaContext::current(),
        }
    }

    /// Run `fut` with this snapshot installed as the ambient context. The
    /// receiving task's context is cleared when the scope ends, success or
    /// not, before its worker can pick up unrelated work.
    pub async fn restore<F>(self, fut: F) -> F::Output
    where
        F: std::future::Future,
    {
        let principal = self.principal;
        CURRENT_TENANT
            .scope(
                RefCell::new(self.tenant),
                CURRENT_PRINCIPAL.scope(
                    RefCell::new(principal),
                    CURRENT_META.scope(RefCell::new(self.meta), fut),
                ),
            )
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
