//! Row-level isolation guard.
//!
//! Every repository-style call asks [`decide`] whether to apply the tenant
//! predicate (`tenant_id = X`). The decision is evaluated fresh per call,
//! never cached, because role and context legitimately differ between calls
//! on the same task.
//!
//! Global operations (platform-wide admin work) run inside
//! [`with_global_scope`], a nestable task-confined region that disables the
//! predicate for its duration and restores the previous state on exit.

use quill_core::{Role, TenantId};
use tracing::debug;

use crate::context::{PrincipalContext, TenantContext};

tokio::task_local! {
    static GLOBAL_OPERATION: bool;
}

/// Whether the predicate is applied for one data-access call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeDecision {
    /// No tenant predicate; the call sees cross-tenant data.
    Disabled,
    /// Reads are filtered to `tenant_id = X`.
    Enabled(TenantId),
}

impl ScopeDecision {
    /// True when `tenant_id` passes this decision's filter.
    #[must_use]
    pub fn permits(self, tenant_id: TenantId) -> bool {
        match self {
            ScopeDecision::Disabled => true,
            ScopeDecision::Enabled(scoped) => scoped == tenant_id,
        }
    }
}

/// Run `fut` as a global operation, bypassing tenant filtering for its
/// duration. Nestable: an inner region ending does not end the outer one,
/// because each region is its own scope with automatic restore.
pub async fn with_global_scope<F>(fut: F) -> F::Output
where
    F: std::future::Future,
{
    GLOBAL_OPERATION.scope(true, fut).await
}

/// True inside a [`with_global_scope`] region.
#[must_use]
pub fn in_global_scope() -> bool {
    GLOBAL_OPERATION.try_with(|flag| *flag).unwrap_or(false)
}

/// Decide the filter state for the next data-access call.
///
/// Order, first match wins:
/// 1. inside a global-operation region → `Disabled`
/// 2. principal is the super admin → `Disabled`
/// 3. tenant context present → `Enabled(tenant_id)`
/// 4. otherwise → `Disabled` (fail-open; see DESIGN.md)
#[must_use]
pub fn decide() -> ScopeDecision {
    if in_global_scope() {
        return ScopeDecision::Disabled;
    }

    if let Some(principal) = PrincipalContext::current() {
        if principal.role == Role::SuperAdmin {
            return ScopeDecision::Disabled;
        }
    }

    if let Some(tenant_id) = TenantContext::current_id() {
        return ScopeDecision::Enabled(tenant_id);
    }

    debug!("no tenant context and no elevated role; tenant filter disabled");
    ScopeDecision::Disabled
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use quill_core::Principal;

    use crate::context::{bind_request, TenantIdentity};

    use super::*;

    fn principal(role: Role) -> Principal {
        Principal {
            user_id: 1,
            username: "admin".to_string(),
            role,
            tenant_id: 7,
            tenant_code: "acme".to_string(),
        }
    }

    fn tenant(id: TenantId) -> TenantIdentity {
        TenantIdentity {
            id,
            code: "acme".to_string(),
        }
    }

    #[tokio::test]
    async fn super_admin_disables_filtering_regardless_of_tenant() {
        bind_request(Some(tenant(7)), None, async {
            PrincipalContext::set(principal(Role::SuperAdmin));
            assert_eq!(decide(), ScopeDecision::Disabled);
        })
        .await;
    }

    #[tokio::test]
    async fn editor_with_tenant_context_is_scoped_to_that_tenant() {
        bind_request(Some(tenant(7)), None, async {
            PrincipalContext::set(principal(Role::Editor));
            assert_eq!(decide(), ScopeDecision::Enabled(7));
        })
        .await;
    }

    #[tokio::test]
    async fn tenant_context_alone_scopes_unauthenticated_calls() {
        bind_request(Some(tenant(3)), None, async {
            assert_eq!(decide(), ScopeDecision::Enabled(3));
        })
        .await;
    }

    #[tokio::test]
    async fn no_context_falls_open() {
        bind_request(None, None, async {
            assert_eq!(decide(), ScopeDecision::Disabled);
        })
        .await;
    }

    #[tokio::test]
    async fn global_scope_wins_over_tenant_context() {
        bind_request(Some(tenant(7)), None, async {
            PrincipalContext::set(principal(Role::Editor));
            assert_eq!(decide(), ScopeDecision::Enabled(7));

            with_global_scope(async {
                assert_eq!(decide(), ScopeDecision::Disabled);
            })
            .await;

            // Restored after the region ends.
            assert_eq!(decide(), ScopeDecision::Enabled(7));
        })
        .await;
    }

    #[tokio::test]
    async fn global_scope_nests_and_restores_outer_state() {
        bind_request(Some(tenant(7)), None, async {
            with_global_scope(async {
                assert!(in_global_scope());
                with_global_scope(async {
                    assert!(in_global_scope());
                })
                .await;
                // Inner region ending must not end the outer one.
                assert!(in_global_scope());
            })
            .await;
            assert!(!in_global_scope());
        })
        .await;
    }

    #[tokio::test]
    async fn decision_is_fresh_per_call() {
        bind_request(Some(tenant(5)), None, async {
            assert_eq!(decide(), ScopeDecision::Enabled(5));
            TenantContext::set(tenant(6));
            // Same task, next call: new decision from the new context.
            assert_eq!(decide(), ScopeDecision::Enabled(6));
        })
        .await;
    }

    #[test]
    fn permits_filters_by_tenant() {
        assert!(ScopeDecision::Disabled.permits(42));
        assert!(ScopeDecision::Enabled(7).permits(7));
        assert!(!ScopeDecision::Enabled(7).permits(8));
    }
}
