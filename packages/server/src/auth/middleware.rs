//! Bearer-token authentication middleware.
//!
//! Runs inside the tenant-resolution scope. On a valid access token it
//! refines the tenant context from the token's claims *before* loading the
//! principal (so the lookup is scoped to the right tenant), then re-applies
//! the tenant from the loaded principal's own fields, which are the
//! authoritative source for stale or forged claims. Any failure leaves
//! the request unauthenticated rather than rejecting it; authorization is a
//! downstream concern.

use async_trait::async_trait;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use dashmap::DashMap;
use quill_core::Principal;
use tracing::debug;

use crate::app::AppState;
use crate::context::{PrincipalContext, TenantContext, TenantIdentity};

use super::claims::TOKEN_TYPE_ACCESS;

const BEARER_PREFIX: &str = "Bearer ";

/// A principal as the account store knows it.
#[derive(Debug, Clone)]
pub struct PrincipalRecord {
    pub principal: Principal,
    pub enabled: bool,
}

/// Account lookup seam; the user store behind it is out of scope.
#[async_trait]
pub trait PrincipalSource: Send + Sync {
    /// Find an account by username, scoped by the current tenant context the
    /// way any other repository call is.
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<PrincipalRecord>>;
}

/// In-memory account store keyed by username.
#[derive(Default)]
pub struct InMemoryPrincipalSource {
    accounts: DashMap<String, PrincipalRecord>,
}

impl InMemoryPrincipalSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&self, record: PrincipalRecord) {
        self.accounts
            .insert(record.principal.username.clone(), record);
    }
}

#[async_trait]
impl PrincipalSource for InMemoryPrincipalSource {
    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<PrincipalRecord>> {
        Ok(self.accounts.get(username).map(|entry| entry.value().clone()))
    }
}

/// Authenticate the request from its bearer token, if any.
pub async fn authenticate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(token) = bearer_token(&request) {
        refine_from_token(&state, &token).await;
    }
    next.run(request).await
}

fn bearer_token(request: &Request) -> Option<String> {
    request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(ToString::to_string)
}

/// Decode the token and install tenant + principal context. Every early
/// return leaves the request unauthenticated, with the resolver-provided
/// tenant context untouched beyond the claim refinement.
async fn refine_from_token(state: &AppState, token: &str) {
    let Ok(claims) = state.decoder.decode(token) else {
        debug!("bearer token failed validation");
        return;
    };
    if claims.typ != TOKEN_TYPE_ACCESS {
        debug!(typ = %claims.typ, "non-access token rejected for authentication");
        return;
    }

    // Claim-side tenant first, so the account lookup below runs under the
    // token's tenant rather than whatever the host resolved to.
    if let (Some(tid), Some(tcode)) = (claims.tid, claims.tcode.clone()) {
        TenantContext::set(TenantIdentity {
            id: tid,
            code: tcode,
        });
    }

    let record = match state.principals.find_by_username(&claims.sub).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(username = %claims.sub, "token subject has no account");
            return;
        }
        Err(err) => {
            debug!(error = %err, "principal lookup failed");
            return;
        }
    };
    if !record.enabled {
        debug!(username = %claims.sub, "disabled account not authenticated");
        return;
    }

    // Authoritative tenant comes from the stored principal, not the token.
    TenantContext::set(TenantIdentity {
        id: record.principal.tenant_id,
        code: record.principal.tenant_code.clone(),
    });
    PrincipalContext::set(record.principal);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use jsonwebtoken::{encode, EncodingKey, Header};
    use quill_core::Role;

    use crate::app::AppState;
    use crate::auth::claims::{TokenClaims, TokenDecoder};
    use crate::config::ServerConfig;
    use crate::context::bind_request;

    use super::*;

    const SECRET: &[u8] = b"test-secret";

    fn mint(claims: &TokenClaims) -> String {
        encode(&Header::default(), claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    fn access_claims(username: &str, tid: i64, tcode: &str) -> TokenClaims {
        TokenClaims {
            sub: username.to_string(),
            uid: 11,
            role: "EDITOR".to_string(),
            tid: Some(tid),
            tcode: Some(tcode.to_string()),
            typ: TOKEN_TYPE_ACCESS.to_string(),
            exp: 4_102_444_800,
        }
    }

    fn account(username: &str, tenant_id: i64, tenant_code: &str, enabled: bool) -> PrincipalRecord {
        PrincipalRecord {
            principal: Principal {
                user_id: 11,
                username: username.to_string(),
                role: Role::Editor,
                tenant_id,
                tenant_code: tenant_code.to_string(),
            },
            enabled,
        }
    }

    fn state_with(accounts: &[PrincipalRecord]) -> AppState {
        let principals = InMemoryPrincipalSource::new();
        for record in accounts {
            principals.upsert(record.clone());
        }
        AppState::for_tests(
            ServerConfig::default(),
            Arc::new(principals),
            Arc::new(TokenDecoder::new(SECRET)),
        )
    }

    #[tokio::test]
    async fn valid_token_installs_principal_and_authoritative_tenant() {
        let state = state_with(&[account("alice", 7, "acme", true)]);
        // Token claims a stale tenant; the stored principal wins.
        let token = mint(&access_claims("alice", 99, "stale"));

        bind_request(None, None, async {
            refine_from_token(&state, &token).await;
            assert_eq!(PrincipalContext::current().unwrap().username, "alice");
            assert_eq!(TenantContext::current_id(), Some(7));
            assert_eq!(TenantContext::current_code().as_deref(), Some("acme"));
        })
        .await;
    }

    #[tokio::test]
    async fn disabled_account_is_not_authenticated() {
        let state = state_with(&[account("bob", 7, "acme", false)]);
        let token = mint(&access_claims("bob", 7, "acme"));

        bind_request(None, None, async {
            refine_from_token(&state, &token).await;
            assert_eq!(PrincipalContext::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn refresh_token_is_rejected_for_authentication() {
        let state = state_with(&[account("alice", 7, "acme", true)]);
        let mut claims = access_claims("alice", 7, "acme");
        claims.typ = "refresh".to_string();
        let token = mint(&claims);

        bind_request(None, None, async {
            refine_from_token(&state, &token).await;
            assert_eq!(PrincipalContext::current(), None);
            assert_eq!(TenantContext::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn garbage_token_leaves_request_unauthenticated() {
        let state = state_with(&[]);
        bind_request(None, None, async {
            refine_from_token(&state, "not-a-token").await;
            assert_eq!(PrincipalContext::current(), None);
        })
        .await;
    }

    #[tokio::test]
    async fn unknown_subject_leaves_claim_tenant_but_no_principal() {
        let state = state_with(&[]);
        let token = mint(&access_claims("ghost", 3, "gamma"));

        bind_request(None, None, async {
            refine_from_token(&state, &token).await;
            // Claim refinement happened (needed for the lookup), but no
            // principal was installed.
            assert_eq!(TenantContext::current_id(), Some(3));
            assert_eq!(PrincipalContext::current(), None);
        })
        .await;
    }

    #[test]
    fn bearer_extraction() {
        let request = Request::builder()
            .header(AUTHORIZATION, "Bearer abc.def.ghi")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request).as_deref(), Some("abc.def.ghi"));

        let request = Request::builder()
            .header(AUTHORIZATION, "Basic dXNlcjpwYXNz")
            .body(axum::body::Body::empty())
            .unwrap();
        assert_eq!(bearer_token(&request), None);
    }
}
