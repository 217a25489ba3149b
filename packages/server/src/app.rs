//! Application assembly and server lifecycle.
//!
//! Builds the axum router, the shared state behind it, and the Tower
//! middleware pipeline. Middleware ordering follows the outer-to-inner
//! convention: transport layers first, then tenant resolution, then
//! authentication, so every handler runs inside a fully-established request
//! context.
//!
//! The server follows the deferred startup pattern: `new()` creates
//! resources, `start()` binds the TCP listener, `serve()` accepts
//! connections until shutdown and then drains the audit pipeline.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::HeaderName;
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use quill_core::RateLimiter;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::audit::spec as audit_spec;
use crate::audit::{AuditPipeline, AuditRecord, AuditSink, CapturedArgs, MemoryAuditSink};
use crate::auth::{authenticate, PrincipalSource, TokenDecoder};
use crate::config::ServerConfig;
use crate::context::PrincipalContext;
use crate::error::AppError;
use crate::ratelimit;
use crate::tenant::middleware::resolve_tenant;
use crate::tenant::{TenantDirectory, TenantResolver};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub resolver: Arc<TenantResolver>,
    pub limiter: Arc<RateLimiter>,
    pub auditor: Arc<AuditPipeline>,
    pub principals: Arc<dyn PrincipalSource>,
    pub decoder: Arc<TokenDecoder>,
    /// Queryable store behind the security-log endpoint. Also the pipeline's
    /// sink in the default assembly.
    pub audit_log: Arc<MemoryAuditSink>,
}

impl AppState {
    /// Assemble the full state graph from configuration and the external
    /// collaborators.
    #[must_use]
    pub fn new(
        config: ServerConfig,
        directory: Arc<dyn TenantDirectory>,
        principals: Arc<dyn PrincipalSource>,
        jwt_secret: &[u8],
    ) -> Self {
        let audit_log = Arc::new(MemoryAuditSink::new());
        let sink: Arc<dyn AuditSink> = audit_log.clone();
        let auditor = Arc::new(AuditPipeline::start(sink, &config.audit));
        Self {
            resolver: Arc::new(TenantResolver::new(directory, config.tenant.clone())),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            auditor,
            principals,
            decoder: Arc::new(TokenDecoder::new(jwt_secret)),
            audit_log,
            config: Arc::new(config),
        }
    }

    #[cfg(test)]
    pub(crate) fn for_tests(
        config: ServerConfig,
        principals: Arc<dyn PrincipalSource>,
        decoder: Arc<TokenDecoder>,
    ) -> Self {
        use crate::tenant::InMemoryTenantDirectory;

        let audit_log = Arc::new(MemoryAuditSink::new());
        let sink: Arc<dyn AuditSink> = audit_log.clone();
        Self {
            resolver: Arc::new(TenantResolver::new(
                Arc::new(InMemoryTenantDirectory::new()),
                config.tenant.clone(),
            )),
            limiter: Arc::new(RateLimiter::new(config.rate_limit.clone())),
            auditor: Arc::new(AuditPipeline::start(sink, &config.audit)),
            principals,
            decoder,
            audit_log,
            config: Arc::new(config),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn health_handler() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    #[allow(dead_code)]
    password: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    username: String,
    role: String,
}

/// Login endpoint: rate-limited per client IP, audited with the submitted
/// password masked by the capture pipeline. Credential verification is
/// delegated to the account store; this handler only checks existence and
/// enablement.
async fn login_handler(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    ratelimit::enforce(&state.limiter, &ratelimit::LOGIN)?;

    let args = CapturedArgs::new()
        .field("username", &body.username)
        .field("password", &body.password);

    let response = state
        .auditor
        .observe(&audit_spec::LOGIN, args, async {
            let record = state
                .principals
                .find_by_username(&body.username)
                .await
                .map_err(AppError::Internal)?;
            match record {
                Some(record) if record.enabled => Ok(LoginResponse {
                    username: record.principal.username,
                    role: record.principal.role.as_str().to_string(),
                }),
                _ => Err(AppError::Unauthorized),
            }
        })
        .await?;

    Ok(Json(response))
}

/// Security-log listing. Visibility follows the isolation guard: tenant
/// callers see their own tenant's events, the super admin sees everything.
async fn security_logs_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<AuditRecord>>, AppError> {
    if PrincipalContext::current().is_none() {
        return Err(AppError::Unauthorized);
    }
    Ok(Json(state.audit_log.list()))
}

// ---------------------------------------------------------------------------
// Router and middleware stack
// ---------------------------------------------------------------------------

/// The composed Tower layer type produced by [`build_http_layers`], from
/// outermost (first applied) to innermost.
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                TraceLayer<
                    tower_http::classify::SharedClassifier<
                        tower_http::classify::ServerErrorsAsFailures,
                    >,
                >,
                tower::layer::util::Stack<
                    SetRequestIdLayer<MakeRequestUuid>,
                    tower::layer::util::Identity,
                >,
            >,
        >,
    >,
>;

/// Transport-level middleware: request id, tracing, CORS, timeout. Tenant
/// and auth middleware sit inside this stack, per-route state in hand.
#[must_use]
pub fn build_http_layers(config: &ServerConfig) -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            x_request_id.clone(),
            MakeRequestUuid,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(&config.cors_origins))
        .layer(TimeoutLayer::new(config.request_timeout))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}

/// A wildcard `"*"` in the origins list allows any origin; otherwise each
/// origin is parsed into an explicit allowlist.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Assemble the router. Layer order (outermost first): transport stack,
/// tenant resolution, authentication, handlers.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let layers = build_http_layers(&state.config);

    Router::new()
        .route("/health", get(health_handler))
        .route("/auth/login", post(login_handler))
        .route("/admin/security-logs", get(security_logs_handler))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(state.clone(), resolve_tenant))
        .layer(layers)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Server lifecycle
// ---------------------------------------------------------------------------

/// Owns the listener and shared state across the deferred startup phases.
pub struct ServerModule {
    state: AppState,
    listener: Option<TcpListener>,
}

impl ServerModule {
    /// Create the module without binding any port.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            listener: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Bind the TCP listener. Returns the actual bound port, which differs
    /// from the configured one when port 0 is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.state.config.host, port, "listener bound");
        self.listener = Some(listener);
        Ok(port)
    }

    /// Serve until `shutdown` resolves, then drain the audit pipeline so
    /// accepted records are persisted before exit.
    ///
    /// # Errors
    ///
    /// Returns an error when `start()` was not called first or the server
    /// hits a fatal I/O error.
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("serve() called before start()"))?;
        let router = build_router(self.state.clone());

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("server stopped, draining audit pipeline");
        self.state.auditor.shutdown().await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
