//! Server binary: configuration flags, logging, and lifecycle wiring.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use quill_core::TenantStatus;
use tracing::info;
use tracing_subscriber::EnvFilter;

use quill_server::app::{AppState, ServerModule};
use quill_server::auth::InMemoryPrincipalSource;
use quill_server::config::{ServerConfig, TenantConfig};
use quill_server::tenant::{InMemoryTenantDirectory, TenantRecord};

#[derive(Debug, Parser)]
#[command(name = "quill-server", about = "Multi-tenant content platform core")]
struct Args {
    /// Bind address.
    #[arg(long, env = "QUILL_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on. 0 means OS-assigned.
    #[arg(long, env = "QUILL_PORT", default_value_t = 8080)]
    port: u16,

    /// Apex domain tenants hang off of.
    #[arg(long, env = "QUILL_BASE_DOMAIN", default_value = "localhost")]
    base_domain: String,

    /// Tenant code for the apex domain and IP-literal hosts.
    #[arg(long, env = "QUILL_DEFAULT_TENANT", default_value = "main")]
    default_code: String,

    /// HMAC secret for bearer-token validation.
    #[arg(long, env = "QUILL_JWT_SECRET")]
    jwt_secret: String,

    /// Request timeout in seconds.
    #[arg(long, env = "QUILL_REQUEST_TIMEOUT", default_value_t = 30)]
    request_timeout_secs: u64,

    /// Emit logs as JSON instead of human-readable lines.
    #[arg(long, env = "QUILL_LOG_JSON", default_value_t = false)]
    log_json: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    let config = ServerConfig {
        host: args.host,
        port: args.port,
        request_timeout: Duration::from_secs(args.request_timeout_secs),
        tenant: TenantConfig {
            base_domain: args.base_domain,
            default_code: args.default_code.clone(),
            ..TenantConfig::default()
        },
        ..ServerConfig::default()
    };

    // Until an external directory is wired in, the in-memory directory holds
    // just the default tenant so the apex domain resolves.
    let directory = Arc::new(InMemoryTenantDirectory::new());
    directory.upsert(TenantRecord {
        id: 1,
        code: args.default_code.clone(),
        name: args.default_code,
        status: TenantStatus::Active,
        expire_at_ms: None,
    });
    let principals = Arc::new(InMemoryPrincipalSource::new());

    let state = AppState::new(config, directory, principals, args.jwt_secret.as_bytes());
    let mut server = ServerModule::new(state);
    let port = server.start().await?;
    info!(port, "quill server ready");

    server
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
}
