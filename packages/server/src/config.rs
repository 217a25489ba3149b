//! Server configuration types.

use std::time::Duration;

use quill_core::RateLimiterConfig;

/// Top-level configuration for the quill server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the server.
    pub host: String,
    /// Port to listen on. 0 means OS-assigned.
    pub port: u16,
    /// Maximum time to wait for a request to complete.
    pub request_timeout: Duration,
    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,
    /// Tenant resolution settings.
    pub tenant: TenantConfig,
    /// Audit pipeline settings.
    pub audit: AuditConfig,
    /// Keyed token-bucket store settings.
    pub rate_limit: RateLimiterConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 0,
            request_timeout: Duration::from_secs(30),
            cors_origins: vec!["*".to_string()],
            tenant: TenantConfig::default(),
            audit: AuditConfig::default(),
            rate_limit: RateLimiterConfig::default(),
        }
    }
}

/// Tenant resolution configuration.
#[derive(Debug, Clone)]
pub struct TenantConfig {
    /// Apex domain the platform is served under. The apex itself and its
    /// `www.` variant resolve to `default_code`; subdomain labels resolve to
    /// their own tenant.
    pub base_domain: String,
    /// Tenant code used for the apex domain and for IP-literal hosts.
    pub default_code: String,
    /// How long a resolved tenant stays cached before the directory is asked
    /// again.
    pub cache_ttl: Duration,
}

impl Default for TenantConfig {
    fn default() -> Self {
        Self {
            base_domain: "localhost".to_string(),
            default_code: "main".to_string(),
            cache_ttl: Duration::from_secs(10 * 60),
        }
    }
}

/// Audit pipeline configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Bounded queue depth between request tasks and the audit worker. When
    /// saturated the submitting task runs the job itself rather than dropping
    /// it or queueing without bound.
    pub queue_capacity: usize,
    /// Interval for the worker's periodic housekeeping tick.
    pub tick_interval: Duration,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 500,
            tick_interval: Duration::from_secs(60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 0);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.cors_origins, vec!["*"]);
    }

    #[test]
    fn tenant_config_defaults() {
        let config = TenantConfig::default();
        assert_eq!(config.base_domain, "localhost");
        assert_eq!(config.default_code, "main");
        assert_eq!(config.cache_ttl, Duration::from_secs(600));
    }

    #[test]
    fn audit_config_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.queue_capacity, 500);
        assert_eq!(config.tick_interval, Duration::from_secs(60));
    }
}
