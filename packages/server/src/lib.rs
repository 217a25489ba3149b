//! Quill server: the multi-tenant core of the content platform.
//!
//! Every request is bound to a tenant resolved from its Host header; the
//! tenant, the authenticated principal, and the request environment live in
//! task-scoped context that is guaranteed to vanish with the request. Data
//! access consults the isolation guard, security-relevant operations flow
//! through the asynchronous audit pipeline, and abuse-prone endpoints are
//! rate limited by keyed token buckets.

pub mod app;
pub mod audit;
pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod ratelimit;
pub mod tenant;
pub mod worker;

pub use app::{build_router, AppState, ServerModule};
pub use config::ServerConfig;
pub use error::AppError;
