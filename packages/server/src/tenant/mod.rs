//! Tenant identification, lookup, and row-level isolation.

pub mod directory;
pub mod guard;
pub mod middleware;
pub mod resolver;

pub use directory::{InMemoryTenantDirectory, TenantDirectory, TenantRecord};
pub use guard::{decide, with_global_scope, ScopeDecision};
pub use resolver::{extract_tenant_code, TenantResolver};
