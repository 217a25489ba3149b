//! Authentication refinement.
//!
//! Token issuance, password policy, and session management live elsewhere;
//! this module only decodes bearer tokens, refines the tenant context from
//! their claims, and installs the authenticated principal.

pub mod claims;
pub mod middleware;

pub use claims::{TokenClaims, TokenDecoder, TOKEN_TYPE_ACCESS};
pub use middleware::{authenticate, InMemoryPrincipalSource, PrincipalRecord, PrincipalSource};
