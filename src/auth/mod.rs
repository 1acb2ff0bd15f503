//! Authentication and role-based access control.
//!
//! # Data Flow
//! ```text
//! Authorization: Bearer <token>
//!     → gate.rs (verify against the identity provider, attach Principal)
//!     → rbac.rs (static role → capability table, wildcard as a variant)
//!     → handler sees the resolved Principal in request extensions
//! ```
//!
//! # Design Decisions
//! - Roles form a closed enum; the wildcard is an explicit `Access::Any`
//!   variant, never a magic string
//! - Role names are not secret: a denial discloses required vs actual role
//! - Auth failures feed the failed-auth tracker and the critical event log

pub mod gate;
pub mod rbac;
pub mod session;

pub use gate::{require_auth_middleware, IdentityProvider, Principal, StaticTokenProvider};
pub use rbac::{has_capability, role_allows, Access, Capability, Role, RoutePolicyTable};
pub use session::SessionStore;
