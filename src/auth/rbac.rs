//! Static role → capability mapping and route policies.

use std::fmt;
use std::str::FromStr;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::auth::Principal;
use crate::error::Rejection;
use crate::http::server::AppState;
use crate::observability::metrics;

/// Closed set of platform roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    PropertyManager,
    Landlord,
    Tenant,
    Maintenance,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::PropertyManager => "property_manager",
            Role::Landlord => "landlord",
            Role::Tenant => "tenant",
            Role::Maintenance => "maintenance",
        }
    }

    /// Capabilities granted to this role. `Capability::All` is the wildcard.
    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Admin => &[All],
            Role::PropertyManager => &[
                ManageProperties,
                ViewProperties,
                ManageLeases,
                ViewLeases,
                ManageMaintenance,
                ManagePayments,
                ViewReports,
            ],
            Role::Landlord => &[ViewProperties, ViewLeases, ViewReports],
            Role::Tenant => &[ViewProperties, ViewLeases, RequestMaintenance, MakePayments],
            Role::Maintenance => &[ViewProperties, ManageMaintenance],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "property_manager" => Ok(Role::PropertyManager),
            "landlord" => Ok(Role::Landlord),
            "tenant" => Ok(Role::Tenant),
            "maintenance" => Ok(Role::Maintenance),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// Capability tokens a role can hold. `All` grants everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    All,
    ManageProperties,
    ViewProperties,
    ManageLeases,
    ViewLeases,
    ManageMaintenance,
    RequestMaintenance,
    ManagePayments,
    MakePayments,
    ViewReports,
    ExportData,
    ManageSettings,
}

/// One entry in a route's allowed list. The wildcard is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Any authenticated principal.
    Any,
    Role(Role),
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Any => f.write_str("*"),
            Access::Role(role) => f.write_str(role.as_str()),
        }
    }
}

pub fn has_capability(role: Role, capability: Capability) -> bool {
    let caps = role.capabilities();
    caps.contains(&Capability::All) || caps.contains(&capability)
}

/// Whether `role` satisfies an allowed-roles list. A wildcard on either side
/// (the list containing `Access::Any`, or the role holding `Capability::All`)
/// grants universal access.
pub fn role_allows(role: Role, allowed: &[Access]) -> bool {
    if has_capability(role, Capability::All) {
        return true;
    }
    allowed
        .iter()
        .any(|access| matches!(access, Access::Any) || matches!(access, Access::Role(r) if *r == role))
}

/// Longest-prefix route policy table consulted by the authorize middleware.
#[derive(Debug, Default)]
pub struct RoutePolicyTable {
    policies: Vec<(String, Vec<Access>)>,
}

impl RoutePolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(&mut self, prefix: impl Into<String>, allowed: Vec<Access>) {
        self.policies.push((prefix.into(), allowed));
    }

    pub fn lookup(&self, path: &str) -> Option<&[Access]> {
        self.policies
            .iter()
            .filter(|(prefix, _)| path.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, allowed)| allowed.as_slice())
    }
}

/// Authorize middleware: routes without a policy pass through; routes with a
/// policy require an authenticated principal whose role satisfies it.
pub async fn require_role_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let allowed: Option<Vec<Access>> = state
        .policies
        .lookup(request.uri().path())
        .map(|slice| slice.to_vec());
    let Some(allowed) = allowed else {
        return next.run(request).await;
    };

    let Some(principal) = request.extensions().get::<Principal>().cloned() else {
        // Auth middleware runs first; a missing principal here is a wiring bug.
        return Rejection::Unauthorized {
            reason: "authentication required".to_string(),
        }
        .into_response();
    };

    if role_allows(principal.role, &allowed) {
        return next.run(request).await;
    }

    let path = request.uri().path().to_string();
    tracing::warn!(user = %principal.id, role = %principal.role, path = %path, "role denied");
    metrics::record_rejection("rbac");
    state.telemetry.events.log_rbac_denial(&principal, &path);
    Rejection::Forbidden {
        required: allowed.iter().map(|a| a.to_string()).collect(),
        actual: principal.role.to_string(),
    }
    .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_wildcard_grants_everything() {
        assert!(has_capability(Role::Admin, Capability::ManageSettings));
        assert!(role_allows(Role::Admin, &[Access::Role(Role::Tenant)]));
        assert!(role_allows(Role::Admin, &[]));
    }

    #[test]
    fn access_any_admits_every_role() {
        assert!(role_allows(Role::Tenant, &[Access::Any]));
        assert!(role_allows(Role::Maintenance, &[Access::Any]));
    }

    #[test]
    fn non_matching_role_is_denied() {
        let allowed = [Access::Role(Role::Admin), Access::Role(Role::PropertyManager)];
        assert!(role_allows(Role::PropertyManager, &allowed));
        assert!(!role_allows(Role::Tenant, &allowed));
    }

    #[test]
    fn capabilities_follow_the_static_table() {
        assert!(has_capability(Role::Tenant, Capability::RequestMaintenance));
        assert!(!has_capability(Role::Tenant, Capability::ManageProperties));
        assert!(has_capability(Role::Maintenance, Capability::ManageMaintenance));
        assert!(!has_capability(Role::Landlord, Capability::ManagePayments));
    }

    #[test]
    fn policy_lookup_prefers_longest_prefix() {
        let mut table = RoutePolicyTable::new();
        table.allow("/api", vec![Access::Any]);
        table.allow("/api/admin", vec![Access::Role(Role::Admin)]);

        assert_eq!(table.lookup("/api/properties"), Some(&[Access::Any][..]));
        assert_eq!(
            table.lookup("/api/admin/users"),
            Some(&[Access::Role(Role::Admin)][..])
        );
        assert_eq!(table.lookup("/health"), None);
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [
            Role::Admin,
            Role::PropertyManager,
            Role::Landlord,
            Role::Tenant,
            Role::Maintenance,
        ] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }
}
