//! Authenticated request principal and the access scope guard.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PaymentError, Result};

/// Authorization tier of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Service-to-service trusted caller (role id 0). Always authorized.
    TrustedService,
    Admin,
    Customer,
    Merchant,
}

impl Role {
    /// Role id as issued by the identity service.
    pub fn id(&self) -> i64 {
        match self {
            Role::TrustedService => 0,
            Role::Admin => 1,
            Role::Customer => 2,
            Role::Merchant => 3,
        }
    }

    /// Decode a role id.
    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(Role::TrustedService),
            1 => Some(Role::Admin),
            2 => Some(Role::Customer),
            3 => Some(Role::Merchant),
            _ => None,
        }
    }
}

/// The authenticated caller of one request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPrincipal {
    /// Role id from the identity service.
    pub role_id: i64,
    /// Identity (user) id.
    pub user_id: String,
    /// Bearer token, forwarded on calls to other services.
    pub token: String,
}

impl RequestPrincipal {
    /// Create a new principal.
    pub fn new(role_id: i64, user_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            role_id,
            user_id: user_id.into(),
            token: token.into(),
        }
    }

    /// Principal for a role, convenient for in-process callers.
    pub fn with_role(role: Role, user_id: impl Into<String>) -> Self {
        Self::new(role.id(), user_id, "")
    }

    /// Decoded role, `None` for unknown ids.
    pub fn role(&self) -> Option<Role> {
        Role::from_id(self.role_id)
    }

    /// Check if the principal acts on its own resources only (customer or merchant).
    pub fn is_owner_scoped(&self) -> bool {
        matches!(self.role(), Some(Role::Customer) | Some(Role::Merchant))
    }

    /// Check if the principal has exactly this role.
    pub fn is(&self, role: Role) -> bool {
        self.role() == Some(role)
    }

    /// Fail with `NoAccess` unless one of the roles is allowed.
    pub fn ensure(&self, allowed: &[Role]) -> Result<()> {
        if validate_scope(Some(self), allowed) {
            Ok(())
        } else {
            Err(PaymentError::NoAccess)
        }
    }
}

impl fmt::Debug for RequestPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPrincipal")
            .field("role_id", &self.role_id)
            .field("user_id", &self.user_id)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Check whether a principal may perform an operation limited to `allowed` roles.
///
/// A missing principal is never authorized. Role id 0 is always authorized.
pub fn validate_scope(principal: Option<&RequestPrincipal>, allowed: &[Role]) -> bool {
    let Some(principal) = principal else {
        return false;
    };

    if principal.role_id == Role::TrustedService.id() {
        return true;
    }

    allowed.iter().any(|role| role.id() == principal.role_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_principal_denied() {
        assert!(!validate_scope(None, &[Role::Admin, Role::Customer]));
    }

    #[test]
    fn test_trusted_service_bypass() {
        let svc = RequestPrincipal::with_role(Role::TrustedService, "svc");
        assert!(validate_scope(Some(&svc), &[Role::Admin]));
        assert!(validate_scope(Some(&svc), &[]));
    }

    #[test]
    fn test_role_membership() {
        let customer = RequestPrincipal::with_role(Role::Customer, "u1");
        assert!(validate_scope(Some(&customer), &[Role::Admin, Role::Customer]));
        assert!(!validate_scope(Some(&customer), &[Role::Admin]));
        assert_eq!(customer.ensure(&[Role::Merchant]), Err(PaymentError::NoAccess));

        let unknown = RequestPrincipal::new(7, "u2", "t");
        let everyone = [Role::Admin, Role::Customer, Role::Merchant];
        assert!(!validate_scope(Some(&unknown), &everyone));
        assert!(!unknown.is_owner_scoped());
    }

    #[test]
    fn test_debug_redacts_token() {
        let p = RequestPrincipal::new(1, "u1", "secret-token");
        assert!(!format!("{:?}", p).contains("secret-token"));
    }
}
