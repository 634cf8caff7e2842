//! Claims carried by the identity provider's bearer tokens.

use entity_api::role::Role;
use entity_api::Id;
use serde::{Deserialize, Serialize};

/// The caller's identity as asserted by the identity provider.
///
/// Only HS256 tokens carrying all four claims are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Id,
    pub org_id: Id,
    pub role: Role,
    /// Expiry as seconds since the Unix epoch
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Id {
        self.sub
    }

    /// Managers and admins may administer webhooks.
    pub fn can_manage_webhooks(&self) -> bool {
        matches!(self.role, Role::Manager | Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
