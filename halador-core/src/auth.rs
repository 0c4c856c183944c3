use uuid::Uuid;

use crate::profile::Role;
use crate::{CoreError, CoreResult};

/// The authenticated caller, resolved from the session token and passed
/// explicitly into every service call. No component reads session state
/// from ambient globals.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthContext {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn require_role(&self, role: Role) -> CoreResult<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(CoreError::AuthorizationError(format!(
                "requires {} role",
                role.as_str()
            )))
        }
    }

    pub fn require_admin(&self) -> CoreResult<()> {
        self.require_role(Role::Admin)
    }
}
