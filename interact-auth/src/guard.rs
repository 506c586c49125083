use thiserror::Error;
use tracing::warn;

use crate::permission::Permission;
use crate::role::Role;

/// Authenticated caller with its resolved role.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub email: String,
    pub role: Role,
}

impl Caller {
    pub fn new(email: impl Into<String>, role: Role) -> Self {
        Self {
            email: email.into(),
            role,
        }
    }
}

/// Typed authorization failures, surfaced to the caller with no partial
/// effect.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("authentication required")]
    Unauthorized,

    #[error("access denied: {permission} requires one of {required:?}")]
    Forbidden {
        permission: String,
        required: &'static [Role],
    },

    #[error("access denied: owner access required")]
    NotOwner,
}

/// Fails with `Unauthorized` when no authenticated caller is present.
pub fn require_auth(caller: Option<&Caller>) -> Result<&Caller, AuthError> {
    caller.ok_or(AuthError::Unauthorized)
}

/// Fails with `Forbidden` when the caller's role is not in the permission's
/// allowed set.
pub fn require_permission(
    caller: Option<&Caller>,
    permission: Permission,
) -> Result<&Caller, AuthError> {
    let caller = require_auth(caller)?;
    if permission.allows(caller.role) {
        Ok(caller)
    } else {
        warn!(
            caller = %caller.email,
            role = ?caller.role,
            permission = %permission,
            "permission denied"
        );
        Err(AuthError::Forbidden {
            permission: permission.to_string(),
            required: permission.allowed_roles(),
        })
    }
}

/// Stricter variant: the caller must have resolved to [`Role::Owner`],
/// i.e. be on the configured owner allow-list. With an empty list nobody
/// passes.
pub fn require_owner(caller: Option<&Caller>) -> Result<&Caller, AuthError> {
    let caller = require_auth(caller)?;
    if caller.role == Role::Owner {
        Ok(caller)
    } else {
        warn!(caller = %caller.email, role = ?caller.role, "owner access denied");
        Err(AuthError::NotOwner)
    }
}
