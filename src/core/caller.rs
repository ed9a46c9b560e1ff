//! Caller identity - who is invoking an operation.
//!
//! The identity provider has already authenticated the caller; this crate trusts
//! the id and role it is handed and only checks that the role fits the operation.

use crate::{
    entities::Role,
    errors::{Error, Result},
};

/// Authenticated caller, passed explicitly into every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: i64,
    pub role: Role,
}

impl Caller {
    #[must_use]
    pub const fn new(user_id: i64, role: Role) -> Self {
        Self { user_id, role }
    }

    #[must_use]
    pub const fn admin(user_id: i64) -> Self {
        Self::new(user_id, Role::Admin)
    }

    #[must_use]
    pub const fn user(user_id: i64) -> Self {
        Self::new(user_id, Role::User)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Fails with `Forbidden` unless the caller holds `role`.
    pub fn require_role(&self, role: Role) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(Error::forbidden(format!(
                "Operation requires role {role:?}, caller has {:?}",
                self.role
            )))
        }
    }

    /// Fails with `Forbidden` unless the caller is `owner_id`.
    pub fn require_owner(&self, owner_id: i64) -> Result<()> {
        if self.user_id == owner_id {
            Ok(())
        } else {
            Err(Error::forbidden("Card belongs to another user"))
        }
    }
}
