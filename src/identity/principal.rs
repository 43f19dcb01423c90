//! Request principals and capability checks.
//!
//! Replaces attribute-probing "current user" objects with an explicit
//! two-variant type: either an authenticated user with a resolved permission
//! mask, or nobody.

use uuid::Uuid;

use super::permission::Permission;

/// Authenticated user context carried through a request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub permissions: u8,
    pub confirmed: bool,
}

/// Who is making the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Principal {
    Authenticated(AuthenticatedUser),
    Anonymous,
}

impl Principal {
    /// Capability check. Anonymous principals hold no permissions at all.
    #[must_use]
    pub fn can(&self, permission: Permission) -> bool {
        match self {
            Self::Authenticated(user) => {
                user.permissions & permission.bit() == permission.bit()
            }
            Self::Anonymous => false,
        }
    }

    #[must_use]
    pub fn is_administrator(&self) -> bool {
        self.can(Permission::Admin)
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}
