//! Bitmask permissions and named roles.

use serde::{Deserialize, Serialize};

/// Individually grantable capability. Each variant is a distinct power of two
/// so a role's grant set is the bitwise OR of its capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Permission {
    Follow = 0x01,
    Comment = 0x02,
    Write = 0x04,
    Moderate = 0x08,
    Admin = 0x10,
}

impl Permission {
    #[must_use]
    pub const fn bit(self) -> u8 {
        self as u8
    }
}

/// Named set of permissions shared by many users.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub permissions: u8,
    pub is_default: bool,
}

impl Role {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            permissions: 0,
            is_default: false,
        }
    }

    #[must_use]
    pub const fn has_permission(&self, permission: Permission) -> bool {
        self.permissions & permission.bit() == permission.bit()
    }

    /// Set the bit if absent. Adding twice is the same as adding once.
    pub fn add_permission(&mut self, permission: Permission) {
        if !self.has_permission(permission) {
            self.permissions |= permission.bit();
        }
    }

    /// Clear the bit if present. Removing twice is the same as removing once.
    pub fn remove_permission(&mut self, permission: Permission) {
        if self.has_permission(permission) {
            self.permissions &= !permission.bit();
        }
    }

    pub fn reset_permissions(&mut self) {
        self.permissions = 0;
    }
}

/// One row of the static role catalog used by [`role_table`].
pub struct RoleSpec {
    pub name: &'static str,
    pub permissions: &'static [Permission],
    pub is_default: bool,
}

/// The role catalog seeded at bootstrap. Exactly one row is marked default.
#[must_use]
pub fn role_table() -> [RoleSpec; 3] {
    [
        RoleSpec {
            name: "User",
            permissions: &[Permission::Follow, Permission::Comment, Permission::Write],
            is_default: true,
        },
        RoleSpec {
            name: "Moderator",
            permissions: &[
                Permission::Follow,
                Permission::Comment,
                Permission::Write,
                Permission::Moderate,
            ],
            is_default: false,
        },
        RoleSpec {
            name: "Administrator",
            permissions: &[
                Permission::Follow,
                Permission::Comment,
                Permission::Write,
                Permission::Moderate,
                Permission::Admin,
            ],
            is_default: false,
        },
    ]
}

impl RoleSpec {
    /// Materialize the catalog row as a [`Role`] with its mask re-derived
    /// from scratch, so stale bits never survive a reconcile.
    #[must_use]
    pub fn build(&self) -> Role {
        let mut role = Role::new(self.name);
        role.reset_permissions();
        for permission in self.permissions {
            role.add_permission(*permission);
        }
        role.is_default = self.is_default;
        role
    }
}
