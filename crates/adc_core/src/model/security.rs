//! Security entities: users, roles and their link rows.
//!
//! # Invariants
//! - `User.email` must look like an address (`local@domain.tld`).
//! - `Role.name` must not be blank.
//! - Navigation fields (`user_roles`, `role`, `user`) are populated only when
//!   loaded through an include or seeded in memory.

use crate::model::entity::{Entity, EntityId, EntityValidationError};
use crate::model::file_entry::FileSystemEntry;
use crate::query::include::Relation;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid"));

/// Well-known role names.
pub mod roles {
    pub const ADMIN: &str = "Admin";
    pub const USER: &str = "User";

    pub const ALL: [&str; 2] = [ADMIN, USER];
}

/// Application account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: EntityId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub photo: Option<String>,
    /// Deactivated accounts stay in storage with this flag set.
    pub in_active: bool,
    pub site_id: Option<i64>,
    /// Regenerated on every profile change.
    pub concurrency_stamp: String,
    #[serde(default)]
    pub user_roles: Vec<UserRole>,
    #[serde(default)]
    pub file_system_entries: Vec<FileSystemEntry>,
}

impl User {
    pub const USER_ROLES: Relation<User, Vec<UserRole>> = Relation::new("user_roles");
    pub const FILE_SYSTEM_ENTRIES: Relation<User, Vec<FileSystemEntry>> =
        Relation::new("file_system_entries");

    pub fn new(
        email: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            email: email.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            photo: None,
            in_active: false,
            site_id: None,
            concurrency_stamp: Uuid::new_v4().to_string(),
            user_roles: Vec::new(),
            file_system_entries: Vec::new(),
        }
    }

    /// Returns whether any loaded role link points at the admin role.
    pub fn is_admin(&self) -> bool {
        self.has_role(roles::ADMIN)
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.user_roles
            .iter()
            .any(|link| link.role.as_ref().is_some_and(|role| role.name == name))
    }

    /// Upper-cased first letters of first and last name.
    pub fn initials(&self) -> String {
        self.first_name
            .chars()
            .take(1)
            .chain(self.last_name.chars().take(1))
            .collect::<String>()
            .to_uppercase()
    }

    pub fn touch(&mut self) {
        self.concurrency_stamp = Uuid::new_v4().to_string();
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        if !EMAIL_PATTERN.is_match(self.email.trim()) {
            return Err(EntityValidationError::new(
                Self::NAME,
                "email",
                format!("`{}` is not a valid address", self.email),
            ));
        }
        Ok(())
    }
}

/// Named permission group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: EntityId,
    pub name: String,
    pub concurrency_stamp: String,
    #[serde(default)]
    pub user_roles: Vec<UserRole>,
}

impl Role {
    pub const USER_ROLES: Relation<Role, Vec<UserRole>> = Relation::new("user_roles");

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: name.into(),
            concurrency_stamp: Uuid::new_v4().to_string(),
            user_roles: Vec::new(),
        }
    }
}

impl Entity for Role {
    const NAME: &'static str = "Role";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }

    fn validate(&self) -> Result<(), EntityValidationError> {
        if self.name.trim().is_empty() {
            return Err(EntityValidationError::new(
                Self::NAME,
                "name",
                "must not be blank",
            ));
        }
        Ok(())
    }
}

/// Link row between one user and one role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub id: EntityId,
    pub user_id: EntityId,
    pub role_id: EntityId,
    #[serde(default)]
    pub user: Option<Box<User>>,
    #[serde(default)]
    pub role: Option<Role>,
}

impl UserRole {
    pub const USER: Relation<UserRole, User> = Relation::new("user");
    pub const ROLE: Relation<UserRole, Role> = Relation::new("role");

    pub fn new(user_id: EntityId, role_id: EntityId) -> Self {
        Self {
            id: 0,
            user_id,
            role_id,
            user: None,
            role: None,
        }
    }

    /// Link with the role navigation already attached, for in-memory seeding.
    pub fn with_role(user_id: EntityId, role: Role) -> Self {
        Self {
            role_id: role.id,
            role: Some(role),
            ..Self::new(user_id, 0)
        }
    }
}

impl Entity for UserRole {
    const NAME: &'static str = "UserRole";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

#[cfg(test)]
mod tests {
    use super::{roles, Role, User, UserRole};
    use crate::model::entity::Entity;

    #[test]
    fn email_validation_rejects_malformed_addresses() {
        assert!(User::new("ann@example.com", "Ann", "Lee").validate().is_ok());

        let err = User::new("not-an-email", "Ann", "Lee")
            .validate()
            .unwrap_err();
        assert_eq!(err.field, "email");
    }

    #[test]
    fn admin_flag_follows_loaded_roles() {
        let mut user = User::new("ann@example.com", "ann", "lee");
        assert!(!user.is_admin());

        let mut admin = Role::new(roles::ADMIN);
        admin.id = 1;
        user.user_roles.push(UserRole::with_role(user.id, admin));
        assert!(user.is_admin());
        assert_eq!(user.initials(), "AL");
    }

    #[test]
    fn blank_role_name_is_invalid() {
        assert!(Role::new("  ").validate().is_err());
    }
}
