//! Persistence boundary for users and roles.

use thiserror::Error;
use uuid::Uuid;

use super::permission::{role_table, Role};

pub mod memory;
pub mod postgres;

pub use memory::MemoryIdentityStore;
pub use postgres::PgIdentityStore;

/// A stored account. The role is a shared, non-owning reference in storage;
/// it is materialized here for permission checks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub confirmed: bool,
    pub role: Role,
}

/// Fields required to create an account. The store assigns the id.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_name: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    DuplicateEmail,
    #[error("username already taken")]
    DuplicateUsername,
    #[error("unknown role: {0}")]
    MissingRole(String),
    #[error("identity storage unavailable: {0}")]
    Unavailable(#[from] sqlx::Error),
}

/// Lowercase, trimmed form used for every email lookup and uniqueness check.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// CRUD contract over users and roles. The storage engine behind it is an
/// implementation choice; both engines here fold emails before comparing.
#[allow(async_fn_in_trait)]
pub trait IdentityStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Atomic check-and-insert. Exactly one of two concurrent creates with
    /// the same email or username wins; the loser gets the duplicate error.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Persist mutations to an existing user (password, confirmed flag,
    /// role). Email changes go through [`Self::update_email`] instead.
    async fn save(&self, user: &User) -> Result<(), StoreError>;

    /// Replace a user's email, re-checking uniqueness inside the same atomic
    /// unit that writes the new address.
    async fn update_email(&self, id: Uuid, new_email: &str) -> Result<(), StoreError>;

    async fn default_role(&self) -> Result<Role, StoreError>;

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    /// Create-or-replace a role row by name.
    async fn upsert_role(&self, role: &Role) -> Result<(), StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
}

/// Re-derive every catalog role from the static table. Running it twice
/// (or from two processes at bootstrap) yields the same state.
pub async fn reconcile_roles<S: IdentityStore>(store: &S) -> Result<(), StoreError> {
    for spec in role_table() {
        store.upsert_role(&spec.build()).await?;
    }
    Ok(())
}
