//! In-memory store for tests and local demos.
//!
//! A single lock around the maps gives the same atomicity the relational
//! engine gets from unique indexes: check-and-insert happens under one
//! critical section, so concurrent registrations cannot both win.

use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{normalize_email, IdentityStore, NewUser, StoreError, User};
use crate::identity::permission::Role;

#[derive(Default)]
struct MemoryState {
    users: HashMap<Uuid, UserRecord>,
    roles: HashMap<String, Role>,
}

#[derive(Clone)]
struct UserRecord {
    username: String,
    email: String,
    password_hash: String,
    confirmed: bool,
    role_name: String,
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    state: Mutex<MemoryState>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn materialize(state: &MemoryState, id: Uuid, record: &UserRecord) -> Result<User, StoreError> {
    let role = state
        .roles
        .get(&record.role_name)
        .cloned()
        .ok_or_else(|| StoreError::MissingRole(record.role_name.clone()))?;
    Ok(User {
        id,
        username: record.username.clone(),
        email: record.email.clone(),
        password_hash: record.password_hash.clone(),
        confirmed: record.confirmed,
        role,
    })
}

impl IdentityStore for MemoryIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let folded = normalize_email(email);
        let state = self.state.lock().await;
        for (id, record) in &state.users {
            if record.email == folded {
                return materialize(&state, *id, record).map(Some);
            }
        }
        Ok(None)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        for (id, record) in &state.users {
            if record.username == username {
                return materialize(&state, *id, record).map(Some);
            }
        }
        Ok(None)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let state = self.state.lock().await;
        match state.users.get(&id) {
            Some(record) => materialize(&state, id, record).map(Some),
            None => Ok(None),
        }
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let folded = normalize_email(&new_user.email);
        let mut state = self.state.lock().await;

        if state.users.values().any(|record| record.email == folded) {
            return Err(StoreError::DuplicateEmail);
        }
        if state
            .users
            .values()
            .any(|record| record.username == new_user.username)
        {
            return Err(StoreError::DuplicateUsername);
        }
        if !state.roles.contains_key(&new_user.role_name) {
            return Err(StoreError::MissingRole(new_user.role_name));
        }

        let id = Uuid::new_v4();
        let record = UserRecord {
            username: new_user.username,
            email: folded,
            password_hash: new_user.password_hash,
            confirmed: false,
            role_name: new_user.role_name,
        };
        let user = materialize(&state, id, &record)?;
        state.users.insert(id, record);
        Ok(user)
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.roles.contains_key(&user.role.name) {
            return Err(StoreError::MissingRole(user.role.name.clone()));
        }
        let record = state
            .users
            .get_mut(&user.id)
            .ok_or(sqlx::Error::RowNotFound)?;
        record.username = user.username.clone();
        record.password_hash = user.password_hash.clone();
        record.confirmed = user.confirmed;
        record.role_name = user.role.name.clone();
        Ok(())
    }

    async fn update_email(&self, id: Uuid, new_email: &str) -> Result<(), StoreError> {
        let folded = normalize_email(new_email);
        let mut state = self.state.lock().await;

        // Uniqueness re-check and write happen under the same lock.
        if state
            .users
            .iter()
            .any(|(other_id, record)| *other_id != id && record.email == folded)
        {
            return Err(StoreError::DuplicateEmail);
        }
        let record = state.users.get_mut(&id).ok_or(sqlx::Error::RowNotFound)?;
        record.email = folded;
        Ok(())
    }

    async fn default_role(&self) -> Result<Role, StoreError> {
        let state = self.state.lock().await;
        state
            .roles
            .values()
            .find(|role| role.is_default)
            .cloned()
            .ok_or_else(|| StoreError::MissingRole("default".to_string()))
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.roles.get(name).cloned())
    }

    async fn upsert_role(&self, role: &Role) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.roles.insert(role.name.clone(), role.clone());
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().await;
        let mut users = Vec::with_capacity(state.users.len());
        for (id, record) in &state.users {
            users.push(materialize(&state, *id, record)?);
        }
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::permission::{role_table, Permission};
    use crate::identity::store::reconcile_roles;

    fn sample_user(name: &str, email: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: email.to_string(),
            password_hash: "$argon2id$stub".to_string(),
            role_name: "User".to_string(),
        }
    }

    #[tokio::test]
    async fn create_then_lookup_by_folded_email() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        reconcile_roles(&store).await?;
        store.create(sample_user("alice", "Alice@Example.com")).await?;

        let found = store.find_by_email(" ALICE@example.COM ").await?;
        assert_eq!(found.map(|user| user.username), Some("alice".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_email_loses() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        reconcile_roles(&store).await?;
        store.create(sample_user("bob", "bob@example.com")).await?;

        let result = store.create(sample_user("robert", "BOB@example.com")).await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));
        Ok(())
    }

    #[tokio::test]
    async fn duplicate_username_loses() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        reconcile_roles(&store).await?;
        store.create(sample_user("bob", "bob@example.com")).await?;

        let result = store.create(sample_user("bob", "other@example.com")).await;
        assert!(matches!(result, Err(StoreError::DuplicateUsername)));
        Ok(())
    }

    #[tokio::test]
    async fn update_email_rejects_claimed_address() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        reconcile_roles(&store).await?;
        let carol = store.create(sample_user("carol", "carol@example.com")).await?;
        store.create(sample_user("dave", "dave@example.com")).await?;

        let result = store.update_email(carol.id, "dave@example.com").await;
        assert!(matches!(result, Err(StoreError::DuplicateEmail)));

        // Changing to an unclaimed address still works, case-folded.
        store.update_email(carol.id, "Carol2@Example.com").await?;
        let reloaded = store.find_by_id(carol.id).await?;
        assert_eq!(
            reloaded.map(|user| user.email),
            Some("carol2@example.com".to_string())
        );
        Ok(())
    }

    #[tokio::test]
    async fn reconcile_roles_is_idempotent() -> Result<(), StoreError> {
        let store = MemoryIdentityStore::new();
        reconcile_roles(&store).await?;
        let first: Vec<_> = {
            let mut names: Vec<_> = Vec::new();
            for spec in role_table() {
                names.push(store.role_by_name(spec.name).await?);
            }
            names
        };

        reconcile_roles(&store).await?;
        for (spec, before) in role_table().iter().zip(first) {
            let after = store.role_by_name(spec.name).await?;
            assert_eq!(before, after);
        }

        let default = store.default_role().await?;
        assert_eq!(default.name, "User");
        assert!(default.has_permission(Permission::Write));
        Ok(())
    }
}
