//! Postgres-backed identity store.
//!
//! Uniqueness is enforced by the database: `users_email_key` and
//! `users_username_key` unique indexes turn concurrent duplicate inserts into
//! SQLSTATE 23505 errors, which map onto the typed duplicate variants.

use sqlx::{postgres::PgRow, PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::{normalize_email, IdentityStore, NewUser, StoreError, User};
use crate::identity::permission::Role;

const USER_COLUMNS: &str = r"
    users.id, users.username, users.email, users.password_hash, users.confirmed,
    roles.name AS role_name, roles.permissions AS role_permissions,
    roles.is_default AS role_is_default
";

#[derive(Clone)]
pub struct PgIdentityStore {
    pool: PgPool,
}

impl PgIdentityStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_by_column(&self, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users JOIN roles ON roles.name = users.role_name \
             WHERE users.{column} = $1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let permissions: i16 = row.try_get("role_permissions")?;
    Ok(User {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        confirmed: row.try_get("confirmed")?,
        role: Role {
            name: row.try_get("role_name")?,
            permissions: u8::try_from(permissions).unwrap_or(0),
            is_default: row.try_get("role_is_default")?,
        },
    })
}

fn map_unique_violation(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(ref db_err) = err {
        if db_err.code().as_deref() == Some("23505") {
            return match db_err.constraint() {
                Some(name) if name.contains("username") => StoreError::DuplicateUsername,
                _ => StoreError::DuplicateEmail,
            };
        }
    }
    StoreError::Unavailable(err)
}

impl IdentityStore for PgIdentityStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("email", &normalize_email(email)).await
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        self.find_by_column("username", username).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users JOIN roles ON roles.name = users.role_name \
             WHERE users.id = $1"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| user_from_row(&row)).transpose()
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let id = Uuid::new_v4();
        let email = normalize_email(&new_user.email);
        let query = r"
            INSERT INTO users (id, username, email, password_hash, confirmed, role_name)
            VALUES ($1, $2, $3, $4, FALSE, $5)
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(&new_user.username)
            .bind(&email)
            .bind(&new_user.password_hash)
            .bind(&new_user.role_name)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_unique_violation)?;

        self.find_by_id(id)
            .await?
            .ok_or(StoreError::Unavailable(sqlx::Error::RowNotFound))
    }

    async fn save(&self, user: &User) -> Result<(), StoreError> {
        let query = r"
            UPDATE users
            SET username = $2,
                password_hash = $3,
                confirmed = $4,
                role_name = $5,
                updated_at = NOW()
            WHERE id = $1
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(user.id)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(user.confirmed)
            .bind(&user.role.name)
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn update_email(&self, id: Uuid, new_email: &str) -> Result<(), StoreError> {
        // A single UPDATE guarded by the unique index keeps the uniqueness
        // re-check and the write in one atomic unit.
        let query = "UPDATE users SET email = $2, updated_at = NOW() WHERE id = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.statement = query
        );
        sqlx::query(query)
            .bind(id)
            .bind(normalize_email(new_email))
            .execute(&self.pool)
            .instrument(span)
            .await
            .map_err(map_unique_violation)?;
        Ok(())
    }

    async fn default_role(&self) -> Result<Role, StoreError> {
        let query = "SELECT name, permissions, is_default FROM roles WHERE is_default LIMIT 1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| role_from_row(&row))
            .transpose()?
            .ok_or_else(|| StoreError::MissingRole("default".to_string()))
    }

    async fn role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let query = "SELECT name, permissions, is_default FROM roles WHERE name = $1";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;
        row.map(|row| role_from_row(&row)).transpose()
    }

    async fn upsert_role(&self, role: &Role) -> Result<(), StoreError> {
        let query = r"
            INSERT INTO roles (name, permissions, is_default)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE
            SET permissions = EXCLUDED.permissions,
                is_default = EXCLUDED.is_default
        ";
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(&role.name)
            .bind(i16::from(role.permissions))
            .bind(role.is_default)
            .execute(&self.pool)
            .instrument(span)
            .await?;
        Ok(())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users JOIN roles ON roles.name = users.role_name \
             ORDER BY users.username"
        );
        let span = tracing::info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query.as_str()
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .instrument(span)
            .await?;
        rows.iter().map(user_from_row).collect()
    }
}

fn role_from_row(row: &PgRow) -> Result<Role, StoreError> {
    let permissions: i16 = row.try_get("permissions")?;
    Ok(Role {
        name: row.try_get("name")?,
        permissions: u8::try_from(permissions).unwrap_or(0),
        is_default: row.try_get("is_default")?,
    })
}
