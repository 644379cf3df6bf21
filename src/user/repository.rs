//! SQL access to accounts.

use sqlx::AnyPool;

use super::User;
use crate::error::Result;

/// Row shape. Flags travel as integers so identical queries run on every
/// backend the `Any` driver knows.
#[derive(sqlx::FromRow)]
struct UserRecord {
    id: String,
    email: String,
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    is_active: i64,
    is_verified: i64,
    created_at: i64,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            username: record.username,
            password: record.password,
            first_name: record.first_name,
            last_name: record.last_name,
            is_active: record.is_active != 0,
            is_verified: record.is_verified != 0,
            created_at: record.created_at,
        }
    }
}

/// Account store over the shared pool.
#[derive(Clone)]
pub struct UserRepository {
    pool: AnyPool,
}

impl UserRepository {
    pub fn new(pool: AnyPool) -> Self {
        Self { pool }
    }

    /// Persist a new account.
    pub async fn insert(&self, user: &User) -> Result<()> {
        sqlx::query(
            "INSERT INTO users (id, email, username, password, first_name, \
             last_name, is_active, is_verified, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(&user.id)
        .bind(&user.email)
        .bind(&user.username)
        .bind(&user.password)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.is_active as i64)
        .bind(user.is_verified as i64)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, username, password, first_name, last_name, \
             is_active, is_verified, created_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::from))
    }

    /// Lookup by email, case-insensitively.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, username, password, first_name, last_name, \
             is_active, is_verified, created_at \
             FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(User::from))
    }

    pub async fn email_taken(&self, email: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT count(*) FROM users WHERE lower(username) = lower($1)",
        )
        .bind(username)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Persist the mutable profile fields.
    pub async fn update(&self, user: &User) -> Result<()> {
        sqlx::query(
            "UPDATE users SET first_name = $2, last_name = $3 WHERE id = $1",
        )
        .bind(&user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
