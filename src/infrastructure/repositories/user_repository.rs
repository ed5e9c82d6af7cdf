//! User Repository Implementation
//!
//! PostgreSQL implementation of the UserRepository trait.
//! Maps between the database schema and domain User entity.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::{MapperLevel, User, UserRepository, UserRole};
use crate::shared::error::AppError;

/// Database row representation of a user joined with accepted licenses.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    role: i16,
    mapping_level: i16,
    accepted_licenses: Vec<i64>,
}

impl UserRow {
    /// Convert database row to domain User entity.
    fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            role: UserRole::from_i16(self.role),
            mapping_level: MapperLevel::from_i16(self.mapping_level),
            accepted_licenses: self.accepted_licenses,
        }
    }
}

const USER_SELECT: &str = r#"
    SELECT u.id, u.username, u.role, u.mapping_level,
           ARRAY(
               SELECT ul.license_id FROM user_licenses ul
               WHERE ul.user_id = u.id ORDER BY ul.license_id
           ) AS accepted_licenses
    FROM users u
"#;

/// PostgreSQL user repository implementation.
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!("{USER_SELECT} WHERE u.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "{USER_SELECT} WHERE LOWER(u.username) = LOWER($1)"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.into_user()))
    }

    async fn update_mapping_level(&self, id: i64, level: MapperLevel) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET mapping_level = $2 WHERE id = $1")
            .bind(id)
            .bind(level.as_i16())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
