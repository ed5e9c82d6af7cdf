//! Project Repository Implementation
//!
//! PostgreSQL implementation of the ProjectRepository trait. Managers come
//! from `project_managers` and are loaded with the project row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::domain::{MapperLevel, Project, ProjectRepository, ProjectStatus};
use crate::shared::error::AppError;

#[derive(Debug, sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    status: i16,
    author_id: i64,
    mapper_level: i16,
    license_id: Option<i64>,
    manager_ids: Vec<i64>,
    created_at: DateTime<Utc>,
}

impl ProjectRow {
    fn into_project(self) -> Project {
        Project {
            id: self.id,
            status: ProjectStatus::from_i16(self.status),
            author_id: self.author_id,
            mapper_level: MapperLevel::from_i16(self.mapper_level),
            license_id: self.license_id,
            manager_ids: self.manager_ids,
            created_at: self.created_at,
        }
    }
}

/// PostgreSQL project repository implementation.
#[derive(Clone)]
pub struct PgProjectRepository {
    pool: PgPool,
}

impl PgProjectRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError> {
        let row = sqlx::query_as::<_, ProjectRow>(
            r#"
            SELECT p.id, p.status, p.author_id, p.mapper_level, p.license_id,
                   ARRAY(
                       SELECT pm.user_id FROM project_managers pm
                       WHERE pm.project_id = p.id ORDER BY pm.user_id
                   ) AS manager_ids,
                   p.created_at
            FROM projects p
            WHERE p.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ProjectRow::into_project))
    }

    async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }
}
