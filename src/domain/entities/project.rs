//! Project entity and repository trait.
//!
//! Maps to the `projects`, `project_info` and `project_managers` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::MapperLevel;
use crate::shared::error::AppError;

/// Publication status of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectStatus {
    Archived,
    Published,
    #[default]
    Draft,
}

impl ProjectStatus {
    pub fn from_i16(value: i16) -> Self {
        match value {
            0 => Self::Archived,
            1 => Self::Published,
            _ => Self::Draft,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Archived => 0,
            Self::Published => 1,
            Self::Draft => 2,
        }
    }
}

/// A container of tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub status: ProjectStatus,
    pub author_id: i64,
    /// Minimum level needed to map
    pub mapper_level: MapperLevel,
    /// Users must accept this license before mapping or validating
    pub license_id: Option<i64>,
    /// Explicit managers besides the author
    pub manager_ids: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn is_managed_by(&self, user_id: i64) -> bool {
        self.author_id == user_id || self.manager_ids.contains(&user_id)
    }
}

impl Default for Project {
    fn default() -> Self {
        Self {
            id: 0,
            status: ProjectStatus::default(),
            author_id: 0,
            mapper_level: MapperLevel::default(),
            license_id: None,
            manager_ids: vec![],
            created_at: Utc::now(),
        }
    }
}

/// Repository trait for Project data access operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Find a project by id.
    async fn find_by_id(&self, id: i64) -> Result<Option<Project>, AppError>;

    /// Check whether a project exists.
    async fn exists(&self, id: i64) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_and_listed_managers_manage() {
        let project = Project { author_id: 1, manager_ids: vec![2], ..Project::default() };
        assert!(project.is_managed_by(1));
        assert!(project.is_managed_by(2));
        assert!(!project.is_managed_by(3));
    }

    #[test]
    fn test_status_codes() {
        for status in [ProjectStatus::Archived, ProjectStatus::Published, ProjectStatus::Draft] {
            assert_eq!(ProjectStatus::from_i16(status.as_i16()), status);
        }
    }
}
