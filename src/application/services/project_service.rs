//! Project Service
//!
//! Project lookups and the per-user checks that gate locking tasks.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{
    MapperLevel, Project, ProjectRepository, ProjectStatus, TaskRepository, User, UserRepository,
    UserRole,
};
use crate::shared::error::AppError;

/// Reasons a user may not lock tasks on a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("UserLicenseError-User must accept the project license")]
    LicenseNotAccepted,

    #[error("UserNotAllowed-User is not allowed to work on this project")]
    UserNotAllowed,

    #[error("ProjectNotPublished-Project is not published")]
    ProjectNotPublished,

    #[error("MapperLevelTooLow-Mapper level is below the level required by the project")]
    MapperLevelTooLow,

    #[error("UserAlreadyHasTaskLocked-User already has a task locked")]
    UserAlreadyHasTaskLocked,
}

/// Project service errors
#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("ProjectNotFound-Project not found")]
    NotFound,

    #[error(transparent)]
    Denied(#[from] AccessDenied),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ProjectError> for AppError {
    fn from(err: ProjectError) -> Self {
        match err {
            ProjectError::NotFound => AppError::not_found(ProjectError::NotFound),
            ProjectError::Denied(AccessDenied::LicenseNotAccepted) => AppError::LicenseNotAccepted,
            ProjectError::Denied(denied) => AppError::forbidden(denied),
            ProjectError::Store(e) => e,
        }
    }
}

/// Whether `user` may act as a manager of `project`.
pub fn manages(user: &User, project: &Project) -> bool {
    user.is_admin() || project.is_managed_by(user.id)
}

/// Project service trait
#[async_trait]
pub trait ProjectService: Send + Sync {
    /// Fail with `ProjectNotFound` unless the project exists.
    async fn exists(&self, project_id: i64) -> Result<(), ProjectError>;

    /// Check the user may lock a task for mapping on the project.
    async fn is_user_permitted_to_map(&self, project_id: i64, user_id: i64)
        -> Result<(), ProjectError>;

    /// Check the user may lock tasks for validation on the project.
    async fn is_user_permitted_to_validate(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), ProjectError>;
}

/// ProjectService implementation
pub struct ProjectServiceImpl<P, U, T>
where
    P: ProjectRepository,
    U: UserRepository,
    T: TaskRepository,
{
    project_repo: Arc<P>,
    user_repo: Arc<U>,
    task_repo: Arc<T>,
}

impl<P, U, T> ProjectServiceImpl<P, U, T>
where
    P: ProjectRepository,
    U: UserRepository,
    T: TaskRepository,
{
    pub fn new(project_repo: Arc<P>, user_repo: Arc<U>, task_repo: Arc<T>) -> Self {
        Self {
            project_repo,
            user_repo,
            task_repo,
        }
    }

    async fn load(&self, project_id: i64, user_id: i64) -> Result<(Project, User), ProjectError> {
        let project = self
            .project_repo
            .find_by_id(project_id)
            .await?
            .ok_or(ProjectError::NotFound)?;
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await?
            .ok_or(AccessDenied::UserNotAllowed)?;
        Ok((project, user))
    }

    /// Rules shared by mapping and validation.
    fn check_common(project: &Project, user: &User) -> Result<(), AccessDenied> {
        if user.role == UserRole::ReadOnly {
            return Err(AccessDenied::UserNotAllowed);
        }

        let is_manager = manages(user, project);
        if project.status != ProjectStatus::Published && !is_manager {
            return Err(AccessDenied::ProjectNotPublished);
        }

        if let Some(license_id) = project.license_id {
            if !user.has_accepted_license(license_id) {
                return Err(AccessDenied::LicenseNotAccepted);
            }
        }

        if !is_manager && user.mapping_level < project.mapper_level {
            return Err(AccessDenied::MapperLevelTooLow);
        }

        Ok(())
    }
}

#[async_trait]
impl<P, U, T> ProjectService for ProjectServiceImpl<P, U, T>
where
    P: ProjectRepository + 'static,
    U: UserRepository + 'static,
    T: TaskRepository + 'static,
{
    async fn exists(&self, project_id: i64) -> Result<(), ProjectError> {
        if self.project_repo.exists(project_id).await? {
            Ok(())
        } else {
            Err(ProjectError::NotFound)
        }
    }

    async fn is_user_permitted_to_map(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), ProjectError> {
        let (project, user) = self.load(project_id, user_id).await?;
        Self::check_common(&project, &user)?;

        let held = self.task_repo.find_locked_by_user(project_id, user_id).await?;
        if !held.is_empty() {
            return Err(AccessDenied::UserAlreadyHasTaskLocked.into());
        }
        Ok(())
    }

    async fn is_user_permitted_to_validate(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<(), ProjectError> {
        let (project, user) = self.load(project_id, user_id).await?;
        Self::check_common(&project, &user)?;
        Ok(())
    }
}
