//! Project Admin Service
//!
//! Manager permission checks and project-wide task resets.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use super::project_service::manages;
use crate::domain::{
    ProjectRepository, TaskHistory, TaskRepository, TaskStatus, TaskUpdate, UserRepository,
};
use crate::infrastructure::cache::{cached_or_else, ManagerPermissionCache};
use crate::shared::error::AppError;

/// Project admin service trait
#[async_trait]
pub trait ProjectAdminService: Send + Sync {
    /// True when the user is an admin, the project author or one of its managers.
    ///
    /// Unknown users and projects yield `false`.
    async fn is_user_action_permitted_on_project(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<bool, AppError>;

    /// Return every task of the project to READY. History is preserved.
    async fn reset_all_tasks(&self, project_id: i64, user_id: i64) -> Result<usize, AppError>;
}

/// ProjectAdminService implementation
pub struct ProjectAdminServiceImpl<P, U, T>
where
    P: ProjectRepository,
    U: UserRepository,
    T: TaskRepository,
{
    project_repo: Arc<P>,
    user_repo: Arc<U>,
    task_repo: Arc<T>,
    cache: Arc<dyn ManagerPermissionCache>,
}

impl<P, U, T> ProjectAdminServiceImpl<P, U, T>
where
    P: ProjectRepository,
    U: UserRepository,
    T: TaskRepository,
{
    pub fn new(
        project_repo: Arc<P>,
        user_repo: Arc<U>,
        task_repo: Arc<T>,
        cache: Arc<dyn ManagerPermissionCache>,
    ) -> Self {
        Self {
            project_repo,
            user_repo,
            task_repo,
            cache,
        }
    }

    async fn compute_permission(&self, user_id: i64, project_id: i64) -> Result<bool, AppError> {
        let Some(user) = self.user_repo.find_by_id(user_id).await? else {
            return Ok(false);
        };
        if user.is_admin() {
            return Ok(true);
        }
        let Some(project) = self.project_repo.find_by_id(project_id).await? else {
            return Ok(false);
        };
        Ok(manages(&user, &project))
    }
}

#[async_trait]
impl<P, U, T> ProjectAdminService for ProjectAdminServiceImpl<P, U, T>
where
    P: ProjectRepository + 'static,
    U: UserRepository + 'static,
    T: TaskRepository + 'static,
{
    async fn is_user_action_permitted_on_project(
        &self,
        user_id: i64,
        project_id: i64,
    ) -> Result<bool, AppError> {
        let permitted = cached_or_else(self.cache.as_ref(), user_id, project_id, || {
            self.compute_permission(user_id, project_id)
        })
        .await?;
        debug!(user_id, project_id, permitted, "Project manager check");
        Ok(permitted)
    }

    #[instrument(skip(self))]
    async fn reset_all_tasks(&self, project_id: i64, user_id: i64) -> Result<usize, AppError> {
        let updates: Vec<TaskUpdate> = self
            .task_repo
            .find_by_project(project_id)
            .await?
            .into_iter()
            .filter(|t| {
                t.status != TaskStatus::Ready
                    || t.mapped_by.is_some()
                    || t.validated_by.is_some()
            })
            .map(|mut task| {
                let expected = task.guard();
                let entry = TaskHistory::state_change(&task, TaskStatus::Ready, user_id);
                task.mapped_by = None;
                task.validated_by = None;
                task.set_status(TaskStatus::Ready);
                TaskUpdate::new(expected, task, vec![entry])
            })
            .collect();

        let count = updates.len();
        if self.task_repo.save_all(updates).await?.is_none() {
            return Err(AppError::forbidden(
                "TaskStateChanged-Task was updated by another user, reload and try again",
            ));
        }
        info!(count, "All tasks reset");
        Ok(count)
    }
}
