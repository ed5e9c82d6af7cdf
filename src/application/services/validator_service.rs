//! Validator Service
//!
//! Locking and releasing tasks for validation, bulk validation changes and
//! reverting a user's work.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};

use super::mapping_service::comment_entry;
use super::project_admin_service::ProjectAdminService;
use super::project_service::{ProjectError, ProjectService};
use crate::config::TaskSettings;
use crate::domain::services::TaskStateRules;
use crate::domain::{Task, TaskHistory, TaskLock, TaskRepository, TaskStatus, TaskUpdate};
use crate::shared::error::AppError;

/// Validator service trait
#[async_trait]
pub trait ValidatorService: Send + Sync {
    /// Lock every listed task for validation, or none of them.
    async fn lock_tasks_for_validation(
        &self,
        dto: LockForValidationDto,
    ) -> Result<Vec<Task>, ValidationError>;

    /// Release validation locks, returning tasks to their previous status.
    async fn stop_validating_tasks(&self, dto: StopValidationDto)
        -> Result<Vec<Task>, ValidationError>;

    /// Release validation locks, marking tasks VALIDATED or INVALIDATED.
    async fn unlock_tasks_after_validation(
        &self,
        dto: UnlockAfterValidationDto,
    ) -> Result<Vec<Task>, ValidationError>;

    /// Mark every task that is not bad imagery as VALIDATED.
    async fn validate_all_tasks(&self, project_id: i64, user_id: i64)
        -> Result<usize, ValidationError>;

    /// Move every VALIDATED task to INVALIDATED.
    async fn invalidate_all_tasks(&self, project_id: i64, user_id: i64)
        -> Result<usize, ValidationError>;

    /// Revert tasks a user marked bad imagery or validated.
    async fn revert_user_tasks(&self, dto: RevertUserTasksDto) -> Result<usize, ValidationError>;
}

/// Lock tasks for validation
#[derive(Debug, Clone)]
pub struct LockForValidationDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_ids: Vec<i64>,
    pub preferred_locale: String,
}

/// A task released without a status change
#[derive(Debug, Clone)]
pub struct ResetValidatingTask {
    pub task_id: i64,
    pub comment: Option<String>,
}

/// Release validation locks
#[derive(Debug, Clone)]
pub struct StopValidationDto {
    pub user_id: i64,
    pub project_id: i64,
    pub reset_tasks: Vec<ResetValidatingTask>,
    pub preferred_locale: String,
}

/// Outcome of validating one task
#[derive(Debug, Clone)]
pub struct ValidatedTask {
    pub task_id: i64,
    pub status: TaskStatus,
    pub comment: Option<String>,
}

/// Finish validating tasks
#[derive(Debug, Clone)]
pub struct UnlockAfterValidationDto {
    pub user_id: i64,
    pub project_id: i64,
    pub validated_tasks: Vec<ValidatedTask>,
    pub preferred_locale: String,
}

/// Revert another user's tasks
#[derive(Debug, Clone)]
pub struct RevertUserTasksDto {
    pub project_id: i64,
    /// User whose work is reverted
    pub user_id: i64,
    /// BADIMAGERY or VALIDATED
    pub action: TaskStatus,
    pub action_by: i64,
}

/// Validator service errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("TaskNotFound-Task {0} not found")]
    TaskNotFound(i64),

    #[error("NotReadyForValidation-Task {0} is not ready for validation")]
    NotReadyForValidation(i64),

    #[error("CannotValidateMappedTask-Tasks cannot be validated by the same user who marked task as mapped or badimagery")]
    CannotValidateMappedTask,

    #[error("TasksNoLongerAvailable-One or more tasks were locked by another user")]
    TasksNoLongerAvailable,

    #[error("NotLockedForValidation-Task {0} is not locked for validation")]
    NotLockedForValidation(i64),

    #[error("TaskNotOwned-Attempting to unlock a task owned by another user")]
    TaskNotOwned(i64),

    #[error("InvalidUnlockState-Cannot set status to {0}, allowed: VALIDATED, INVALIDATED")]
    InvalidUnlockState(TaskStatus),

    #[error("InvalidRevertAction-Cannot revert {0}, allowed: BADIMAGERY, VALIDATED")]
    InvalidRevertAction(TaskStatus),

    #[error("RevertNotPermitted-User must be a project manager to revert tasks")]
    RevertNotPermitted,

    #[error("UserPermissionError-User is not a manager of the project")]
    NotProjectManager,

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::TaskNotFound(id) => {
                AppError::not_found(ValidationError::TaskNotFound(id))
            }
            ValidationError::NotProjectManager => {
                AppError::UserPermission("User is not a manager of the project".into())
            }
            ValidationError::Project(e) => e.into(),
            ValidationError::Store(e) => e,
            other => AppError::forbidden(other),
        }
    }
}

/// ValidatorService implementation
pub struct ValidatorServiceImpl<T>
where
    T: TaskRepository,
{
    task_repo: Arc<T>,
    projects: Arc<dyn ProjectService>,
    project_admin: Arc<dyn ProjectAdminService>,
    settings: TaskSettings,
}

impl<T> ValidatorServiceImpl<T>
where
    T: TaskRepository,
{
    pub fn new(
        task_repo: Arc<T>,
        projects: Arc<dyn ProjectService>,
        project_admin: Arc<dyn ProjectAdminService>,
        settings: TaskSettings,
    ) -> Self {
        Self {
            task_repo,
            projects,
            project_admin,
            settings,
        }
    }

    async fn get_task(&self, project_id: i64, task_id: i64) -> Result<Task, ValidationError> {
        self.task_repo
            .find(project_id, task_id)
            .await?
            .ok_or(ValidationError::TaskNotFound(task_id))
    }

    /// The task must be locked for validation by `user_id`.
    async fn get_owned_lock(
        &self,
        project_id: i64,
        task_id: i64,
        user_id: i64,
    ) -> Result<Task, ValidationError> {
        let task = self.get_task(project_id, task_id).await?;
        if task.status != TaskStatus::LockedForValidation {
            return Err(ValidationError::NotLockedForValidation(task_id));
        }
        if task.locked_by != Some(user_id) {
            return Err(ValidationError::TaskNotOwned(task_id));
        }
        Ok(task)
    }

    async fn is_manager(&self, project_id: i64, user_id: i64) -> Result<bool, ValidationError> {
        Ok(self
            .project_admin
            .is_user_action_permitted_on_project(user_id, project_id)
            .await?)
    }

    /// Apply `change` to every task of the project matching `filter`.
    async fn bulk_change<F, C>(
        &self,
        project_id: i64,
        filter: F,
        change: C,
    ) -> Result<usize, ValidationError>
    where
        F: Fn(&Task) -> bool + Send,
        C: Fn(&mut Task) -> TaskHistory + Send,
    {
        let updates: Vec<TaskUpdate> = self
            .task_repo
            .find_by_project(project_id)
            .await?
            .into_iter()
            .filter(|t| filter(t))
            .map(|mut task| {
                let expected = task.guard();
                let entry = change(&mut task);
                TaskUpdate::new(expected, task, vec![entry])
            })
            .collect();

        let count = updates.len();
        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(ValidationError::TasksNoLongerAvailable)?;
        Ok(count)
    }
}

#[async_trait]
impl<T> ValidatorService for ValidatorServiceImpl<T>
where
    T: TaskRepository + 'static,
{
    #[instrument(skip(self, dto), fields(project_id = dto.project_id, tasks = dto.task_ids.len()))]
    async fn lock_tasks_for_validation(
        &self,
        dto: LockForValidationDto,
    ) -> Result<Vec<Task>, ValidationError> {
        let is_manager = self.is_manager(dto.project_id, dto.user_id).await?;

        for task_id in &dto.task_ids {
            let task = self.get_task(dto.project_id, *task_id).await?;
            if !TaskStatus::VALIDATABLE.contains(&task.status) {
                return Err(ValidationError::NotReadyForValidation(*task_id));
            }
            if !is_manager && task.mapped_by == Some(dto.user_id) {
                return Err(ValidationError::CannotValidateMappedTask);
            }
        }

        self.projects
            .is_user_permitted_to_validate(dto.project_id, dto.user_id)
            .await?;

        let lock = TaskLock {
            status: TaskStatus::LockedForValidation,
            user_id: dto.user_id,
            expires_at: Utc::now() + self.settings.lock_duration(),
        };
        let locked = self
            .task_repo
            .lock_tasks(dto.project_id, &dto.task_ids, &TaskStatus::VALIDATABLE, lock)
            .await?
            .ok_or(ValidationError::TasksNoLongerAvailable)?;

        info!(user_id = dto.user_id, "Tasks locked for validation");
        Ok(locked)
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id))]
    async fn stop_validating_tasks(
        &self,
        dto: StopValidationDto,
    ) -> Result<Vec<Task>, ValidationError> {
        let mut owned = Vec::with_capacity(dto.reset_tasks.len());
        for reset in &dto.reset_tasks {
            let task = self
                .get_owned_lock(dto.project_id, reset.task_id, dto.user_id)
                .await?;
            owned.push((task, reset.comment.as_deref()));
        }

        let mut updates = Vec::with_capacity(owned.len());
        for (mut task, comment) in owned {
            let history = self.task_repo.history(dto.project_id, task.id).await?;
            let expected = task.guard();
            let entries: Vec<TaskHistory> =
                comment_entry(&task, comment, dto.user_id).into_iter().collect();
            task.set_status(TaskStateRules::last_status(&history));
            updates.push(TaskUpdate::new(expected, task, entries));
        }

        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(ValidationError::TasksNoLongerAvailable)
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id))]
    async fn unlock_tasks_after_validation(
        &self,
        dto: UnlockAfterValidationDto,
    ) -> Result<Vec<Task>, ValidationError> {
        let mut owned = Vec::with_capacity(dto.validated_tasks.len());
        for validated in &dto.validated_tasks {
            if !matches!(
                validated.status,
                TaskStatus::Validated | TaskStatus::Invalidated
            ) {
                return Err(ValidationError::InvalidUnlockState(validated.status));
            }
            let task = self
                .get_owned_lock(dto.project_id, validated.task_id, dto.user_id)
                .await?;
            owned.push((task, validated));
        }

        let updates = owned
            .into_iter()
            .map(|(mut task, validated)| {
                let expected = task.guard();
                let mut entries: Vec<TaskHistory> =
                    comment_entry(&task, validated.comment.as_deref(), dto.user_id)
                        .into_iter()
                        .collect();
                entries.push(TaskHistory::state_change(&task, validated.status, dto.user_id));

                task.validated_by = match validated.status {
                    TaskStatus::Validated => Some(dto.user_id),
                    _ => None,
                };
                task.set_status(validated.status);
                TaskUpdate::new(expected, task, entries)
            })
            .collect();

        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(ValidationError::TasksNoLongerAvailable)
    }

    #[instrument(skip(self))]
    async fn validate_all_tasks(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<usize, ValidationError> {
        if !self.is_manager(project_id, user_id).await? {
            return Err(ValidationError::NotProjectManager);
        }

        let count = self
            .bulk_change(
                project_id,
                |t| !matches!(t.status, TaskStatus::BadImagery | TaskStatus::Validated),
                |task| {
                    let entry = TaskHistory::state_change(task, TaskStatus::Validated, user_id);
                    task.mapped_by = task.mapped_by.or(Some(user_id));
                    task.validated_by = Some(user_id);
                    task.set_status(TaskStatus::Validated);
                    entry
                },
            )
            .await?;
        info!(count, "All tasks validated");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn invalidate_all_tasks(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<usize, ValidationError> {
        if !self.is_manager(project_id, user_id).await? {
            return Err(ValidationError::NotProjectManager);
        }

        let count = self
            .bulk_change(
                project_id,
                |t| t.status == TaskStatus::Validated,
                |task| {
                    let entry = TaskHistory::state_change(task, TaskStatus::Invalidated, user_id);
                    task.validated_by = None;
                    task.set_status(TaskStatus::Invalidated);
                    entry
                },
            )
            .await?;
        info!(count, "All tasks invalidated");
        Ok(count)
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id, target = dto.user_id))]
    async fn revert_user_tasks(&self, dto: RevertUserTasksDto) -> Result<usize, ValidationError> {
        if !self.is_manager(dto.project_id, dto.action_by).await? {
            return Err(ValidationError::RevertNotPermitted);
        }

        let target = dto.user_id;
        let action_by = dto.action_by;
        let count = match dto.action {
            TaskStatus::BadImagery => {
                self.bulk_change(
                    dto.project_id,
                    |t| t.status == TaskStatus::BadImagery && t.mapped_by == Some(target),
                    |task| {
                        let entry = TaskHistory::state_change(task, TaskStatus::Ready, action_by);
                        task.mapped_by = None;
                        task.set_status(TaskStatus::Ready);
                        entry
                    },
                )
                .await?
            }
            TaskStatus::Validated => {
                self.bulk_change(
                    dto.project_id,
                    |t| t.status == TaskStatus::Validated && t.validated_by == Some(target),
                    |task| {
                        let entry = TaskHistory::state_change(task, TaskStatus::Mapped, action_by);
                        task.validated_by = None;
                        task.set_status(TaskStatus::Mapped);
                        entry
                    },
                )
                .await?
            }
            other => return Err(ValidationError::InvalidRevertAction(other)),
        };

        info!(count, "User tasks reverted");
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::testing::{fixture, Fixture, ADMIN, MAPPER, PROJECT, VALIDATOR};
    use crate::infrastructure::repositories::InMemoryTaskRepository;
    use pretty_assertions::assert_eq;

    fn service(fx: &Fixture) -> ValidatorServiceImpl<InMemoryTaskRepository> {
        ValidatorServiceImpl::new(
            fx.tasks.clone(),
            fx.project_service(),
            fx.project_admin_service(),
            TaskSettings::default(),
        )
    }

    fn lock_dto(task_ids: Vec<i64>, user_id: i64) -> LockForValidationDto {
        LockForValidationDto {
            user_id,
            project_id: PROJECT,
            task_ids,
            preferred_locale: "en".into(),
        }
    }

    #[tokio::test]
    async fn test_lock_and_validate() {
        let fx = fixture();
        fx.mark_mapped(1, MAPPER);
        fx.mark_mapped(2, MAPPER);
        let svc = service(&fx);

        let locked = svc.lock_tasks_for_validation(lock_dto(vec![1, 2], VALIDATOR)).await.unwrap();
        assert_eq!(locked.len(), 2);
        assert!(locked.iter().all(|t| t.is_locked_by(VALIDATOR)));

        let done = svc
            .unlock_tasks_after_validation(UnlockAfterValidationDto {
                user_id: VALIDATOR,
                project_id: PROJECT,
                validated_tasks: vec![
                    ValidatedTask { task_id: 1, status: TaskStatus::Validated, comment: None },
                    ValidatedTask {
                        task_id: 2,
                        status: TaskStatus::Invalidated,
                        comment: Some("missing buildings".into()),
                    },
                ],
                preferred_locale: "en".into(),
            })
            .await
            .unwrap();
        assert_eq!(done[0].status, TaskStatus::Validated);
        assert_eq!(done[0].validated_by, Some(VALIDATOR));
        assert_eq!(done[1].status, TaskStatus::Invalidated);
        assert_eq!(done[1].validated_by, None);
    }

    #[tokio::test]
    async fn test_lock_is_all_or_none() {
        let fx = fixture();
        fx.mark_mapped(1, MAPPER);
        let err = service(&fx)
            .lock_tasks_for_validation(lock_dto(vec![1, 2], VALIDATOR))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::NotReadyForValidation(2)));
        assert_eq!(fx.status(1), TaskStatus::Mapped);
    }

    #[tokio::test]
    async fn test_mapper_cannot_validate_own_task() {
        let fx = fixture();
        fx.mark_mapped(1, MAPPER);
        let err = service(&fx)
            .lock_tasks_for_validation(lock_dto(vec![1], MAPPER))
            .await
            .unwrap_err();
        assert!(matches!(err, ValidationError::CannotValidateMappedTask));

        // Managers may validate their own work
        fx.mark_mapped(2, ADMIN);
        assert!(service(&fx)
            .lock_tasks_for_validation(lock_dto(vec![2], ADMIN))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_stop_validating_requires_owner() {
        let fx = fixture();
        fx.mark_mapped(1, MAPPER);
        let svc = service(&fx);
        svc.lock_tasks_for_validation(lock_dto(vec![1], VALIDATOR)).await.unwrap();

        let stop = |user_id| StopValidationDto {
            user_id,
            project_id: PROJECT,
            reset_tasks: vec![ResetValidatingTask { task_id: 1, comment: None }],
            preferred_locale: "en".into(),
        };
        assert!(matches!(
            svc.stop_validating_tasks(stop(ADMIN)).await,
            Err(ValidationError::TaskNotOwned(1))
        ));

        let released = svc.stop_validating_tasks(stop(VALIDATOR)).await.unwrap();
        assert_eq!(released[0].status, TaskStatus::Mapped);
    }

    #[tokio::test]
    async fn test_bulk_validate_and_invalidate() {
        let fx = fixture();
        fx.set_status(1, TaskStatus::BadImagery);
        fx.mark_mapped(2, MAPPER);
        let svc = service(&fx);

        assert!(matches!(
            svc.validate_all_tasks(PROJECT, MAPPER).await,
            Err(ValidationError::NotProjectManager)
        ));

        assert_eq!(svc.validate_all_tasks(PROJECT, ADMIN).await.unwrap(), 3);
        assert_eq!(fx.status(1), TaskStatus::BadImagery);
        assert_eq!(fx.tasks.get(PROJECT, 2).unwrap().mapped_by, Some(MAPPER));

        assert_eq!(svc.invalidate_all_tasks(PROJECT, ADMIN).await.unwrap(), 3);
        assert_eq!(fx.status(2), TaskStatus::Invalidated);
        assert_eq!(fx.status(1), TaskStatus::BadImagery);
    }

    #[tokio::test]
    async fn test_revert_user_tasks() {
        let fx = fixture();
        fx.set_status(1, TaskStatus::BadImagery);
        fx.tasks.insert(Task {
            mapped_by: Some(MAPPER),
            ..fx.tasks.get(PROJECT, 1).unwrap()
        });
        fx.mark_mapped(2, MAPPER);
        let svc = service(&fx);

        let dto = |action, action_by| RevertUserTasksDto {
            project_id: PROJECT,
            user_id: MAPPER,
            action,
            action_by,
        };

        assert!(matches!(
            svc.revert_user_tasks(dto(TaskStatus::BadImagery, VALIDATOR)).await,
            Err(ValidationError::RevertNotPermitted)
        ));

        let count = svc.revert_user_tasks(dto(TaskStatus::BadImagery, ADMIN)).await.unwrap();
        assert_eq!(count, 1);
        assert_eq!(fx.status(1), TaskStatus::Ready);
        assert_eq!(fx.status(2), TaskStatus::Mapped);
    }
}
