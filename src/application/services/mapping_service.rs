//! Mapping Service
//!
//! Locking, releasing and bulk state changes of tasks from the mapper side.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{info, instrument, warn};

use super::project_admin_service::ProjectAdminService;
use super::project_service::{ProjectError, ProjectService};
use crate::config::TaskSettings;
use crate::domain::services::TaskStateRules;
use crate::domain::{
    Task, TaskAction, TaskHistory, TaskLock, TaskRepository, TaskStatus, TaskUpdate,
};
use crate::shared::error::AppError;

/// Mapping service trait
#[async_trait]
pub trait MappingService: Send + Sync {
    /// Lock a READY or INVALIDATED task for mapping by the user.
    async fn lock_task_for_mapping(&self, dto: LockTaskDto) -> Result<Task, MappingError>;

    /// Release a mapping lock without changing the task's status.
    async fn stop_mapping_task(&self, dto: StopMappingTaskDto) -> Result<Task, MappingError>;

    /// Release a mapping lock and move the task to MAPPED, BADIMAGERY or READY.
    async fn unlock_task_after_mapping(&self, dto: MappedTaskDto) -> Result<Task, MappingError>;

    /// Revert the task's last state change.
    async fn undo_mapping(
        &self,
        project_id: i64,
        task_id: i64,
        user_id: i64,
    ) -> Result<Task, MappingError>;

    /// Push lock expiry of tasks the user holds forward by one lock duration.
    async fn extend_task_lock_time(&self, dto: ExtendLockTimeDto) -> Result<Vec<Task>, MappingError>;

    /// Mark every task not yet mapped as MAPPED.
    async fn map_all_tasks(&self, project_id: i64, user_id: i64) -> Result<usize, MappingError>;

    /// Move every BADIMAGERY task back to READY.
    async fn reset_all_badimagery(&self, project_id: i64, user_id: i64)
        -> Result<usize, MappingError>;

    /// Release every lock that expired before `now`.
    async fn auto_unlock_expired_tasks(&self, now: DateTime<Utc>) -> Result<usize, AppError>;
}

/// Lock a task for mapping
#[derive(Debug, Clone)]
pub struct LockTaskDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub preferred_locale: String,
}

/// Release a mapping lock
#[derive(Debug, Clone)]
pub struct StopMappingTaskDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub comment: Option<String>,
    pub preferred_locale: String,
}

/// Finish mapping a task
#[derive(Debug, Clone)]
pub struct MappedTaskDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub status: TaskStatus,
    pub comment: Option<String>,
}

/// Extend locks held by a user
#[derive(Debug, Clone)]
pub struct ExtendLockTimeDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_ids: Vec<i64>,
}

/// Mapping service errors
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("TaskNotFound-Task {0} not found")]
    TaskNotFound(i64),

    #[error("InvalidTaskState-Task in invalid state for mapping")]
    InvalidTaskState,

    #[error("LockNotFound-Task is not locked for mapping")]
    LockNotFound,

    #[error("TaskNotOwned-Attempting to unlock a task owned by another user")]
    TaskNotOwned,

    #[error("InvalidUnlockState-Cannot set status to {0}, allowed: MAPPED, BADIMAGERY, READY")]
    InvalidUnlockState(TaskStatus),

    #[error("UndoPermissionError-Undo not allowed for this user")]
    UndoPermissionError,

    #[error("TaskStatusNotLocked-Task {0} status is not LOCKED_FOR_MAPPING or LOCKED_FOR_VALIDATION")]
    TaskStatusNotLocked(i64),

    #[error("LockNotOwned-Task {0} is not locked by the user")]
    LockNotOwned(i64),

    #[error("UserPermissionError-User is not a manager of the project")]
    NotProjectManager,

    #[error("TaskStateChanged-Task was updated by another user, reload and try again")]
    TaskStateChanged,

    #[error(transparent)]
    Project(#[from] ProjectError),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<MappingError> for AppError {
    fn from(err: MappingError) -> Self {
        match err {
            MappingError::TaskNotFound(id) => AppError::not_found(MappingError::TaskNotFound(id)),
            MappingError::NotProjectManager => {
                AppError::UserPermission("User is not a manager of the project".into())
            }
            MappingError::Project(e) => e.into(),
            MappingError::Store(e) => e,
            other => AppError::forbidden(other),
        }
    }
}

/// MappingService implementation
pub struct MappingServiceImpl<T>
where
    T: TaskRepository,
{
    task_repo: Arc<T>,
    projects: Arc<dyn ProjectService>,
    project_admin: Arc<dyn ProjectAdminService>,
    settings: TaskSettings,
}

impl<T> MappingServiceImpl<T>
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

    async fn get_task(&self, project_id: i64, task_id: i64) -> Result<Task, MappingError> {
        self.task_repo
            .find(project_id, task_id)
            .await?
            .ok_or(MappingError::TaskNotFound(task_id))
    }

    /// The task must be locked for mapping by `user_id`.
    async fn get_owned_lock(
        &self,
        project_id: i64,
        task_id: i64,
        user_id: i64,
    ) -> Result<Task, MappingError> {
        let task = self.get_task(project_id, task_id).await?;
        if task.status != TaskStatus::LockedForMapping {
            return Err(MappingError::LockNotFound);
        }
        if task.locked_by != Some(user_id) {
            return Err(MappingError::TaskNotOwned);
        }
        Ok(task)
    }

    async fn require_manager(&self, project_id: i64, user_id: i64) -> Result<(), MappingError> {
        if self
            .project_admin
            .is_user_action_permitted_on_project(user_id, project_id)
            .await?
        {
            Ok(())
        } else {
            Err(MappingError::NotProjectManager)
        }
    }

    /// Persist one update, failing with `changed` if the row moved on since it was read.
    async fn save(&self, update: TaskUpdate, changed: MappingError) -> Result<Task, MappingError> {
        self.task_repo
            .save_all(vec![update])
            .await?
            .and_then(|mut saved| saved.pop())
            .ok_or(changed)
    }
}

/// A COMMENT entry when a non-blank comment was given.
pub(crate) fn comment_entry(task: &Task, comment: Option<&str>, user_id: i64) -> Option<TaskHistory> {
    comment
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| TaskHistory::comment(task, c, user_id))
}

#[async_trait]
impl<T> MappingService for MappingServiceImpl<T>
where
    T: TaskRepository + 'static,
{
    #[instrument(skip(self, dto), fields(project_id = dto.project_id, task_id = dto.task_id))]
    async fn lock_task_for_mapping(&self, dto: LockTaskDto) -> Result<Task, MappingError> {
        let task = self.get_task(dto.project_id, dto.task_id).await?;
        if !TaskStatus::MAPPABLE.contains(&task.status) {
            return Err(MappingError::InvalidTaskState);
        }

        self.projects
            .is_user_permitted_to_map(dto.project_id, dto.user_id)
            .await?;

        let lock = TaskLock {
            status: TaskStatus::LockedForMapping,
            user_id: dto.user_id,
            expires_at: Utc::now() + self.settings.lock_duration(),
        };
        let locked = self
            .task_repo
            .lock_tasks(dto.project_id, &[dto.task_id], &TaskStatus::MAPPABLE, lock)
            .await?
            .and_then(|mut tasks| tasks.pop())
            // Another user locked the task after our status check
            .ok_or(MappingError::InvalidTaskState)?;

        info!(user_id = dto.user_id, "Task locked for mapping");
        Ok(locked)
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id, task_id = dto.task_id))]
    async fn stop_mapping_task(&self, dto: StopMappingTaskDto) -> Result<Task, MappingError> {
        let mut task = self
            .get_owned_lock(dto.project_id, dto.task_id, dto.user_id)
            .await?;

        let history = self.task_repo.history(dto.project_id, dto.task_id).await?;
        let last_status = TaskStateRules::last_status(&history);

        let expected = task.guard();
        let entries: Vec<TaskHistory> =
            comment_entry(&task, dto.comment.as_deref(), dto.user_id).into_iter().collect();
        task.set_status(last_status);
        self.save(TaskUpdate::new(expected, task, entries), MappingError::LockNotFound)
            .await
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id, task_id = dto.task_id))]
    async fn unlock_task_after_mapping(&self, dto: MappedTaskDto) -> Result<Task, MappingError> {
        if !matches!(
            dto.status,
            TaskStatus::Mapped | TaskStatus::BadImagery | TaskStatus::Ready
        ) {
            return Err(MappingError::InvalidUnlockState(dto.status));
        }

        let mut task = self
            .get_owned_lock(dto.project_id, dto.task_id, dto.user_id)
            .await?;

        let expected = task.guard();
        let mut entries: Vec<TaskHistory> =
            comment_entry(&task, dto.comment.as_deref(), dto.user_id).into_iter().collect();
        entries.push(TaskHistory::state_change(&task, dto.status, dto.user_id));

        task.mapped_by = match dto.status {
            TaskStatus::Mapped | TaskStatus::BadImagery => Some(dto.user_id),
            _ => None,
        };
        task.set_status(dto.status);

        let saved = self
            .save(TaskUpdate::new(expected, task, entries), MappingError::LockNotFound)
            .await?;
        info!(status = %dto.status, "Task unlocked after mapping");
        Ok(saved)
    }

    #[instrument(skip(self))]
    async fn undo_mapping(
        &self,
        project_id: i64,
        task_id: i64,
        user_id: i64,
    ) -> Result<Task, MappingError> {
        let mut task = self.get_task(project_id, task_id).await?;
        if task.status.is_locked() || task.status == TaskStatus::Ready {
            return Err(MappingError::UndoPermissionError);
        }

        let history = self.task_repo.history(project_id, task_id).await?;
        let (last, previous) =
            TaskStateRules::last_change(&history).ok_or(MappingError::UndoPermissionError)?;

        if last.user_id != user_id {
            match self
                .projects
                .is_user_permitted_to_validate(project_id, user_id)
                .await
            {
                Ok(()) => {}
                Err(ProjectError::Store(e)) => return Err(e.into()),
                Err(_) => return Err(MappingError::UndoPermissionError),
            }
        }

        let expected = task.guard();
        let current = task.status;
        let entries = vec![
            TaskHistory::comment(
                &task,
                &format!("Undo state from {} to {}", current, previous),
                user_id,
            ),
            TaskHistory::state_change(&task, previous, user_id),
        ];

        if current == TaskStatus::Validated {
            task.validated_by = None;
        }
        if previous == TaskStatus::Ready {
            task.mapped_by = None;
        }
        task.set_status(previous);
        self.save(TaskUpdate::new(expected, task, entries), MappingError::TaskStateChanged)
            .await
    }

    #[instrument(skip(self, dto), fields(project_id = dto.project_id))]
    async fn extend_task_lock_time(&self, dto: ExtendLockTimeDto) -> Result<Vec<Task>, MappingError> {
        let mut tasks = Vec::with_capacity(dto.task_ids.len());
        for task_id in &dto.task_ids {
            let task = self.get_task(dto.project_id, *task_id).await?;
            if !task.status.is_locked() {
                return Err(MappingError::TaskStatusNotLocked(*task_id));
            }
            if task.locked_by != Some(dto.user_id) {
                return Err(MappingError::LockNotOwned(*task_id));
            }
            tasks.push(task);
        }

        let expires_at = Utc::now() + self.settings.lock_duration();
        let updates = tasks
            .into_iter()
            .map(|mut task| {
                let action = match task.status {
                    TaskStatus::LockedForValidation => TaskAction::ExtendedForValidation,
                    _ => TaskAction::ExtendedForMapping,
                };
                let expected = task.guard();
                let entry = TaskHistory::new(&task, action, None, dto.user_id);
                task.lock_expires_at = Some(expires_at);
                TaskUpdate::new(expected, task, vec![entry])
            })
            .collect();

        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(MappingError::LockNotFound)
    }

    #[instrument(skip(self))]
    async fn map_all_tasks(&self, project_id: i64, user_id: i64) -> Result<usize, MappingError> {
        self.require_manager(project_id, user_id).await?;

        let updates: Vec<TaskUpdate> = self
            .task_repo
            .find_by_project(project_id)
            .await?
            .into_iter()
            .filter(|t| {
                !matches!(
                    t.status,
                    TaskStatus::BadImagery | TaskStatus::Mapped | TaskStatus::Validated
                )
            })
            .map(|mut task| {
                let expected = task.guard();
                let entry = TaskHistory::state_change(&task, TaskStatus::Mapped, user_id);
                task.mapped_by = Some(user_id);
                task.set_status(TaskStatus::Mapped);
                TaskUpdate::new(expected, task, vec![entry])
            })
            .collect();

        let count = updates.len();
        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(MappingError::TaskStateChanged)?;
        info!(count, "All tasks mapped");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn reset_all_badimagery(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<usize, MappingError> {
        self.require_manager(project_id, user_id).await?;

        let updates: Vec<TaskUpdate> = self
            .task_repo
            .find_by_project(project_id)
            .await?
            .into_iter()
            .filter(|t| t.status == TaskStatus::BadImagery)
            .map(|mut task| {
                let expected = task.guard();
                let entry = TaskHistory::state_change(&task, TaskStatus::Ready, user_id);
                task.mapped_by = None;
                task.set_status(TaskStatus::Ready);
                TaskUpdate::new(expected, task, vec![entry])
            })
            .collect();

        let count = updates.len();
        self.task_repo
            .save_all(updates)
            .await?
            .ok_or(MappingError::TaskStateChanged)?;
        info!(count, "All bad imagery tasks marked ready for mapping");
        Ok(count)
    }

    #[instrument(skip(self))]
    async fn auto_unlock_expired_tasks(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let expired = self.task_repo.find_expired_locks(now).await?;

        // One write per task so a lock renewed meanwhile only skips that task.
        let mut count = 0;
        for mut task in expired {
            let history = self.task_repo.history(task.project_id, task.id).await?;
            let action = match task.status {
                TaskStatus::LockedForValidation => TaskAction::AutoUnlockedForValidation,
                _ => TaskAction::AutoUnlockedForMapping,
            };
            let expected = task.guard();
            let holder = task.locked_by.unwrap_or_default();
            let entry = TaskHistory::new(&task, action, None, holder);
            let (project_id, task_id) = (task.project_id, task.id);
            task.set_status(TaskStateRules::last_status(&history));

            let update = TaskUpdate::new(expected, task, vec![entry]);
            match self.task_repo.save_all(vec![update]).await? {
                Some(_) => count += 1,
                None => warn!(project_id, task_id, "Expired lock changed before release"),
            }
        }

        if count > 0 {
            info!(count, "Expired task locks released");
        }
        Ok(count)
    }
}
