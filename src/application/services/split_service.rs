//! Split Service
//!
//! Replaces a square grid task with the four tiles one zoom level deeper.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument};

use crate::domain::{Task, TaskRepository, TaskStatus};
use crate::shared::error::AppError;
use crate::shared::tiles::MAX_SPLIT_ZOOM;

/// Split service trait
#[async_trait]
pub trait SplitService: Send + Sync {
    /// Split a task the user has locked for mapping; returns the new tasks.
    async fn split_task(&self, dto: SplitTaskDto) -> Result<Vec<Task>, SplitError>;
}

/// Split a locked task
#[derive(Debug, Clone)]
pub struct SplitTaskDto {
    pub user_id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub preferred_locale: String,
}

/// Split service errors
#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("TaskNotFound-Task {0} not found")]
    TaskNotFound(i64),

    #[error("LockToSplit-User must have task locked to split it")]
    LockToSplit,

    #[error("SplitGeometryError-Only square grid tasks can be split")]
    SplitGeometryError,

    #[error("LargestZoom-Task {0} is already at the deepest zoom level")]
    LargestZoom(i64),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<SplitError> for AppError {
    fn from(err: SplitError) -> Self {
        match err {
            SplitError::TaskNotFound(id) => AppError::not_found(SplitError::TaskNotFound(id)),
            SplitError::Store(e) => e,
            other => AppError::forbidden(other),
        }
    }
}

/// SplitService implementation
pub struct SplitServiceImpl<T>
where
    T: TaskRepository,
{
    task_repo: Arc<T>,
}

impl<T> SplitServiceImpl<T>
where
    T: TaskRepository,
{
    pub fn new(task_repo: Arc<T>) -> Self {
        Self { task_repo }
    }

    /// READY children covering the parent's tile.
    fn children_of(task: &Task) -> Result<Vec<Task>, SplitError> {
        let tile = task
            .tile()
            .filter(|t| t.is_valid())
            .ok_or(SplitError::SplitGeometryError)?;
        if tile.zoom >= MAX_SPLIT_ZOOM {
            return Err(SplitError::LargestZoom(task.id));
        }

        Ok(tile
            .children()
            .iter()
            .map(|child| Task {
                id: 0,
                project_id: task.project_id,
                x: Some(child.x),
                y: Some(child.y),
                zoom: Some(child.zoom),
                is_square: true,
                geometry: child.to_geojson(),
                parent_task_id: Some(task.id),
                status: TaskStatus::Ready,
                ..Task::default()
            })
            .collect())
    }
}

#[async_trait]
impl<T> SplitService for SplitServiceImpl<T>
where
    T: TaskRepository + 'static,
{
    #[instrument(skip(self, dto), fields(project_id = dto.project_id, task_id = dto.task_id))]
    async fn split_task(&self, dto: SplitTaskDto) -> Result<Vec<Task>, SplitError> {
        let task = self
            .task_repo
            .find(dto.project_id, dto.task_id)
            .await?
            .ok_or(SplitError::TaskNotFound(dto.task_id))?;

        if task.status != TaskStatus::LockedForMapping || task.locked_by != Some(dto.user_id) {
            return Err(SplitError::LockToSplit);
        }

        let children = Self::children_of(&task)?;
        let created = self
            .task_repo
            .split(&task, children, dto.user_id)
            .await?
            // The lock was released or taken over since it was checked
            .ok_or(SplitError::LockToSplit)?;

        info!(count = created.len(), "Task split");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskAction;
    use crate::infrastructure::repositories::InMemoryTaskRepository;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn grid_task(id: i64, zoom: i32, status: TaskStatus, locked_by: Option<i64>) -> Task {
        Task {
            id,
            project_id: 1,
            x: Some(10),
            y: Some(20),
            zoom: Some(zoom),
            is_square: true,
            status,
            locked_by,
            ..Task::default()
        }
    }

    fn dto(task_id: i64, user_id: i64) -> SplitTaskDto {
        SplitTaskDto {
            user_id,
            project_id: 1,
            task_id,
            preferred_locale: "en".into(),
        }
    }

    #[tokio::test]
    async fn test_split_creates_four_ready_children() {
        let repo = Arc::new(InMemoryTaskRepository::with_tasks(vec![grid_task(
            1,
            12,
            TaskStatus::LockedForMapping,
            Some(5),
        )]));
        let svc = SplitServiceImpl::new(repo.clone());

        let created = svc.split_task(dto(1, 5)).await.unwrap();
        assert_eq!(created.len(), 4);
        assert!(created.iter().all(|t| t.status == TaskStatus::Ready));
        assert!(created.iter().all(|t| t.parent_task_id == Some(1)));
        assert_eq!(
            created.iter().map(|t| (t.x, t.y, t.zoom)).collect::<Vec<_>>(),
            vec![
                (Some(20), Some(40), Some(13)),
                (Some(21), Some(40), Some(13)),
                (Some(20), Some(41), Some(13)),
                (Some(21), Some(41), Some(13)),
            ]
        );
        assert!(repo.get(1, 1).is_none());

        let history = repo.history(1, created[0].id).await.unwrap();
        assert_eq!(history.last().unwrap().action, TaskAction::Split);
    }

    #[test_case(grid_task(1, 12, TaskStatus::Ready, None), 5 ; "not locked")]
    #[test_case(grid_task(1, 12, TaskStatus::LockedForMapping, Some(6)), 5 ; "locked by someone else")]
    #[test_case(grid_task(1, 12, TaskStatus::LockedForValidation, Some(5)), 5 ; "locked for validation")]
    #[tokio::test]
    async fn test_split_requires_own_mapping_lock(task: Task, user_id: i64) {
        let svc = SplitServiceImpl::new(Arc::new(InMemoryTaskRepository::with_tasks(vec![task])));
        let err = svc.split_task(dto(1, user_id)).await.unwrap_err();
        assert!(matches!(err, SplitError::LockToSplit));
    }

    #[tokio::test]
    async fn test_split_rejects_deepest_zoom_and_free_geometry() {
        let deep = grid_task(1, MAX_SPLIT_ZOOM, TaskStatus::LockedForMapping, Some(5));
        let free = Task { is_square: false, ..grid_task(2, 12, TaskStatus::LockedForMapping, Some(5)) };
        let svc = SplitServiceImpl::new(Arc::new(InMemoryTaskRepository::with_tasks(vec![deep, free])));

        assert!(matches!(svc.split_task(dto(1, 5)).await, Err(SplitError::LargestZoom(1))));
        assert!(matches!(svc.split_task(dto(2, 5)).await, Err(SplitError::SplitGeometryError)));
    }
}
