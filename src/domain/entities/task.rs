//! Task entity, task history, and repository trait.
//!
//! Maps to the `tasks` and `task_history` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::error::AppError;
use crate::shared::tiles::Tile;

/// Task status, stored as a SMALLINT (0..=6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "LOCKED_FOR_MAPPING")]
    LockedForMapping,
    #[serde(rename = "LOCKED_FOR_VALIDATION")]
    LockedForValidation,
    #[serde(rename = "MAPPED")]
    Mapped,
    #[serde(rename = "VALIDATED")]
    Validated,
    #[serde(rename = "INVALIDATED")]
    Invalidated,
    #[serde(rename = "BADIMAGERY")]
    BadImagery,
}

impl TaskStatus {
    pub fn from_i16(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::Ready),
            1 => Some(Self::LockedForMapping),
            2 => Some(Self::LockedForValidation),
            3 => Some(Self::Mapped),
            4 => Some(Self::Validated),
            5 => Some(Self::Invalidated),
            6 => Some(Self::BadImagery),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> i16 {
        match self {
            Self::Ready => 0,
            Self::LockedForMapping => 1,
            Self::LockedForValidation => 2,
            Self::Mapped => 3,
            Self::Validated => 4,
            Self::Invalidated => 5,
            Self::BadImagery => 6,
        }
    }

    /// Parse the wire/history name (e.g. `"BADIMAGERY"`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "READY" => Some(Self::Ready),
            "LOCKED_FOR_MAPPING" => Some(Self::LockedForMapping),
            "LOCKED_FOR_VALIDATION" => Some(Self::LockedForValidation),
            "MAPPED" => Some(Self::Mapped),
            "VALIDATED" => Some(Self::Validated),
            "INVALIDATED" => Some(Self::Invalidated),
            "BADIMAGERY" => Some(Self::BadImagery),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ready => "READY",
            Self::LockedForMapping => "LOCKED_FOR_MAPPING",
            Self::LockedForValidation => "LOCKED_FOR_VALIDATION",
            Self::Mapped => "MAPPED",
            Self::Validated => "VALIDATED",
            Self::Invalidated => "INVALIDATED",
            Self::BadImagery => "BADIMAGERY",
        }
    }

    pub fn is_locked(&self) -> bool {
        matches!(self, Self::LockedForMapping | Self::LockedForValidation)
    }

    /// Statuses a mapper may lock a task from.
    pub const MAPPABLE: [TaskStatus; 2] = [TaskStatus::Ready, TaskStatus::Invalidated];

    /// Statuses a validator may lock a task from.
    pub const VALIDATABLE: [TaskStatus; 3] =
        [TaskStatus::Mapped, TaskStatus::Invalidated, TaskStatus::BadImagery];
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kinds of task history entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskAction {
    LockedForMapping,
    LockedForValidation,
    StateChange,
    Comment,
    AutoUnlockedForMapping,
    AutoUnlockedForValidation,
    ExtendedForMapping,
    ExtendedForValidation,
    Split,
}

impl TaskAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LockedForMapping => "LOCKED_FOR_MAPPING",
            Self::LockedForValidation => "LOCKED_FOR_VALIDATION",
            Self::StateChange => "STATE_CHANGE",
            Self::Comment => "COMMENT",
            Self::AutoUnlockedForMapping => "AUTO_UNLOCKED_FOR_MAPPING",
            Self::AutoUnlockedForValidation => "AUTO_UNLOCKED_FOR_VALIDATION",
            Self::ExtendedForMapping => "EXTENDED_FOR_MAPPING",
            Self::ExtendedForValidation => "EXTENDED_FOR_VALIDATION",
            Self::Split => "SPLIT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOCKED_FOR_MAPPING" => Some(Self::LockedForMapping),
            "LOCKED_FOR_VALIDATION" => Some(Self::LockedForValidation),
            "STATE_CHANGE" => Some(Self::StateChange),
            "COMMENT" => Some(Self::Comment),
            "AUTO_UNLOCKED_FOR_MAPPING" => Some(Self::AutoUnlockedForMapping),
            "AUTO_UNLOCKED_FOR_VALIDATION" => Some(Self::AutoUnlockedForValidation),
            "EXTENDED_FOR_MAPPING" => Some(Self::ExtendedForMapping),
            "EXTENDED_FOR_VALIDATION" => Some(Self::ExtendedForValidation),
            "SPLIT" => Some(Self::Split),
            _ => None,
        }
    }
}

/// A mapping work unit within a project.
///
/// Maps to the `tasks` table:
/// - (project_id, id): composite primary key
/// - x, y, zoom: grid tile address, NULL for arbitrary geometries
/// - task_status: SMALLINT (see [`TaskStatus`])
/// - locked_by / lock_expires_at: current lock holder and expiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub project_id: i64,
    pub x: Option<i64>,
    pub y: Option<i64>,
    pub zoom: Option<i32>,
    pub is_square: bool,
    /// GeoJSON MultiPolygon
    pub geometry: serde_json::Value,
    pub parent_task_id: Option<i64>,
    pub status: TaskStatus,
    pub locked_by: Option<i64>,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub mapped_by: Option<i64>,
    pub validated_by: Option<i64>,
}

impl Task {
    pub fn is_locked_by(&self, user_id: i64) -> bool {
        self.status.is_locked() && self.locked_by == Some(user_id)
    }

    /// The grid tile this task covers, if it was generated from a grid.
    pub fn tile(&self) -> Option<Tile> {
        match (self.x, self.y, self.zoom) {
            (Some(x), Some(y), Some(zoom)) if self.is_square => Some(Tile::new(x, y, zoom)),
            _ => None,
        }
    }

    pub fn clear_lock(&mut self) {
        self.locked_by = None;
        self.lock_expires_at = None;
    }

    /// Move to `status`, dropping any lock.
    pub fn set_status(&mut self, status: TaskStatus) {
        self.clear_lock();
        self.status = status;
    }

    /// The state a write of this task must still find in the store.
    pub fn guard(&self) -> TaskGuard {
        TaskGuard {
            status: self.status,
            locked_by: self.locked_by,
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self {
            id: 0,
            project_id: 0,
            x: None,
            y: None,
            zoom: None,
            is_square: false,
            geometry: serde_json::Value::Null,
            parent_task_id: None,
            status: TaskStatus::Ready,
            locked_by: None,
            lock_expires_at: None,
            mapped_by: None,
            validated_by: None,
        }
    }
}

/// One entry in a task's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskHistory {
    /// Assigned by the repository
    pub id: i64,
    pub project_id: i64,
    pub task_id: i64,
    pub action: TaskAction,
    pub action_text: Option<String>,
    pub action_date: DateTime<Utc>,
    pub user_id: i64,
}

impl TaskHistory {
    pub fn new(task: &Task, action: TaskAction, action_text: Option<String>, user_id: i64) -> Self {
        Self {
            id: 0,
            project_id: task.project_id,
            task_id: task.id,
            action,
            action_text,
            action_date: Utc::now(),
            user_id,
        }
    }

    pub fn state_change(task: &Task, status: TaskStatus, user_id: i64) -> Self {
        Self::new(task, TaskAction::StateChange, Some(status.as_str().to_string()), user_id)
    }

    pub fn comment(task: &Task, comment: &str, user_id: i64) -> Self {
        Self::new(task, TaskAction::Comment, Some(comment.to_string()), user_id)
    }

    /// New status recorded by a `STATE_CHANGE` entry.
    pub fn new_status(&self) -> Option<TaskStatus> {
        if self.action != TaskAction::StateChange {
            return None;
        }
        self.action_text.as_deref().and_then(TaskStatus::parse)
    }
}

/// A conditional lock request.
#[derive(Debug, Clone)]
pub struct TaskLock {
    /// `LockedForMapping` or `LockedForValidation`
    pub status: TaskStatus,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

impl TaskLock {
    pub fn history_action(&self) -> TaskAction {
        match self.status {
            TaskStatus::LockedForValidation => TaskAction::LockedForValidation,
            _ => TaskAction::LockedForMapping,
        }
    }
}

/// Status and lock holder a stored task must still have for a write to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskGuard {
    pub status: TaskStatus,
    pub locked_by: Option<i64>,
}

impl TaskGuard {
    pub fn matches(&self, task: &Task) -> bool {
        task.status == self.status && task.locked_by == self.locked_by
    }
}

/// A task row to persist together with the history it produced.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    /// State the row was read in
    pub expected: TaskGuard,
    pub task: Task,
    pub history: Vec<TaskHistory>,
}

impl TaskUpdate {
    pub fn new(expected: TaskGuard, task: Task, history: Vec<TaskHistory>) -> Self {
        Self {
            expected,
            task,
            history,
        }
    }
}

/// Repository trait for task data access.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Find a task by project and task id.
    async fn find(&self, project_id: i64, task_id: i64) -> Result<Option<Task>, AppError>;

    /// All tasks of a project, ordered by id.
    async fn find_by_project(&self, project_id: i64) -> Result<Vec<Task>, AppError>;

    /// Tasks in a project currently locked by a user.
    async fn find_locked_by_user(&self, project_id: i64, user_id: i64)
        -> Result<Vec<Task>, AppError>;

    /// Locked tasks whose lock expired before `now`, across all projects.
    async fn find_expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, AppError>;

    /// Lock every listed task, but only while each status is in `allowed`.
    ///
    /// Either all tasks are locked (one history entry each) and returned, or
    /// nothing changes and `None` is returned.
    async fn lock_tasks(
        &self,
        project_id: i64,
        task_ids: &[i64],
        allowed: &[TaskStatus],
        lock: TaskLock,
    ) -> Result<Option<Vec<Task>>, AppError>;

    /// Persist task rows and append their history atomically.
    ///
    /// Each row is written only while it still matches its `expected` guard.
    /// If any row was changed in the meantime nothing is written and `None`
    /// is returned.
    async fn save_all(&self, updates: Vec<TaskUpdate>) -> Result<Option<Vec<Task>>, AppError>;

    /// History of a task, oldest first.
    async fn history(&self, project_id: i64, task_id: i64) -> Result<Vec<TaskHistory>, AppError>;

    /// Replace `parent` with `children`, assigning fresh ids to the children.
    ///
    /// `parent` must still be locked by `user_id` with its stored status,
    /// otherwise nothing changes and `None` is returned.
    async fn split(&self, parent: &Task, children: Vec<Task>, user_id: i64)
        -> Result<Option<Vec<Task>>, AppError>;

    /// Number of tasks a user has mapped, across all projects.
    async fn count_mapped_by(&self, user_id: i64) -> Result<i64, AppError>;
}
