//! Task Repository Implementation
//!
//! PostgreSQL implementation of the TaskRepository trait over the `tasks`
//! and `task_history` tables. Multi-row writes run in one transaction.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::domain::{
    Task, TaskAction, TaskGuard, TaskHistory, TaskLock, TaskRepository, TaskStatus, TaskUpdate,
};
use crate::infrastructure::database::TransactionContext;
use crate::shared::error::AppError;

const TASK_COLUMNS: &str = "id, project_id, x, y, zoom, is_square, geometry, parent_task_id, \
     task_status, locked_by, lock_expires_at, mapped_by, validated_by";

/// Database row representation of the tasks table.
#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i64,
    project_id: i64,
    x: Option<i64>,
    y: Option<i64>,
    zoom: Option<i32>,
    is_square: bool,
    geometry: serde_json::Value,
    parent_task_id: Option<i64>,
    task_status: i16,
    locked_by: Option<i64>,
    lock_expires_at: Option<DateTime<Utc>>,
    mapped_by: Option<i64>,
    validated_by: Option<i64>,
}

impl TaskRow {
    fn into_task(self) -> Task {
        Task {
            id: self.id,
            project_id: self.project_id,
            x: self.x,
            y: self.y,
            zoom: self.zoom,
            is_square: self.is_square,
            geometry: self.geometry,
            parent_task_id: self.parent_task_id,
            status: TaskStatus::from_i16(self.task_status).unwrap_or(TaskStatus::Ready),
            locked_by: self.locked_by,
            lock_expires_at: self.lock_expires_at,
            mapped_by: self.mapped_by,
            validated_by: self.validated_by,
        }
    }
}

/// Database row representation of the task_history table.
#[derive(Debug, sqlx::FromRow)]
struct HistoryRow {
    id: i64,
    project_id: i64,
    task_id: i64,
    action: String,
    action_text: Option<String>,
    action_date: DateTime<Utc>,
    user_id: i64,
}

impl HistoryRow {
    /// Rows with an action this service does not know are skipped.
    fn into_history(self) -> Option<TaskHistory> {
        Some(TaskHistory {
            id: self.id,
            project_id: self.project_id,
            task_id: self.task_id,
            action: TaskAction::parse(&self.action)?,
            action_text: self.action_text,
            action_date: self.action_date,
            user_id: self.user_id,
        })
    }
}

async fn insert_history(conn: &mut PgConnection, entry: &TaskHistory) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO task_history (project_id, task_id, action, action_text, action_date, user_id)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(entry.project_id)
    .bind(entry.task_id)
    .bind(entry.action.as_str())
    .bind(&entry.action_text)
    .bind(entry.action_date)
    .bind(entry.user_id)
    .execute(conn)
    .await?;
    Ok(())
}

async fn insert_task(conn: &mut PgConnection, task: &Task) -> Result<Task, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        INSERT INTO tasks ({TASK_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(task.id)
    .bind(task.project_id)
    .bind(task.x)
    .bind(task.y)
    .bind(task.zoom)
    .bind(task.is_square)
    .bind(&task.geometry)
    .bind(task.parent_task_id)
    .bind(task.status.as_i16())
    .bind(task.locked_by)
    .bind(task.lock_expires_at)
    .bind(task.mapped_by)
    .bind(task.validated_by)
    .fetch_one(conn)
    .await?;
    Ok(row.into_task())
}

/// Write `task` only while the stored row still matches `expected`.
async fn update_task(
    conn: &mut PgConnection,
    task: &Task,
    expected: &TaskGuard,
) -> Result<Option<Task>, AppError> {
    let row = sqlx::query_as::<_, TaskRow>(&format!(
        r#"
        UPDATE tasks
        SET task_status = $1, locked_by = $2, lock_expires_at = $3, mapped_by = $4, validated_by = $5
        WHERE project_id = $6 AND id = $7
          AND task_status = $8 AND locked_by IS NOT DISTINCT FROM $9
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(task.status.as_i16())
    .bind(task.locked_by)
    .bind(task.lock_expires_at)
    .bind(task.mapped_by)
    .bind(task.validated_by)
    .bind(task.project_id)
    .bind(task.id)
    .bind(expected.status.as_i16())
    .bind(expected.locked_by)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(TaskRow::into_task))
}

/// PostgreSQL task repository implementation.
#[derive(Clone)]
pub struct PgTaskRepository {
    pool: PgPool,
}

impl PgTaskRepository {
    /// Create a new PgTaskRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for PgTaskRepository {
    async fn find(&self, project_id: i64, task_id: i64) -> Result<Option<Task>, AppError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 AND id = $2"
        ))
        .bind(project_id)
        .bind(task_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(TaskRow::into_task))
    }

    async fn find_by_project(&self, project_id: i64) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY id"
        ))
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn find_locked_by_user(
        &self,
        project_id: i64,
        user_id: i64,
    ) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE project_id = $1 AND locked_by = $2 AND task_status = ANY($3)
            ORDER BY id
            "#
        ))
        .bind(project_id)
        .bind(user_id)
        .bind(locked_codes())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn find_expired_locks(&self, now: DateTime<Utc>) -> Result<Vec<Task>, AppError> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            SELECT {TASK_COLUMNS} FROM tasks
            WHERE task_status = ANY($1) AND lock_expires_at < $2
            ORDER BY project_id, id
            "#
        ))
        .bind(locked_codes())
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(TaskRow::into_task).collect())
    }

    async fn lock_tasks(
        &self,
        project_id: i64,
        task_ids: &[i64],
        allowed: &[TaskStatus],
        lock: TaskLock,
    ) -> Result<Option<Vec<Task>>, AppError> {
        let wanted: HashSet<i64> = task_ids.iter().copied().collect();
        let ids: Vec<i64> = wanted.iter().copied().collect();
        let allowed: Vec<i16> = allowed.iter().map(TaskStatus::as_i16).collect();

        let mut ctx = TransactionContext::begin(&self.pool).await?;
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
            SET task_status = $1, locked_by = $2, lock_expires_at = $3
            WHERE project_id = $4 AND id = ANY($5) AND task_status = ANY($6)
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(lock.status.as_i16())
        .bind(lock.user_id)
        .bind(lock.expires_at)
        .bind(project_id)
        .bind(&ids)
        .bind(&allowed)
        .fetch_all(ctx.conn())
        .await?;

        if rows.len() != wanted.len() {
            ctx.rollback().await?;
            return Ok(None);
        }

        let mut locked: Vec<Task> = rows.into_iter().map(TaskRow::into_task).collect();
        locked.sort_by_key(|t| t.id);
        for task in &locked {
            let entry = TaskHistory::new(task, lock.history_action(), None, lock.user_id);
            insert_history(ctx.conn(), &entry).await?;
        }
        ctx.commit().await?;
        Ok(Some(locked))
    }

    async fn save_all(&self, updates: Vec<TaskUpdate>) -> Result<Option<Vec<Task>>, AppError> {
        let mut ctx = TransactionContext::begin(&self.pool).await?;
        let mut saved = Vec::with_capacity(updates.len());
        for TaskUpdate {
            expected,
            task,
            history,
        } in updates
        {
            let Some(row) = update_task(ctx.conn(), &task, &expected).await? else {
                ctx.rollback().await?;
                return Ok(None);
            };
            saved.push(row);
            for entry in &history {
                insert_history(ctx.conn(), entry).await?;
            }
        }
        ctx.commit().await?;
        Ok(Some(saved))
    }

    async fn history(&self, project_id: i64, task_id: i64) -> Result<Vec<TaskHistory>, AppError> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, project_id, task_id, action, action_text, action_date, user_id
            FROM task_history
            WHERE project_id = $1 AND task_id = $2
            ORDER BY action_date, id
            "#,
        )
        .bind(project_id)
        .bind(task_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().filter_map(HistoryRow::into_history).collect())
    }

    async fn split(
        &self,
        parent: &Task,
        children: Vec<Task>,
        user_id: i64,
    ) -> Result<Option<Vec<Task>>, AppError> {
        let mut ctx = TransactionContext::begin(&self.pool).await?;
        let inherited: Vec<HistoryRow> = sqlx::query_as(
            r#"
            SELECT id, project_id, task_id, action, action_text, action_date, user_id
            FROM task_history
            WHERE project_id = $1 AND task_id = $2
            ORDER BY action_date, id
            "#,
        )
        .bind(parent.project_id)
        .bind(parent.id)
        .fetch_all(ctx.conn())
        .await?;

        let max_id: Option<i64> =
            sqlx::query_scalar("SELECT MAX(id) FROM tasks WHERE project_id = $1")
                .bind(parent.project_id)
                .fetch_one(ctx.conn())
                .await?;
        let mut next_id = max_id.unwrap_or(0).max(parent.id);

        // History rows cascade with the parent row.
        let deleted = sqlx::query(
            r#"
            DELETE FROM tasks
            WHERE project_id = $1 AND id = $2 AND task_status = $3 AND locked_by = $4
            "#,
        )
        .bind(parent.project_id)
        .bind(parent.id)
        .bind(parent.status.as_i16())
        .bind(user_id)
        .execute(ctx.conn())
        .await?;
        if deleted.rows_affected() == 0 {
            ctx.rollback().await?;
            return Ok(None);
        }

        let inherited: Vec<TaskHistory> =
            inherited.into_iter().filter_map(HistoryRow::into_history).collect();

        let mut created = Vec::with_capacity(children.len());
        for mut child in children {
            next_id += 1;
            child.id = next_id;
            child.project_id = parent.project_id;
            let child = insert_task(ctx.conn(), &child).await?;

            for entry in &inherited {
                let copy = TaskHistory { task_id: child.id, ..entry.clone() };
                insert_history(ctx.conn(), &copy).await?;
            }
            let note = format!("Split from task {}", parent.id);
            let entry = TaskHistory::new(&child, TaskAction::Split, Some(note), user_id);
            insert_history(ctx.conn(), &entry).await?;

            created.push(child);
        }
        ctx.commit().await?;
        Ok(Some(created))
    }

    async fn count_mapped_by(&self, user_id: i64) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tasks WHERE mapped_by = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn locked_codes() -> Vec<i16> {
    vec![
        TaskStatus::LockedForMapping.as_i16(),
        TaskStatus::LockedForValidation.as_i16(),
    ]
}
