//! Task Action Handlers
//!
//! Every handler builds and validates its DTO first (400 `InvalidData` on
//! failure), checks the project exists, then hands over to a service.
//! Bulk actions check manager permission before anything else.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Extension, Path, Query, State},
    Json,
};
use tracing::{info, warn};

use crate::application::dto::request::{
    RevertTasksQuery, StopMappingRequest, StopValidationRequest, TaskIdsRequest,
    UnlockAfterMappingRequest, UnlockAfterValidationRequest,
};
use crate::application::dto::response::{SuccessResponse, TaskResponse, TasksResponse};
use crate::application::services::{
    ExtendLockTimeDto, LockForValidationDto, LockTaskDto, MappedTaskDto, RevertUserTasksDto,
    SplitTaskDto, StopMappingTaskDto, StopValidationDto, UnlockAfterValidationDto,
};
use crate::infrastructure::metrics;
use crate::presentation::http::extractors::AcceptLanguage;
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::{parse_id, validate, validated_body, validated_optional_body};
use crate::startup::AppState;

const LOCK_FAILED: &str = "Unable to lock task";
const UNLOCK_FAILED: &str = "Task unlock failed";

/// Count the outcome of a task action and pass the result through.
fn observe<T>(action: &str, result: Result<T, AppError>) -> Result<T, AppError> {
    let outcome = match &result {
        Ok(_) => "success",
        Err(e) if e.status_and_sub_code().0.is_server_error() => "error",
        Err(_) => "rejected",
    };
    metrics::record_task_action(action, outcome);
    result
}

/// 403 `UserPermissionError` unless the user manages the project.
async fn require_manager(state: &AppState, project_id: i64, user_id: i64) -> Result<(), AppError> {
    let permitted = state
        .services
        .project_admin
        .is_user_action_permitted_on_project(user_id, project_id)
        .await?;
    if permitted {
        Ok(())
    } else {
        Err(AppError::UserPermission(
            "User is not a manager of the project".into(),
        ))
    }
}

/// Lock a task for mapping
pub async fn lock_for_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path((project_id, task_id)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, AppError> {
    let result = async {
        let dto = LockTaskDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, LOCK_FAILED)?,
            task_id: parse_id(&task_id, LOCK_FAILED)?,
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let task = state.services.mapping.lock_task_for_mapping(dto).await?;
        Ok::<_, AppError>(Json(TaskResponse::from(task)))
    }
    .await;
    observe("lock_for_mapping", result)
}

/// Release a mapping lock without changing the task's status
pub async fn stop_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path((project_id, task_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<TaskResponse>, AppError> {
    let result = async {
        let body: StopMappingRequest = validated_optional_body(&body, UNLOCK_FAILED)?;
        let dto = StopMappingTaskDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, UNLOCK_FAILED)?,
            task_id: parse_id(&task_id, UNLOCK_FAILED)?,
            comment: body.comment,
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let task = state.services.mapping.stop_mapping_task(dto).await?;
        Ok::<_, AppError>(Json(TaskResponse::from(task)))
    }
    .await;
    observe("stop_mapping", result)
}

/// Set a task as mapped, bad imagery or ready
///
/// The caller's mapper level is refreshed afterwards, whatever the outcome.
pub async fn unlock_after_mapping(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((project_id, task_id)): Path<(String, String)>,
    body: Result<Json<UnlockAfterMappingRequest>, JsonRejection>,
) -> Result<Json<TaskResponse>, AppError> {
    let result = async {
        let body = validated_body(body, UNLOCK_FAILED)?;
        let dto = MappedTaskDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, UNLOCK_FAILED)?,
            task_id: parse_id(&task_id, UNLOCK_FAILED)?,
            status: body.task_status(),
            comment: body.comment,
        };

        state.services.project.exists(dto.project_id).await?;
        let task = state.services.mapping.unlock_task_after_mapping(dto).await?;
        Ok::<_, AppError>(Json(TaskResponse::from(task)))
    }
    .await;

    if let Err(e) = state
        .services
        .user
        .check_and_update_mapper_level(auth.user_id)
        .await
    {
        warn!(user_id = auth.user_id, error = %e, "Mapper level refresh failed");
    }

    observe("unlock_after_mapping", result)
}

/// Undo the last state change of a task
pub async fn undo_last_action(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((project_id, task_id)): Path<(String, String)>,
) -> Result<Json<TaskResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to undo task")?;
        let task_id = parse_id(&task_id, "Unable to undo task")?;

        state.services.project.exists(project_id).await?;
        let task = state
            .services
            .mapping
            .undo_mapping(project_id, task_id, auth.user_id)
            .await?;
        Ok::<_, AppError>(Json(TaskResponse::from(task)))
    }
    .await;
    observe("undo_last_action", result)
}

/// Lock tasks for validation
pub async fn lock_for_validation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path(project_id): Path<String>,
    body: Result<Json<TaskIdsRequest>, JsonRejection>,
) -> Result<Json<TasksResponse>, AppError> {
    let result = async {
        let body = validated_body(body, LOCK_FAILED)?;
        let dto = LockForValidationDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, LOCK_FAILED)?,
            task_ids: body.task_ids,
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let tasks = state.services.validator.lock_tasks_for_validation(dto).await?;
        Ok::<_, AppError>(Json(TasksResponse::from(tasks)))
    }
    .await;
    observe("lock_for_validation", result)
}

/// Release validation locks without changing status
pub async fn stop_validation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path(project_id): Path<String>,
    body: Result<Json<StopValidationRequest>, JsonRejection>,
) -> Result<Json<TasksResponse>, AppError> {
    let result = async {
        let body = validated_body(body, UNLOCK_FAILED)?;
        let dto = StopValidationDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, UNLOCK_FAILED)?,
            reset_tasks: body.into_tasks(),
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let tasks = state.services.validator.stop_validating_tasks(dto).await?;
        Ok::<_, AppError>(Json(TasksResponse::from(tasks)))
    }
    .await;
    observe("stop_validation", result)
}

/// Set tasks as validated or invalidated
pub async fn unlock_after_validation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path(project_id): Path<String>,
    body: Result<Json<UnlockAfterValidationRequest>, JsonRejection>,
) -> Result<Json<TasksResponse>, AppError> {
    let result = async {
        let body = validated_body(body, UNLOCK_FAILED)?;
        let dto = UnlockAfterValidationDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, UNLOCK_FAILED)?,
            validated_tasks: body.into_tasks(),
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let tasks = state
            .services
            .validator
            .unlock_tasks_after_validation(dto)
            .await?;
        Ok::<_, AppError>(Json(TasksResponse::from(tasks)))
    }
    .await;
    observe("unlock_after_validation", result)
}

/// Map all tasks of a project
pub async fn map_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to map all tasks")?;
        require_manager(&state, project_id, auth.user_id).await?;

        let count = state.services.mapping.map_all_tasks(project_id, auth.user_id).await?;
        info!(project_id, count, "All tasks mapped");
        Ok::<_, AppError>(Json(SuccessResponse::new("All tasks mapped")))
    }
    .await;
    observe("map_all", result)
}

/// Validate all tasks of a project
pub async fn validate_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to validate all tasks")?;
        require_manager(&state, project_id, auth.user_id).await?;

        let count = state
            .services
            .validator
            .validate_all_tasks(project_id, auth.user_id)
            .await?;
        info!(project_id, count, "All tasks validated");
        Ok::<_, AppError>(Json(SuccessResponse::new("All tasks validated")))
    }
    .await;
    observe("validate_all", result)
}

/// Invalidate all validated tasks of a project
pub async fn invalidate_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to invalidate all tasks")?;
        require_manager(&state, project_id, auth.user_id).await?;

        let count = state
            .services
            .validator
            .invalidate_all_tasks(project_id, auth.user_id)
            .await?;
        info!(project_id, count, "All tasks invalidated");
        Ok::<_, AppError>(Json(SuccessResponse::new("All tasks invalidated")))
    }
    .await;
    observe("invalidate_all", result)
}

/// Mark all bad imagery tasks ready for mapping
pub async fn reset_all_badimagery(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to reset bad imagery tasks")?;
        require_manager(&state, project_id, auth.user_id).await?;

        let count = state
            .services
            .mapping
            .reset_all_badimagery(project_id, auth.user_id)
            .await?;
        info!(project_id, count, "Bad imagery tasks reset");
        Ok::<_, AppError>(Json(SuccessResponse::new(
            "All bad imagery tasks marked ready for mapping",
        )))
    }
    .await;
    observe("reset_all_badimagery", result)
}

/// Reset all tasks of a project to READY
pub async fn reset_all(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> Result<Json<SuccessResponse>, AppError> {
    let result = async {
        let project_id = parse_id(&project_id, "Unable to reset tasks")?;
        require_manager(&state, project_id, auth.user_id).await?;

        let count = state
            .services
            .project_admin
            .reset_all_tasks(project_id, auth.user_id)
            .await?;
        info!(project_id, count, "All tasks reset");
        Ok::<_, AppError>(Json(SuccessResponse::new("All tasks reset")))
    }
    .await;
    observe("reset_all", result)
}

/// Split a task into its four child tiles
pub async fn split(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    AcceptLanguage(locale): AcceptLanguage,
    Path((project_id, task_id)): Path<(String, String)>,
) -> Result<Json<TasksResponse>, AppError> {
    let result = async {
        let dto = SplitTaskDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, "Unable to split task")?,
            task_id: parse_id(&task_id, "Unable to split task")?,
            preferred_locale: locale,
        };

        state.services.project.exists(dto.project_id).await?;
        let tasks = state.services.split.split_task(dto).await?;
        Ok::<_, AppError>(Json(TasksResponse::from(tasks)))
    }
    .await;
    observe("split", result)
}

/// Extend the lock expiry of tasks the user holds
pub async fn extend_lock_time(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    body: Result<Json<TaskIdsRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    const EXTEND_FAILED: &str = "Unable to extend lock time";

    let result = async {
        let body = validated_body(body, EXTEND_FAILED)?;
        let dto = ExtendLockTimeDto {
            user_id: auth.user_id,
            project_id: parse_id(&project_id, EXTEND_FAILED)?,
            task_ids: body.task_ids,
        };

        state.services.project.exists(dto.project_id).await?;
        state.services.mapping.extend_task_lock_time(dto).await?;
        Ok::<_, AppError>(Json(SuccessResponse::new("Successfully extended task expiry")))
    }
    .await;
    observe("extend", result)
}

/// Revert the tasks a user marked bad imagery or validated
pub async fn reset_by_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    query: Result<Query<RevertTasksQuery>, QueryRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    const REVERT_FAILED: &str = "Unable to revert tasks";

    let result = async {
        let Query(query) = query.map_err(|rejection| {
            tracing::error!("Error validating request: {}", rejection.body_text());
            AppError::InvalidData(REVERT_FAILED.into())
        })?;
        let query = validate(query, REVERT_FAILED)?;
        let project_id = parse_id(&project_id, REVERT_FAILED)?;

        let user = state
            .services
            .user
            .get_user_by_username(&query.username)
            .await
            .map_err(|e| {
                tracing::error!("Error validating request: {}", e);
                AppError::InvalidData(REVERT_FAILED.into())
            })?;

        let dto = RevertUserTasksDto {
            project_id,
            user_id: user.id,
            action: query.action_status(),
            action_by: auth.user_id,
        };
        let count = state.services.validator.revert_user_tasks(dto).await?;
        info!(project_id, user_id = user.id, count, "User tasks reverted");
        Ok::<_, AppError>(Json(SuccessResponse::new("Successfully reverted tasks")))
    }
    .await;
    observe("reset_by_user", result)
}
