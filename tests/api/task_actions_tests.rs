//! Task Action API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;
use tasking_manager::domain::TaskStatus;
use test_case::test_case;

use crate::common::{
    assert_error, json_body, TestApp, ADMIN, AUTHOR, MAPPER, OTHER_MAPPER,
};

const ACTIONS: &str = "/api/v2/projects/1/tasks/actions";

fn lock_uri(task_id: i64) -> String {
    format!("{ACTIONS}/lock-for-mapping/{task_id}/")
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let app = TestApp::new();

    let response = app.post_json(&lock_uri(1), json!({})).await;

    let body = assert_error(response, StatusCode::UNAUTHORIZED, "InvalidToken").await;
    assert_eq!(body["Error"], "Missing authorization header");
}

#[tokio::test]
async fn test_lock_for_mapping() {
    let app = TestApp::new();

    let response = app.post_auth(&lock_uri(1), None, MAPPER).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["taskId"], 1);
    assert_eq!(body["taskStatus"], "LOCKED_FOR_MAPPING");
    assert_eq!(body["lockHolder"], MAPPER);
    assert_eq!(app.status_of(1), TaskStatus::LockedForMapping);
}

#[tokio::test]
async fn test_lock_held_by_another_user_is_forbidden() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app.post_auth(&lock_uri(1), None, OTHER_MAPPER).await;

    assert_error(response, StatusCode::FORBIDDEN, "InvalidTaskState").await;
}

#[tokio::test]
async fn test_second_lock_in_project_is_forbidden() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app.post_auth(&lock_uri(2), None, MAPPER).await;

    assert_error(response, StatusCode::FORBIDDEN, "UserAlreadyHasTaskLocked").await;
    assert_eq!(app.status_of(2), TaskStatus::Ready);
}

#[tokio::test]
async fn test_lock_on_unknown_project_is_not_found() {
    let app = TestApp::new();

    let response = app
        .post_auth("/api/v2/projects/99/tasks/actions/lock-for-mapping/1/", None, MAPPER)
        .await;

    assert_error(response, StatusCode::NOT_FOUND, "ProjectNotFound").await;
}

#[tokio::test]
async fn test_non_numeric_task_id_is_invalid_data() {
    let app = TestApp::new();

    let response = app.post_auth(&format!("{ACTIONS}/lock-for-mapping/abc/"), None, MAPPER).await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
    assert_eq!(body["Error"], "Unable to lock task");
}

#[tokio::test]
async fn test_stop_mapping_accepts_empty_body() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app
        .post_auth(&format!("{ACTIONS}/stop-mapping/1/"), None, MAPPER)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["taskStatus"], "READY");
}

#[tokio::test]
async fn test_unlock_after_mapping_with_unknown_status_is_invalid_data() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app
        .post_auth(
            &format!("{ACTIONS}/unlock-after-mapping/1/"),
            Some(json!({"status": "FINISHED"})),
            MAPPER,
        )
        .await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
    assert_eq!(body["Error"], "Task unlock failed");
    assert_eq!(app.status_of(1), TaskStatus::LockedForMapping);
}

#[tokio::test]
async fn test_unlock_after_mapping_then_undo() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app
        .post_auth(
            &format!("{ACTIONS}/unlock-after-mapping/1/"),
            Some(json!({"status": "MAPPED", "comment": "done"})),
            MAPPER,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["taskStatus"], "MAPPED");
    assert_eq!(body["mappedBy"], MAPPER);

    let response = app
        .post_auth(&format!("{ACTIONS}/undo-last-action/1/"), None, MAPPER)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.status_of(1), TaskStatus::Ready);
}

#[test_case("map-all" ; "map all")]
#[test_case("validate-all" ; "validate all")]
#[test_case("invalidate-all" ; "invalidate all")]
#[test_case("reset-all" ; "reset all")]
#[test_case("reset-all-badimagery" ; "reset all badimagery")]
#[tokio::test]
async fn test_bulk_action_requires_manager(action: &str) {
    let app = TestApp::new();
    app.set_status(2, TaskStatus::BadImagery);
    app.set_status(3, TaskStatus::Validated);
    app.set_status(4, TaskStatus::Mapped);
    let before: Vec<TaskStatus> = (1..=4).map(|id| app.status_of(id)).collect();

    let response = app.post_auth(&format!("{ACTIONS}/{action}/"), None, MAPPER).await;

    let body = assert_error(response, StatusCode::FORBIDDEN, "UserPermissionError").await;
    assert_eq!(body["Error"], "User is not a manager of the project");
    let after: Vec<TaskStatus> = (1..=4).map(|id| app.status_of(id)).collect();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_unlock_after_validation_with_mapped_status_is_invalid_data() {
    let app = TestApp::new();

    let response = app
        .post_auth(
            &format!("{ACTIONS}/unlock-after-validation/"),
            Some(json!({"validatedTasks": [{"taskId": 1, "status": "MAPPED"}]})),
            OTHER_MAPPER,
        )
        .await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
    assert_eq!(body["Error"], "Task unlock failed");
}

#[tokio::test]
async fn test_lock_for_validation_with_repeated_ids_is_invalid_data() {
    let app = TestApp::new();
    app.set_status(1, TaskStatus::Mapped);

    let response = app
        .post_auth(
            &format!("{ACTIONS}/lock-for-validation/"),
            Some(json!({"taskIds": [1, 1]})),
            OTHER_MAPPER,
        )
        .await;

    assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
    assert_eq!(app.status_of(1), TaskStatus::Mapped);
}

#[tokio::test]
async fn test_map_all_by_project_author() {
    let app = TestApp::new();
    app.set_status(4, TaskStatus::BadImagery);

    let response = app.post_auth(&format!("{ACTIONS}/map-all/"), None, AUTHOR).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"Success": "All tasks mapped"}));
    assert_eq!(app.status_of(1), TaskStatus::Mapped);
    assert_eq!(app.status_of(4), TaskStatus::BadImagery);
}

#[tokio::test]
async fn test_reset_all_badimagery_only_touches_badimagery() {
    let app = TestApp::new();
    app.set_status(2, TaskStatus::BadImagery);
    app.set_status(3, TaskStatus::Mapped);

    let response = app
        .post_auth(&format!("{ACTIONS}/reset-all-badimagery/"), None, ADMIN)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"Success": "All bad imagery tasks marked ready for mapping"})
    );
    assert_eq!(app.status_of(2), TaskStatus::Ready);
    assert_eq!(app.status_of(3), TaskStatus::Mapped);
}

#[tokio::test]
async fn test_split_locked_task() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app
        .post_auth("/api/v2/projects/1/tasks/1/actions/split/", None, MAPPER)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let tasks = body["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 4);
    assert!(tasks.iter().all(|t| t["taskStatus"] == "READY"));
    assert!(tasks.iter().all(|t| t["zoom"] == 13));
    assert!(app.tasks.get(1, 1).is_none());
}

#[tokio::test]
async fn test_split_without_lock_is_forbidden() {
    let app = TestApp::new();

    let response = app
        .post_auth("/api/v2/projects/1/tasks/1/actions/split/", None, MAPPER)
        .await;

    assert_error(response, StatusCode::FORBIDDEN, "LockToSplit").await;
}

#[tokio::test]
async fn test_extend_lock_time() {
    let app = TestApp::new();
    app.post_auth(&lock_uri(1), None, MAPPER).await;

    let response = app
        .post_auth(&format!("{ACTIONS}/extend/"), Some(json!({"taskIds": [1]})), MAPPER)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"Success": "Successfully extended task expiry"})
    );
}

#[tokio::test]
async fn test_reset_by_unknown_user_is_invalid_data() {
    let app = TestApp::new();

    let response = app
        .post_auth(
            &format!("{ACTIONS}/reset-by-user/?username=nobody&action=VALIDATED"),
            None,
            ADMIN,
        )
        .await;

    let body = assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
    assert_eq!(body["Error"], "Unable to revert tasks");
}

#[tokio::test]
async fn test_reset_by_user_with_bad_action_is_invalid_data() {
    let app = TestApp::new();

    let response = app
        .post_auth(
            &format!("{ACTIONS}/reset-by-user/?username=user3&action=MAPPED"),
            None,
            ADMIN,
        )
        .await;

    assert_error(response, StatusCode::BAD_REQUEST, "InvalidData").await;
}
