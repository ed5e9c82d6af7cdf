//! Request DTOs
//!
//! Data structures for API request bodies and query strings. Task action
//! bodies use camelCase keys; partner bodies use the snake_case column names.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::application::services::{
    CreatePartnerDto, ResetValidatingTask, UpdatePartnerDto, ValidatedTask,
};
use crate::domain::{TaskStatus, WebsiteLink};

fn validate_task_status(status: &str) -> Result<(), ValidationError> {
    match TaskStatus::parse(status) {
        Some(_) => Ok(()),
        None => Err(ValidationError::new("task_status").with_message("Unknown task status".into())),
    }
}

fn validate_revert_action(action: &str) -> Result<(), ValidationError> {
    match TaskStatus::parse(action) {
        Some(TaskStatus::BadImagery | TaskStatus::Validated) => Ok(()),
        _ => Err(ValidationError::new("revert_action")
            .with_message("Action must be BADIMAGERY or VALIDATED".into())),
    }
}

fn validate_validation_status(status: &str) -> Result<(), ValidationError> {
    match TaskStatus::parse(status) {
        Some(TaskStatus::Validated | TaskStatus::Invalidated) => Ok(()),
        _ => Err(ValidationError::new("validation_status")
            .with_message("Status must be VALIDATED or INVALIDATED".into())),
    }
}

/// Each task id may appear once per request.
fn ensure_distinct(ids: impl IntoIterator<Item = i64>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    if ids.into_iter().all(|id| seen.insert(id)) {
        Ok(())
    } else {
        Err(ValidationError::new("duplicate_task_id")
            .with_message("Task ids must not repeat".into()))
    }
}

fn validate_distinct_ids(ids: &[i64]) -> Result<(), ValidationError> {
    ensure_distinct(ids.iter().copied())
}

fn validate_distinct_reset_tasks(req: &StopValidationRequest) -> Result<(), ValidationError> {
    ensure_distinct(req.reset_tasks.iter().map(|t| t.task_id))
}

fn validate_distinct_validated_tasks(
    req: &UnlockAfterValidationRequest,
) -> Result<(), ValidationError> {
    ensure_distinct(req.validated_tasks.iter().map(|t| t.task_id))
}

/// Status string already checked by one of the status validators.
fn status_of(raw: &str) -> TaskStatus {
    TaskStatus::parse(raw).unwrap_or(TaskStatus::Ready)
}

/// Stop mapping request
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StopMappingRequest {
    #[validate(length(max = 5000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

/// Unlock after mapping request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UnlockAfterMappingRequest {
    #[validate(custom(function = "validate_task_status"))]
    pub status: String,

    #[validate(length(max = 5000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

impl UnlockAfterMappingRequest {
    pub fn task_status(&self) -> TaskStatus {
        status_of(&self.status)
    }
}

/// Task ids for validation locks and lock extension
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskIdsRequest {
    #[validate(
        length(min = 1, message = "At least one task id is required"),
        custom(function = "validate_distinct_ids")
    )]
    pub task_ids: Vec<i64>,
}

/// One task released from validation
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetTaskRequest {
    pub task_id: i64,

    #[validate(length(max = 5000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

/// Stop validating request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_distinct_reset_tasks"))]
pub struct StopValidationRequest {
    #[validate(length(min = 1, message = "At least one task is required"), nested)]
    pub reset_tasks: Vec<ResetTaskRequest>,
}

impl StopValidationRequest {
    pub fn into_tasks(self) -> Vec<ResetValidatingTask> {
        self.reset_tasks
            .into_iter()
            .map(|t| ResetValidatingTask {
                task_id: t.task_id,
                comment: t.comment,
            })
            .collect()
    }
}

/// One task's validation outcome
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedTaskRequest {
    pub task_id: i64,

    #[validate(custom(function = "validate_validation_status"))]
    pub status: String,

    #[validate(length(max = 5000, message = "Comment is too long"))]
    pub comment: Option<String>,
}

/// Unlock after validation request
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_distinct_validated_tasks"))]
pub struct UnlockAfterValidationRequest {
    #[validate(length(min = 1, message = "At least one task is required"), nested)]
    pub validated_tasks: Vec<ValidatedTaskRequest>,
}

impl UnlockAfterValidationRequest {
    pub fn into_tasks(self) -> Vec<ValidatedTask> {
        self.validated_tasks
            .into_iter()
            .map(|t| ValidatedTask {
                task_id: t.task_id,
                status: status_of(&t.status),
                comment: t.comment,
            })
            .collect()
    }
}

/// Query string of the revert endpoint
#[derive(Debug, Deserialize, Validate)]
pub struct RevertTasksQuery {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,

    #[validate(custom(function = "validate_revert_action"))]
    pub action: String,
}

impl RevertTasksQuery {
    pub fn action_status(&self) -> TaskStatus {
        status_of(&self.action)
    }
}

/// `name_1`/`url_1` .. `name_5`/`url_5` pairs of a partner form.
#[derive(Debug, Default, Deserialize)]
pub struct WebsiteLinkFields {
    pub name_1: Option<String>,
    pub url_1: Option<String>,
    pub name_2: Option<String>,
    pub url_2: Option<String>,
    pub name_3: Option<String>,
    pub url_3: Option<String>,
    pub name_4: Option<String>,
    pub url_4: Option<String>,
    pub name_5: Option<String>,
    pub url_5: Option<String>,
}

impl WebsiteLinkFields {
    /// Links whose name and url are both non-blank, in slot order.
    pub fn links(&self) -> Vec<WebsiteLink> {
        [
            (&self.name_1, &self.url_1),
            (&self.name_2, &self.url_2),
            (&self.name_3, &self.url_3),
            (&self.name_4, &self.url_4),
            (&self.name_5, &self.url_5),
        ]
        .into_iter()
        .filter_map(|(name, url)| WebsiteLink::from_pair(name.as_deref(), url.as_deref()))
        .collect()
    }
}

/// Create partner request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CreatePartnerRequest {
    #[validate(length(max = 150, message = "Name must be at most 150 characters"))]
    pub name: Option<String>,
    pub primary_hashtag: Option<String>,
    pub secondary_hashtag: Option<String>,
    #[validate(url(message = "Invalid logo URL"))]
    pub logo_url: Option<String>,
    pub link_meta: Option<String>,
    pub link_x: Option<String>,
    pub link_instagram: Option<String>,
    pub current_projects: Option<String>,
    pub permalink: Option<String>,
    #[serde(flatten)]
    pub links: WebsiteLinkFields,
}

impl From<CreatePartnerRequest> for CreatePartnerDto {
    fn from(req: CreatePartnerRequest) -> Self {
        let website_links = req.links.links();
        Self {
            name: req.name,
            primary_hashtag: req.primary_hashtag,
            secondary_hashtag: req.secondary_hashtag,
            logo_url: req.logo_url,
            link_meta: req.link_meta,
            link_x: req.link_x,
            link_instagram: req.link_instagram,
            current_projects: req.current_projects,
            permalink: req.permalink,
            website_links,
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key (`None`).
fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Update partner request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdatePartnerRequest {
    #[serde(default, deserialize_with = "explicit_null")]
    pub name: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub primary_hashtag: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub secondary_hashtag: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub logo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub link_meta: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub link_x: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub link_instagram: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub current_projects: Option<Option<String>>,
    #[serde(default, deserialize_with = "explicit_null")]
    pub permalink: Option<Option<String>>,
    #[serde(flatten)]
    pub links: WebsiteLinkFields,
}

impl From<UpdatePartnerRequest> for UpdatePartnerDto {
    fn from(req: UpdatePartnerRequest) -> Self {
        let website_links = req.links.links();
        Self {
            name: req.name,
            primary_hashtag: req.primary_hashtag,
            secondary_hashtag: req.secondary_hashtag,
            logo_url: req.logo_url,
            link_meta: req.link_meta,
            link_x: req.link_x,
            link_instagram: req.link_instagram,
            current_projects: req.current_projects,
            permalink: req.permalink,
            website_links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use test_case::test_case;

    #[test]
    fn test_unlock_body_uses_status_names() {
        let body: UnlockAfterMappingRequest =
            serde_json::from_value(json!({"status": "BADIMAGERY", "comment": "clouds"})).unwrap();
        assert!(body.validate().is_ok());
        assert_eq!(body.task_status(), TaskStatus::BadImagery);

        let bad: UnlockAfterMappingRequest =
            serde_json::from_value(json!({"status": "FINISHED"})).unwrap();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_nested_validation_of_validated_tasks() {
        let body: UnlockAfterValidationRequest = serde_json::from_value(json!({
            "validatedTasks": [
                {"taskId": 1, "status": "VALIDATED"},
                {"taskId": 2, "status": "NOPE"}
            ]
        }))
        .unwrap();
        assert!(body.validate().is_err());

        let empty: UnlockAfterValidationRequest =
            serde_json::from_value(json!({"validatedTasks": []})).unwrap();
        assert!(empty.validate().is_err());
    }

    #[test_case("VALIDATED", true)]
    #[test_case("INVALIDATED", true)]
    #[test_case("MAPPED", false)]
    #[test_case("BADIMAGERY", false)]
    fn test_validated_task_status(status: &str, accepted: bool) {
        let body: UnlockAfterValidationRequest = serde_json::from_value(json!({
            "validatedTasks": [{"taskId": 1, "status": status}]
        }))
        .unwrap();
        assert_eq!(body.validate().is_ok(), accepted);
    }

    #[test]
    fn test_repeated_task_ids_rejected() {
        let ids: TaskIdsRequest = serde_json::from_value(json!({"taskIds": [1, 2, 1]})).unwrap();
        assert!(ids.validate().is_err());
        let ids: TaskIdsRequest = serde_json::from_value(json!({"taskIds": [1, 2]})).unwrap();
        assert!(ids.validate().is_ok());

        let stop: StopValidationRequest = serde_json::from_value(json!({
            "resetTasks": [{"taskId": 3}, {"taskId": 3, "comment": "again"}]
        }))
        .unwrap();
        assert!(stop.validate().is_err());

        let unlock: UnlockAfterValidationRequest = serde_json::from_value(json!({
            "validatedTasks": [
                {"taskId": 3, "status": "VALIDATED"},
                {"taskId": 3, "status": "INVALIDATED"}
            ]
        }))
        .unwrap();
        assert!(unlock.validate().is_err());
    }

    #[test]
    fn test_revert_action_must_be_badimagery_or_validated() {
        let query = RevertTasksQuery { username: "mapper".into(), action: "MAPPED".into() };
        assert!(query.validate().is_err());
        let query = RevertTasksQuery { username: "mapper".into(), action: "VALIDATED".into() };
        assert!(query.validate().is_ok());
        assert_eq!(query.action_status(), TaskStatus::Validated);
    }

    #[test]
    fn test_partner_links_keep_complete_pairs_only() {
        let req: CreatePartnerRequest = serde_json::from_value(json!({
            "name": "HOT",
            "primary_hashtag": "#hot",
            "name_1": "Blog", "url_1": "https://hot.example/blog",
            "name_2": "Wiki",
            "url_3": "https://hot.example/orphan",
            "name_4": "  ", "url_4": "https://hot.example/blank"
        }))
        .unwrap();
        let dto = CreatePartnerDto::from(req);
        assert_eq!(
            dto.website_links,
            vec![WebsiteLink { name: "Blog".into(), url: "https://hot.example/blog".into() }]
        );
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let req: UpdatePartnerRequest =
            serde_json::from_value(json!({"name": null, "logo_url": "https://x.example/l.png"}))
                .unwrap();
        assert_eq!(req.name, Some(None));
        assert_eq!(req.primary_hashtag, None);
        assert_eq!(req.logo_url, Some(Some("https://x.example/l.png".into())));
    }
}
