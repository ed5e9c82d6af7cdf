//! Response DTOs
//!
//! Data structures for API response bodies.

use serde::Serialize;

use crate::domain::{Partner, Task, TaskStatus, WebsiteLink};

/// Task response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResponse {
    pub task_id: i64,
    pub project_id: i64,
    pub task_status: TaskStatus,
    pub lock_holder: Option<i64>,
    pub lock_expires_at: Option<String>,
    pub mapped_by: Option<i64>,
    pub validated_by: Option<i64>,
    pub parent_task_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<i32>,
    pub is_square: bool,
    pub geometry: serde_json::Value,
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id,
            project_id: task.project_id,
            task_status: task.status,
            lock_holder: task.locked_by,
            lock_expires_at: task.lock_expires_at.map(|at| at.to_rfc3339()),
            mapped_by: task.mapped_by,
            validated_by: task.validated_by,
            parent_task_id: task.parent_task_id,
            x: task.x,
            y: task.y,
            zoom: task.zoom,
            is_square: task.is_square,
            geometry: task.geometry,
        }
    }
}

/// Tasks list response
#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub tasks: Vec<TaskResponse>,
}

impl From<Vec<Task>> for TasksResponse {
    fn from(tasks: Vec<Task>) -> Self {
        Self {
            tasks: tasks.into_iter().map(TaskResponse::from).collect(),
        }
    }
}

/// Partner response
#[derive(Debug, Serialize)]
pub struct PartnerResponse {
    pub id: i64,
    pub name: String,
    pub primary_hashtag: String,
    pub secondary_hashtag: Option<String>,
    pub logo_url: Option<String>,
    pub link_meta: Option<String>,
    pub link_x: Option<String>,
    pub link_instagram: Option<String>,
    pub current_projects: Option<String>,
    pub permalink: Option<String>,
    pub website_links: Vec<WebsiteLink>,
}

impl From<Partner> for PartnerResponse {
    fn from(partner: Partner) -> Self {
        Self {
            id: partner.id,
            name: partner.name,
            primary_hashtag: partner.primary_hashtag,
            secondary_hashtag: partner.secondary_hashtag,
            logo_url: partner.logo_url,
            link_meta: partner.link_meta,
            link_x: partner.link_x,
            link_instagram: partner.link_instagram,
            current_projects: partner.current_projects,
            permalink: partner.permalink,
            website_links: partner.website_links,
        }
    }
}

/// Partner list response
#[derive(Debug, Serialize)]
pub struct PartnersResponse {
    pub partners: Vec<PartnerResponse>,
}

impl From<Vec<Partner>> for PartnersResponse {
    fn from(partners: Vec<Partner>) -> Self {
        Self {
            partners: partners.into_iter().map(PartnerResponse::from).collect(),
        }
    }
}

/// `{"Success": "..."}` acknowledgement
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    #[serde(rename = "Success")]
    pub success: String,
}

impl SuccessResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: message.into(),
        }
    }
}
