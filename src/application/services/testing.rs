//! Shared fixture for service tests.

use std::sync::Arc;

use super::project_admin_service::{ProjectAdminService, ProjectAdminServiceImpl};
use super::project_service::{ProjectService, ProjectServiceImpl};
use crate::domain::{
    MapperLevel, Project, ProjectStatus, Task, TaskHistory, TaskStatus, User, UserRole,
};
use crate::infrastructure::cache::NoPermissionCache;
use crate::infrastructure::repositories::{
    InMemoryProjectRepository, InMemoryTaskRepository, InMemoryUserRepository,
};
use crate::shared::tiles::Tile;

pub const PROJECT: i64 = 1;
pub const ADMIN: i64 = 1;
pub const AUTHOR: i64 = 2;
pub const MAPPER: i64 = 3;
pub const VALIDATOR: i64 = 4;

/// A published project with four READY grid tasks and one user per role.
pub struct Fixture {
    pub tasks: Arc<InMemoryTaskRepository>,
    pub projects: Arc<InMemoryProjectRepository>,
    pub users: Arc<InMemoryUserRepository>,
}

pub fn fixture() -> Fixture {
    let tasks = Arc::new(InMemoryTaskRepository::default());
    for id in 1..=4 {
        let tile = Tile::new(100 + id, 200, 12);
        tasks.insert(Task {
            id,
            project_id: PROJECT,
            x: Some(tile.x),
            y: Some(tile.y),
            zoom: Some(tile.zoom),
            is_square: true,
            geometry: tile.to_geojson(),
            ..Task::default()
        });
    }

    let projects = Arc::new(InMemoryProjectRepository::default());
    projects.insert(Project {
        id: PROJECT,
        status: ProjectStatus::Published,
        author_id: AUTHOR,
        ..Project::default()
    });

    let users = Arc::new(InMemoryUserRepository::default());
    for (id, role, level) in [
        (ADMIN, UserRole::Admin, MapperLevel::Advanced),
        (AUTHOR, UserRole::Mapper, MapperLevel::Beginner),
        (MAPPER, UserRole::Mapper, MapperLevel::Beginner),
        (VALIDATOR, UserRole::Mapper, MapperLevel::Advanced),
    ] {
        users.insert(User {
            id,
            username: format!("user{id}"),
            role,
            mapping_level: level,
            accepted_licenses: vec![],
        });
    }

    Fixture { tasks, projects, users }
}

impl Fixture {
    pub fn project_service(&self) -> Arc<dyn ProjectService> {
        Arc::new(ProjectServiceImpl::new(
            self.projects.clone(),
            self.users.clone(),
            self.tasks.clone(),
        ))
    }

    pub fn project_admin_service(&self) -> Arc<dyn ProjectAdminService> {
        Arc::new(ProjectAdminServiceImpl::new(
            self.projects.clone(),
            self.users.clone(),
            self.tasks.clone(),
            Arc::new(NoPermissionCache),
        ))
    }

    pub fn status(&self, task_id: i64) -> TaskStatus {
        self.task(task_id).status
    }

    /// Move a task to `status` the way an admin action would, history included.
    pub fn set_status(&self, task_id: i64, status: TaskStatus) {
        let task = self.task(task_id);
        self.tasks.record(TaskHistory::state_change(&task, status, ADMIN));
        self.tasks.insert(Task { status, ..task });
    }

    pub fn mark_mapped(&self, task_id: i64, user_id: i64) {
        let task = self.task(task_id);
        self.tasks.record(TaskHistory::state_change(&task, TaskStatus::Mapped, user_id));
        self.tasks.insert(Task {
            status: TaskStatus::Mapped,
            mapped_by: Some(user_id),
            ..task
        });
    }

    fn task(&self, task_id: i64) -> Task {
        self.tasks
            .get(PROJECT, task_id)
            .unwrap_or_else(|| panic!("fixture has no task {task_id}"))
    }
}
