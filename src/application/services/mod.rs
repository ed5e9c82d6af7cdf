//! Application Services
//!
//! Business logic services that coordinate domain operations.
//!
//! ## Available Services
//!
//! - **MappingService**: Locking and releasing tasks for mapping, bulk mapping
//! - **ValidatorService**: Validation locks, bulk validation, reverting a user's work
//! - **SplitService**: Splitting grid tasks into smaller tiles
//! - **ProjectService**: Project existence and per-user access checks
//! - **ProjectAdminService**: Manager permission checks and project resets
//! - **UserService**: User lookups and mapper level promotion
//! - **PartnerService**: Partner organisation CRUD

use std::sync::Arc;

pub mod mapping_service;
pub mod partner_service;
pub mod project_admin_service;
pub mod project_service;
pub mod split_service;
pub mod user_service;
pub mod validator_service;

#[cfg(test)]
pub(crate) mod testing;

// Re-export mapping service types
pub use mapping_service::{
    ExtendLockTimeDto, LockTaskDto, MappedTaskDto, MappingError, MappingService,
    MappingServiceImpl, StopMappingTaskDto,
};

// Re-export validator service types
pub use validator_service::{
    LockForValidationDto, ResetValidatingTask, RevertUserTasksDto, StopValidationDto,
    UnlockAfterValidationDto, ValidatedTask, ValidationError, ValidatorService,
    ValidatorServiceImpl,
};

// Re-export split service types
pub use split_service::{SplitError, SplitService, SplitServiceImpl, SplitTaskDto};

// Re-export project service types
pub use project_admin_service::{ProjectAdminService, ProjectAdminServiceImpl};
pub use project_service::{AccessDenied, ProjectError, ProjectService, ProjectServiceImpl};

// Re-export user and partner service types
pub use partner_service::{
    CreatePartnerDto, PartnerError, PartnerService, PartnerServiceImpl, UpdatePartnerDto,
};
pub use user_service::{UserError, UserService, UserServiceImpl};

use crate::config::TaskSettings;
use crate::domain::{PartnerRepository, ProjectRepository, TaskRepository, UserRepository};
use crate::infrastructure::cache::ManagerPermissionCache;

/// Every application service, wired once at startup and shared by handlers.
#[derive(Clone)]
pub struct Services {
    pub mapping: Arc<dyn MappingService>,
    pub validator: Arc<dyn ValidatorService>,
    pub split: Arc<dyn SplitService>,
    pub project: Arc<dyn ProjectService>,
    pub project_admin: Arc<dyn ProjectAdminService>,
    pub user: Arc<dyn UserService>,
    pub partner: Arc<dyn PartnerService>,
}

impl Services {
    /// Wire the services over a set of repositories.
    pub fn new<T, P, U, R>(
        tasks: Arc<T>,
        projects: Arc<P>,
        users: Arc<U>,
        partners: Arc<R>,
        cache: Arc<dyn ManagerPermissionCache>,
        settings: &TaskSettings,
    ) -> Self
    where
        T: TaskRepository + 'static,
        P: ProjectRepository + 'static,
        U: UserRepository + 'static,
        R: PartnerRepository + 'static,
    {
        let project: Arc<dyn ProjectService> = Arc::new(ProjectServiceImpl::new(
            projects.clone(),
            users.clone(),
            tasks.clone(),
        ));
        let project_admin: Arc<dyn ProjectAdminService> = Arc::new(ProjectAdminServiceImpl::new(
            projects,
            users.clone(),
            tasks.clone(),
            cache,
        ));

        Self {
            mapping: Arc::new(MappingServiceImpl::new(
                tasks.clone(),
                project.clone(),
                project_admin.clone(),
                settings.clone(),
            )),
            validator: Arc::new(ValidatorServiceImpl::new(
                tasks.clone(),
                project.clone(),
                project_admin.clone(),
                settings.clone(),
            )),
            split: Arc::new(SplitServiceImpl::new(tasks.clone())),
            user: Arc::new(UserServiceImpl::new(users, tasks, settings.clone())),
            partner: Arc::new(PartnerServiceImpl::new(partners)),
            project,
            project_admin,
        }
    }
}
