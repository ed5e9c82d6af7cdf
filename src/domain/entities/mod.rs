//! # Domain Entities
//!
//! Core domain entities representing the main business objects of the
//! tasking manager. All entities map directly to their database tables.
//!
//! - **Task**: a unit of mapping/validation work, with its history
//! - **Project**: a container of tasks with managers and a license
//! - **User**: a mapper with a role, mapper level and accepted licenses
//! - **Partner**: a sponsoring or affiliated organisation
//!
//! ## Repository Traits
//!
//! Each entity has an associated repository trait defining data access operations.
//! These traits are implemented in the infrastructure layer, following the
//! dependency inversion principle.

mod partner;
mod project;
mod task;
mod user;

pub use partner::{
    Partner, PartnerRecord, PartnerRepository, PartnerStoreError, WebsiteLink, MAX_WEBSITE_LINKS,
};
pub use project::{Project, ProjectRepository, ProjectStatus};
pub use task::{
    Task, TaskAction, TaskGuard, TaskHistory, TaskLock, TaskRepository, TaskStatus, TaskUpdate,
};
pub use user::{MapperLevel, User, UserRepository, UserRole};

#[cfg(test)]
pub use project::MockProjectRepository;
#[cfg(test)]
pub use user::MockUserRepository;
