//! Repository Implementations
//!
//! Implementations of the domain repository traits.
//!
//! ## Available Repositories
//!
//! - **PgTaskRepository** - Tasks and their history, conditional locking
//! - **PgProjectRepository** - Projects with their managers
//! - **PgUserRepository** - Users, roles, mapper levels and licenses
//! - **PgPartnerRepository** - Partner organisations
//! - **InMemory*Repository** - Process-local stores with the same contracts
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use sqlx::PgPool;
//! use crate::infrastructure::repositories::{PgPartnerRepository, PgTaskRepository};
//!
//! async fn setup_repositories(pool: PgPool) {
//!     let task_repo = PgTaskRepository::new(pool.clone());
//!     let partner_repo = PgPartnerRepository::new(pool.clone());
//! }
//! ```

pub mod memory;
pub mod partner_repository;
pub mod project_repository;
pub mod task_repository;
pub mod user_repository;

pub use memory::{
    InMemoryPartnerRepository, InMemoryProjectRepository, InMemoryTaskRepository,
    InMemoryUserRepository,
};
pub use partner_repository::PgPartnerRepository;
pub use project_repository::PgProjectRepository;
pub use task_repository::PgTaskRepository;
pub use user_repository::PgUserRepository;
