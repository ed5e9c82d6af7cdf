//! # Domain Layer
//!
//! The domain layer contains the core business rules of the tasking manager.
//! It is independent of any external frameworks or infrastructure concerns.
//!
//! ## Structure
//!
//! - **entities**: Core domain entities (Task, Project, User, Partner)
//! - **services**: Domain services for rules spanning entities
//!
//! ## Design Principles
//!
//! - No dependencies on infrastructure or presentation layers
//! - Repository traits define data access contracts
//! - Entities encapsulate domain behavior

pub mod entities;
pub mod services;

// Re-export commonly used types
pub use entities::*;
