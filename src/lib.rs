//! # Tasking Manager Library
//!
//! Backend for splitting mapping projects into tasks and coordinating the
//! people who map and validate them:
//! - Task lock, unlock, undo, split and bulk state changes
//! - Partner organisation management
//! - PostgreSQL for persistent storage, with embedded migrations
//! - Optional Redis cache for project manager permission checks
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, task state rules and repository traits
//! - **Application Layer**: Business logic services and DTOs
//! - **Infrastructure Layer**: Database, cache and metrics implementations
//! - **Presentation Layer**: HTTP handlers, extractors and middleware
//!
//! ## Module Structure
//!
//! ```text
//! tasking_manager/
//! +-- config/         Configuration management
//! +-- domain/         Domain entities, task rules and repository traits
//! +-- application/    Application services and DTOs
//! +-- infrastructure/ Database, cache and metrics implementations
//! +-- presentation/   HTTP routes and middleware
//! +-- shared/         Common utilities (errors, validation, tiles)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
